use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::{
  classfile::AccessFlags,
  descriptor::{self, FieldType, MethodDescriptor},
  disasm::Instruction,
  vm::Value,
};

impl Display for FieldType {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      FieldType::Byte => f.write_str("byte"),
      FieldType::Char => f.write_str("char"),
      FieldType::Double => f.write_str("double"),
      FieldType::Float => f.write_str("float"),
      FieldType::Int => f.write_str("int"),
      FieldType::Long => f.write_str("long"),
      FieldType::Short => f.write_str("short"),
      FieldType::Boolean => f.write_str("boolean"),
      FieldType::Object(name) => f.write_str(&name.replace('/', ".")),
      FieldType::Array(inner) => write!(f, "{}[]", inner),
    }
  }
}

impl FromStr for FieldType {
  type Err = descriptor::Error;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    descriptor::parse_field(s)
  }
}

impl Display for MethodDescriptor {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    let params = self.params.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    match &self.ret {
      Some(ret) => write!(f, "({}) -> {}", params, ret),
      None => write!(f, "({}) -> void", params),
    }
  }
}

impl FromStr for MethodDescriptor {
  type Err = descriptor::Error;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    descriptor::parse_method(s)
  }
}

impl Display for AccessFlags {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "0x{:04X}", self.0)
  }
}

impl FromStr for AccessFlags {
  type Err = std::num::ParseIntError;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u16::from_str_radix(s, 16).map(AccessFlags)
  }
}

/// One disassembly line: `0012: invokevirtual   #7        // java/io/PrintStream.println:(I)V`.
impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    let line = format!("{:04}: {:<15} {:<10}", self.pc, self.mnemonic, self.args);
    match &self.resolved {
      Some(resolved) => write!(f, "{}// {}", line, resolved),
      None => f.write_str(line.trim_end()),
    }
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Value::Int(i) => write!(f, "{}", i),
      Value::Long(i) => write!(f, "{}L", i),
      Value::Float(i) => write!(f, "{:?}f", i),
      Value::Double(i) => write!(f, "{:?}", i),
      Value::Reference(None) => f.write_str("null"),
      Value::Reference(Some(r)) => write!(f, "@{}", r.0),
      Value::Top => f.write_str("top"),
    }
  }
}
