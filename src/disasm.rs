use crate::attributes::Code;
use crate::classfile::{ClassFile, Constant};
use crate::opcode::{self, Opcode, Operands};
use crate::reader::Reader;
use crate::resolve::{resolve_class_name, resolve_literal, resolve_ref};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("truncated instruction at pc {pc}")]
  Truncated { pc: usize },
  #[error("bad switch at pc {pc}: {reason}")]
  Switch { pc: usize, reason: &'static str },
  #[error("wide at pc {pc} cannot modify opcode 0x{opcode:02x}")]
  Wide { pc: usize, opcode: u8 },
}
pub type Result<T, E=Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
  pub pc: usize,
  pub length: usize,
  /// `None` for reserved bytes.
  pub opcode: Option<Opcode>,
  pub mnemonic: String,
  pub args: String,
  pub resolved: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
  pub default: i32,
  /// `(match, offset)`; offsets are relative to the switch opcode.
  pub cases: Vec<(i32, i32)>,
  /// Total instruction length including opcode and padding.
  pub length: usize,
}

impl Switch {
  pub fn offset_for(&self, key: i32) -> i32 {
    self.cases.iter().find(|(m, _)| *m == key).map(|(_, o)| *o).unwrap_or(self.default)
  }
}

/// Decodes the `tableswitch` or `lookupswitch` at `pc`. Padding is relative to
/// the start of the code array.
pub fn decode_switch(code: &[u8], pc: usize) -> Result<Switch> {
  let truncated = |_| Error::Truncated { pc };
  let mut r = Reader::at(code, pc + 1);
  r.align4(0).map_err(truncated)?;
  let default = r.read_i4().map_err(truncated)?;
  let cases = match code.get(pc).copied().and_then(Opcode::from_byte) {
    Some(Opcode::Tableswitch) => {
      let low = r.read_i4().map_err(truncated)?;
      let high = r.read_i4().map_err(truncated)?;
      if high < low {
        return Err(Error::Switch { pc, reason: "high < low" })
      }
      let count = high as i64 - low as i64 + 1;
      if count * 4 > r.remaining() as i64 {
        return Err(Error::Truncated { pc })
      }
      let mut cases = Vec::with_capacity(count as usize);
      for i in 0..count {
        cases.push(((low as i64 + i) as i32, r.read_i4().map_err(truncated)?));
      }
      cases
    }
    Some(Opcode::Lookupswitch) => {
      let npairs = r.read_i4().map_err(truncated)?;
      if npairs < 0 {
        return Err(Error::Switch { pc, reason: "negative npairs" })
      }
      if npairs as i64 * 8 > r.remaining() as i64 {
        return Err(Error::Truncated { pc })
      }
      let mut cases = Vec::with_capacity(npairs as usize);
      for _ in 0..npairs {
        let key = r.read_i4().map_err(truncated)?;
        cases.push((key, r.read_i4().map_err(truncated)?));
      }
      cases
    }
    _ => return Err(Error::Switch { pc, reason: "not a switch" }),
  };
  Ok(Switch { default, cases, length: r.position() - pc })
}

pub fn disassemble(cf: &ClassFile, code: &Code) -> Result<Vec<Instruction>> {
  let mut result = Vec::new();
  let mut pc = 0;
  while pc < code.code.len() {
    let insn = decode_at(cf, &code.code, pc)?;
    pc += insn.length;
    result.push(insn);
  }
  Ok(result)
}

fn branch(pc: usize, offset: i64) -> String {
  format!("{} (to {})", offset, pc as i64 + offset)
}

pub fn decode_at(cf: &ClassFile, code: &[u8], pc: usize) -> Result<Instruction> {
  let truncated = |_| Error::Truncated { pc };
  let byte = code[pc];
  let Some(op) = Opcode::from_byte(byte) else {
    return Ok(Instruction {
      pc, length: 1, opcode: None,
      mnemonic: "reserved".to_string(), args: format!("0x{:02x}", byte), resolved: None,
    })
  };
  if let Some(n) = op.operand_len() {
    if pc + 1 + n > code.len() {
      return Err(Error::Truncated { pc })
    }
  }
  let mut r = Reader::at(code, pc + 1);
  let mut mnemonic = op.mnemonic().to_string();
  let mut resolved = None;
  let args = match op.operands() {
    Operands::None => String::new(),
    Operands::Byte => r.read_i1().map_err(truncated)?.to_string(),
    Operands::Short => r.read_i2().map_err(truncated)?.to_string(),
    Operands::U1 => {
      let index = r.read_u1().map_err(truncated)? as u16;
      resolved = Some(resolve_literal(cf, index));
      format!("#{}", index)
    }
    Operands::U2 => {
      let index = r.read_u2().map_err(truncated)?;
      resolved = Some(match op {
        Opcode::LdcW | Opcode::Ldc2W => resolve_literal(cf, index),
        Opcode::New | Opcode::Anewarray | Opcode::Checkcast | Opcode::Instanceof => resolve_class_name(cf, index),
        _ => resolve_ref(cf, index),
      });
      format!("#{}", index)
    }
    Operands::Local => r.read_u1().map_err(truncated)?.to_string(),
    Operands::Branch2 => branch(pc, r.read_i2().map_err(truncated)? as i64),
    Operands::Branch4 => branch(pc, r.read_i4().map_err(truncated)? as i64),
    Operands::Iinc => {
      let index = r.read_u1().map_err(truncated)?;
      format!("{}, {}", index, r.read_i1().map_err(truncated)?)
    }
    Operands::TableSwitch | Operands::LookupSwitch => {
      let switch = decode_switch(code, pc)?;
      let mut parts = switch.cases.iter()
        .map(|(m, o)| format!("{}: {}", m, pc as i64 + *o as i64))
        .collect::<Vec<_>>();
      parts.push(format!("default: {}", pc as i64 + switch.default as i64));
      r = Reader::at(code, pc + switch.length);
      format!("{{ {} }}", parts.join(", "))
    }
    Operands::Wide => {
      let inner = r.read_u1().map_err(truncated)?;
      let inner_op = Opcode::from_byte(inner);
      mnemonic = format!("wide {}", inner_op.map(Opcode::mnemonic).unwrap_or("reserved"));
      match inner_op {
        Some(Opcode::Iinc) => {
          let index = r.read_u2().map_err(truncated)?;
          format!("{}, {}", index, r.read_i2().map_err(truncated)?)
        }
        Some(o) if o.operands() == Operands::Local => r.read_u2().map_err(truncated)?.to_string(),
        _ => return Err(Error::Wide { pc, opcode: inner }),
      }
    }
    Operands::InvokeInterface => {
      let index = r.read_u2().map_err(truncated)?;
      let count = r.read_u1().map_err(truncated)?;
      r.skip(1).map_err(truncated)?;
      resolved = Some(resolve_ref(cf, index));
      format!("#{}, {}", index, count)
    }
    Operands::InvokeDynamic => {
      let index = r.read_u2().map_err(truncated)?;
      r.skip(2).map_err(truncated)?;
      resolved = Some(match cf.constant_pool.get(index) {
        Some(Constant::InvokeDynamic { name_and_type_index, .. }) => {
          let (name, desc) = cf.constant_pool.name_and_type(*name_and_type_index);
          format!("{}:{}", name, desc)
        }
        _ => format!("<invalid ref #{}>", index),
      });
      format!("#{}", index)
    }
    Operands::MultiANewArray => {
      let index = r.read_u2().map_err(truncated)?;
      let dims = r.read_u1().map_err(truncated)?;
      resolved = Some(resolve_class_name(cf, index));
      format!("#{}, {}", index, dims)
    }
    Operands::NewArray => {
      let atype = r.read_u1().map_err(truncated)?;
      opcode::array_type_name(atype).map(str::to_string).unwrap_or_else(|| format!("<atype {}>", atype))
    }
  };
  Ok(Instruction { pc, length: r.position() - pc, opcode: Some(op), mnemonic, args, resolved })
}
