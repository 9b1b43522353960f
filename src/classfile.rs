//! In-memory model of a `.class` file and the parser that builds it.
//!
//! Attribute payloads are kept raw here; [`crate::attributes`] decodes the ones the
//! disassembler and the interpreter need.

use crate::reader::{self, Reader};

pub const MAGIC: u32 = 0xCAFEBABE;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("classfile: {0}")]
  Read(#[from] reader::Error),
  #[error("classfile: bad magic 0x{0:08X}, expected 0xCAFEBABE")]
  BadMagic(u32),
  #[error("classfile: illegal constant tag {tag} at #{index}")]
  ConstantTag { index: u16, tag: u8 },
  #[error("classfile: #{index} should be {expected}")]
  ConstantRef { index: u16, expected: &'static str },
}
pub type Result<T, E=Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
pub enum Constant {
  Utf8(String),
  Integer(i32),
  Float(f32),
  Long(i64),
  Double(f64),
  Class { name_index: u16 },
  String { string_index: u16 },
  Fieldref { class_index: u16, name_and_type_index: u16 },
  Methodref { class_index: u16, name_and_type_index: u16 },
  InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
  NameAndType { name_index: u16, descriptor_index: u16 },
  MethodHandle { reference_kind: u8, reference_index: u16 },
  MethodType { descriptor_index: u16 },
  InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
  /// Second slot of a `Long` or `Double`, and slot 0.
  Unusable,
}

impl Constant {
  pub fn tag(&self) -> u8 {
    match self {
      Constant::Utf8(_) => 1,
      Constant::Integer(_) => 3,
      Constant::Float(_) => 4,
      Constant::Long(_) => 5,
      Constant::Double(_) => 6,
      Constant::Class { .. } => 7,
      Constant::String { .. } => 8,
      Constant::Fieldref { .. } => 9,
      Constant::Methodref { .. } => 10,
      Constant::InterfaceMethodref { .. } => 11,
      Constant::NameAndType { .. } => 12,
      Constant::MethodHandle { .. } => 15,
      Constant::MethodType { .. } => 16,
      Constant::InvokeDynamic { .. } => 18,
      Constant::Unusable => 0,
    }
  }

  pub fn tag_name(&self) -> &'static str {
    self.into()
  }

  pub fn is_wide(&self) -> bool {
    matches!(self, Constant::Long(_) | Constant::Double(_))
  }
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
  entries: Vec<Constant>,
}

impl ConstantPool {
  pub fn new(entries: Vec<Constant>) -> Self {
    Self { entries }
  }

  /// The `constant_pool_count` as stored in the file (entries + 1).
  pub fn count(&self) -> u16 {
    self.entries.len() as u16
  }

  pub fn get(&self, index: u16) -> Option<&Constant> {
    match self.entries.get(index as usize) {
      None | Some(Constant::Unusable) => None,
      Some(c) => Some(c),
    }
  }

  /// Usable entries with their indexes, skipping slot 0 and wide-constant shadows.
  pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> + '_ {
    self.entries.iter().enumerate()
      .filter(|(_, c)| !matches!(c, Constant::Unusable))
      .map(|(i, c)| (i as u16, c))
  }

  pub fn utf8(&self, index: u16) -> &str {
    match self.get(index) {
      Some(Constant::Utf8(s)) => s,
      _ => "",
    }
  }

  pub fn class_name(&self, index: u16) -> &str {
    match self.get(index) {
      Some(Constant::Class { name_index }) => self.utf8(*name_index),
      _ => "",
    }
  }

  pub fn name_and_type(&self, index: u16) -> (&str, &str) {
    match self.get(index) {
      Some(Constant::NameAndType { name_index, descriptor_index }) =>
        (self.utf8(*name_index), self.utf8(*descriptor_index)),
      _ => ("", ""),
    }
  }

  /// Resolves a Field/Method/InterfaceMethod ref into `(class, name, descriptor)`.
  /// Any broken link yields empty strings.
  pub fn member_ref(&self, index: u16) -> (&str, &str, &str) {
    match self.get(index) {
      Some(Constant::Fieldref { class_index, name_and_type_index })
      | Some(Constant::Methodref { class_index, name_and_type_index })
      | Some(Constant::InterfaceMethodref { class_index, name_and_type_index }) => {
        let class = self.class_name(*class_index);
        let (name, desc) = self.name_and_type(*name_and_type_index);
        (class, name, desc)
      }
      _ => ("", "", ""),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessFlags(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagTarget {
  Class, Field, Method,
}

impl AccessFlags {
  pub const PUBLIC: u16 = 0x0001;
  pub const PRIVATE: u16 = 0x0002;
  pub const PROTECTED: u16 = 0x0004;
  pub const STATIC: u16 = 0x0008;
  pub const FINAL: u16 = 0x0010;
  pub const SUPER: u16 = 0x0020;
  pub const VOLATILE: u16 = 0x0040;
  pub const TRANSIENT: u16 = 0x0080;
  pub const NATIVE: u16 = 0x0100;
  pub const INTERFACE: u16 = 0x0200;
  pub const ABSTRACT: u16 = 0x0400;
  pub const STRICT: u16 = 0x0800;
  pub const SYNTHETIC: u16 = 0x1000;
  pub const ANNOTATION: u16 = 0x2000;
  pub const ENUM: u16 = 0x4000;

  pub fn contains(&self, flag: u16) -> bool {
    self.0 & flag == flag
  }

  pub fn names(&self, target: FlagTarget) -> Vec<&'static str> {
    let table: &[(u16, &'static str)] = match target {
      FlagTarget::Class => &[
        (Self::PUBLIC, "public"), (Self::FINAL, "final"), (Self::SUPER, "super"),
        (Self::INTERFACE, "interface"), (Self::ABSTRACT, "abstract"), (Self::SYNTHETIC, "synthetic"),
        (Self::ANNOTATION, "annotation"), (Self::ENUM, "enum"),
      ],
      FlagTarget::Field => &[
        (Self::PUBLIC, "public"), (Self::PRIVATE, "private"), (Self::PROTECTED, "protected"),
        (Self::STATIC, "static"), (Self::FINAL, "final"), (Self::VOLATILE, "volatile"),
        (Self::TRANSIENT, "transient"), (Self::SYNTHETIC, "synthetic"), (Self::ENUM, "enum"),
      ],
      FlagTarget::Method => &[
        (Self::PUBLIC, "public"), (Self::PRIVATE, "private"), (Self::PROTECTED, "protected"),
        (Self::STATIC, "static"), (Self::FINAL, "final"), (Self::SUPER, "synchronized"),
        (Self::VOLATILE, "bridge"), (Self::TRANSIENT, "varargs"), (Self::NATIVE, "native"),
        (Self::ABSTRACT, "abstract"), (Self::STRICT, "strict"), (Self::SYNTHETIC, "synthetic"),
      ],
    };
    table.iter().filter(|(bit, _)| self.contains(*bit)).map(|(_, name)| *name).collect()
  }
}

#[derive(Debug, Clone, Default)]
pub struct AttributeInfo {
  pub name_index: u16,
  pub info: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberInfo {
  pub access_flags: AccessFlags,
  pub name_index: u16,
  pub descriptor_index: u16,
  pub attributes: Vec<AttributeInfo>,
}

pub type FieldInfo = MemberInfo;
pub type MethodInfo = MemberInfo;

#[derive(Debug, Clone, Default)]
pub struct ClassFile {
  pub magic: u32,
  pub minor_version: u16,
  pub major_version: u16,
  pub constant_pool: ConstantPool,
  pub access_flags: AccessFlags,
  pub this_class: u16,
  pub super_class: u16,
  pub interfaces: Vec<u16>,
  pub fields: Vec<FieldInfo>,
  pub methods: Vec<MethodInfo>,
  pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
  pub fn parse(input: &[u8]) -> Result<Self> {
    let mut r = Reader::new(input);
    let magic = r.read_u4()?;
    if magic != MAGIC {
      return Err(Error::BadMagic(magic))
    }
    let minor_version = r.read_u2()?;
    let major_version = r.read_u2()?;
    let constant_pool = parse_constant_pool(&mut r)?;
    debug!("classfile: version {}.{}, {} constants", major_version, minor_version, constant_pool.count());

    let access_flags = AccessFlags(r.read_u2()?);
    let this_class = r.read_u2()?;
    let super_class = r.read_u2()?;
    let interfaces_count = r.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
      interfaces.push(r.read_u2()?);
    }
    let fields = parse_members(&mut r)?;
    let methods = parse_members(&mut r)?;
    let attributes = parse_attributes(&mut r)?;
    if !r.is_empty() {
      warn!("classfile: {} trailing bytes ignored", r.remaining());
    }

    let cf = ClassFile {
      magic, minor_version, major_version, constant_pool, access_flags,
      this_class, super_class, interfaces, fields, methods, attributes,
    };
    cf.check_class_ref(this_class)?;
    if super_class != 0 {
      cf.check_class_ref(super_class)?;
    }
    for &index in &cf.interfaces {
      cf.check_class_ref(index)?;
    }
    Ok(cf)
  }

  fn check_class_ref(&self, index: u16) -> Result<()> {
    match self.constant_pool.get(index) {
      Some(Constant::Class { .. }) => Ok(()),
      _ => Err(Error::ConstantRef { index, expected: "a Class constant" }),
    }
  }

  pub fn utf8(&self, index: u16) -> &str {
    self.constant_pool.utf8(index)
  }

  pub fn this_class_name(&self) -> &str {
    self.constant_pool.class_name(self.this_class)
  }

  pub fn super_class_name(&self) -> Option<&str> {
    match self.super_class {
      0 => None,
      i => Some(self.constant_pool.class_name(i)),
    }
  }

  pub fn member_name(&self, member: &MemberInfo) -> &str {
    self.utf8(member.name_index)
  }

  pub fn member_descriptor(&self, member: &MemberInfo) -> &str {
    self.utf8(member.descriptor_index)
  }

  pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
    self.methods.iter()
      .find(|m| self.member_name(m) == name && self.member_descriptor(m) == descriptor)
  }

  pub fn attribute<'a>(&self, attributes: &'a [AttributeInfo], name: &str) -> Option<&'a AttributeInfo> {
    attributes.iter().find(|a| self.utf8(a.name_index) == name)
  }

  pub fn attribute_name(&self, attr: &AttributeInfo) -> &str {
    self.utf8(attr.name_index)
  }
}

fn parse_constant_pool(r: &mut Reader) -> Result<ConstantPool> {
  let count = r.read_u2()?;
  let mut entries = Vec::with_capacity(count as usize);
  entries.push(Constant::Unusable);
  let mut index = 1u16;
  while index < count {
    let tag = r.read_u1()?;
    let constant = match tag {
      1 => {
        let len = r.read_u2()? as usize;
        Constant::Utf8(decode_modified_utf8(r.read_bytes(len)?))
      }
      3 => Constant::Integer(r.read_i4()?),
      4 => Constant::Float(f32::from_bits(r.read_u4()?)),
      5 | 6 => {
        let high = r.read_u4()? as u64;
        let low = r.read_u4()? as u64;
        let bits = (high << 32) | low;
        if index + 1 >= count {
          return Err(Error::ConstantTag { index, tag })
        }
        if tag == 5 { Constant::Long(bits as i64) } else { Constant::Double(f64::from_bits(bits)) }
      }
      7 => Constant::Class { name_index: r.read_u2()? },
      8 => Constant::String { string_index: r.read_u2()? },
      9 => Constant::Fieldref { class_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
      10 => Constant::Methodref { class_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
      11 => Constant::InterfaceMethodref { class_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
      12 => Constant::NameAndType { name_index: r.read_u2()?, descriptor_index: r.read_u2()? },
      15 => Constant::MethodHandle { reference_kind: r.read_u1()?, reference_index: r.read_u2()? },
      16 => Constant::MethodType { descriptor_index: r.read_u2()? },
      18 => Constant::InvokeDynamic { bootstrap_method_attr_index: r.read_u2()?, name_and_type_index: r.read_u2()? },
      // Dynamic, Module, Package and anything unknown
      _ => return Err(Error::ConstantTag { index, tag }),
    };
    let wide = constant.is_wide();
    entries.push(constant);
    index += 1;
    if wide {
      entries.push(Constant::Unusable);
      index += 1;
    }
  }
  Ok(ConstantPool::new(entries))
}

fn parse_attributes(r: &mut Reader) -> Result<Vec<AttributeInfo>> {
  let count = r.read_u2()?;
  let mut attributes = Vec::with_capacity(count as usize);
  for _ in 0..count {
    let name_index = r.read_u2()?;
    let len = r.read_u4()? as usize;
    let info = r.read_bytes(len)?.to_vec();
    attributes.push(AttributeInfo { name_index, info });
  }
  Ok(attributes)
}

fn parse_members(r: &mut Reader) -> Result<Vec<MemberInfo>> {
  let count = r.read_u2()?;
  let mut members = Vec::with_capacity(count as usize);
  for _ in 0..count {
    let access_flags = AccessFlags(r.read_u2()?);
    let name_index = r.read_u2()?;
    let descriptor_index = r.read_u2()?;
    let attributes = parse_attributes(r)?;
    members.push(MemberInfo { access_flags, name_index, descriptor_index, attributes });
  }
  Ok(members)
}

/// Decodes the JVM's modified UTF-8 (two-byte NUL, surrogate pairs as two 3-byte units).
pub fn decode_modified_utf8(bytes: &[u8]) -> String {
  let mut units = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    let b = bytes[i] as u16;
    if b & 0x80 == 0 {
      units.push(b);
      i += 1;
    } else if b & 0xE0 == 0xC0 && i + 1 < bytes.len() {
      units.push(((b & 0x1F) << 6) | (bytes[i + 1] as u16 & 0x3F));
      i += 2;
    } else if b & 0xF0 == 0xE0 && i + 2 < bytes.len() {
      units.push(((b & 0x0F) << 12) | ((bytes[i + 1] as u16 & 0x3F) << 6) | (bytes[i + 2] as u16 & 0x3F));
      i += 3;
    } else {
      units.push(0xFFFD);
      i += 1;
    }
  }
  String::from_utf16_lossy(&units)
}

pub fn java_version(major: u16) -> &'static str {
  match major {
    45 => "Java 1.1",
    46 => "Java 1.2",
    47 => "Java 1.3",
    48 => "Java 1.4",
    49 => "Java 5",
    50 => "Java 6",
    51 => "Java 7",
    52 => "Java 8",
    53 => "Java 9",
    54 => "Java 10",
    55 => "Java 11",
    56 => "Java 12",
    57 => "Java 13",
    58 => "Java 14",
    59 => "Java 15",
    60 => "Java 16",
    61 => "Java 17",
    62 => "Java 18",
    63 => "Java 19",
    64 => "Java 20",
    65 => "Java 21",
    66 => "Java 22",
    _ => "unknown",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::ClassBuilder;

  #[test]
  fn parses_header_and_pool() -> anyhow::Result<()> {
    let mut b = ClassBuilder::new("Sample");
    let long = b.long(1 << 40);
    let after = b.integer(-7);
    let bytes = b.build();
    let cf = ClassFile::parse(&bytes)?;
    assert_eq!(cf.magic, MAGIC);
    assert_eq!(cf.major_version, 52);
    assert_eq!(cf.this_class_name(), "Sample");
    assert_eq!(cf.super_class_name(), Some("java/lang/Object"));
    assert_eq!(cf.constant_pool.get(long), Some(&Constant::Long(1 << 40)));
    // the slot after a long is unusable and the next constant follows it
    assert_eq!(cf.constant_pool.get(long + 1), None);
    assert_eq!(after, long + 2);
    assert_eq!(cf.constant_pool.get(after), Some(&Constant::Integer(-7)));
    Ok(())
  }

  #[test]
  fn rejects_bad_magic() {
    let mut bytes = ClassBuilder::new("Sample").build();
    bytes[0] = 0xDE;
    match ClassFile::parse(&bytes) {
      Err(Error::BadMagic(0xDEFEBABE)) => {}
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn truncated_file_is_eof() {
    let bytes = ClassBuilder::new("Sample").build();
    for cut in [3, 9, bytes.len() - 1] {
      match ClassFile::parse(&bytes[..cut]) {
        Err(Error::Read(reader::Error::Eof { .. })) => {}
        other => panic!("cut at {}: unexpected {:?}", cut, other),
      }
    }
  }

  #[test]
  fn rejects_module_tag() {
    // magic, version, count=2, tag 19 (Module)
    let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 2, 19, 0, 1];
    match ClassFile::parse(&bytes) {
      Err(Error::ConstantTag { index: 1, tag: 19 }) => {}
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn modified_utf8() {
    assert_eq!(decode_modified_utf8(b"abc"), "abc");
    assert_eq!(decode_modified_utf8(&[0xC0, 0x80]), "\0");
    assert_eq!(decode_modified_utf8(&[0xC3, 0xA7]), "ç");
    // U+1F600 as a surrogate pair
    assert_eq!(decode_modified_utf8(&[0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]), "\u{1F600}");
  }

  #[test]
  fn flag_names_depend_on_target() {
    let flags = AccessFlags(0x0021);
    assert_eq!(flags.names(FlagTarget::Class), vec!["public", "super"]);
    assert_eq!(flags.names(FlagTarget::Method), vec!["public", "synchronized"]);
    assert_eq!(java_version(52), "Java 8");
    assert_eq!(java_version(99), "unknown");
  }
}
