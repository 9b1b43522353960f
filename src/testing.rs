//! In-memory class file assembly for tests.

use crate::classfile::{Constant, MAGIC};

pub struct CodeSpec {
  pub max_stack: u16,
  pub max_locals: u16,
  pub code: Vec<u8>,
  /// `(start_pc, end_pc, handler_pc, catch_type)`
  pub exception_table: Vec<(u16, u16, u16, u16)>,
  /// `(start_pc, line_number)`
  pub line_numbers: Vec<(u16, u16)>,
}

impl CodeSpec {
  pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
    Self { max_stack, max_locals, code, exception_table: vec![], line_numbers: vec![] }
  }
}

struct Member {
  flags: u16,
  name: u16,
  desc: u16,
  attributes: Vec<(u16, Vec<u8>)>,
}

pub struct ClassBuilder {
  pool: Vec<Constant>,
  this_class: u16,
  super_class: u16,
  fields: Vec<Member>,
  methods: Vec<Member>,
  attributes: Vec<(u16, Vec<u8>)>,
}

impl ClassBuilder {
  pub fn new(name: &str) -> Self {
    let mut b = Self {
      pool: vec![Constant::Unusable],
      this_class: 0, super_class: 0,
      fields: vec![], methods: vec![], attributes: vec![],
    };
    b.this_class = b.class(name);
    b.super_class = b.class("java/lang/Object");
    b
  }

  fn push(&mut self, c: Constant) -> u16 {
    if let Some(i) = self.pool.iter().position(|i| *i == c) {
      return i as u16
    }
    let wide = c.is_wide();
    self.pool.push(c);
    let index = self.pool.len() as u16 - 1;
    if wide {
      self.pool.push(Constant::Unusable);
    }
    index
  }

  pub fn utf8(&mut self, s: &str) -> u16 {
    self.push(Constant::Utf8(s.to_string()))
  }

  pub fn class(&mut self, name: &str) -> u16 {
    let name_index = self.utf8(name);
    self.push(Constant::Class { name_index })
  }

  pub fn string(&mut self, s: &str) -> u16 {
    let string_index = self.utf8(s);
    self.push(Constant::String { string_index })
  }

  pub fn integer(&mut self, v: i32) -> u16 {
    self.push(Constant::Integer(v))
  }

  pub fn float(&mut self, v: f32) -> u16 {
    self.push(Constant::Float(v))
  }

  pub fn long(&mut self, v: i64) -> u16 {
    self.push(Constant::Long(v))
  }

  pub fn double(&mut self, v: f64) -> u16 {
    self.push(Constant::Double(v))
  }

  pub fn name_and_type(&mut self, name: &str, desc: &str) -> u16 {
    let name_index = self.utf8(name);
    let descriptor_index = self.utf8(desc);
    self.push(Constant::NameAndType { name_index, descriptor_index })
  }

  pub fn field_ref(&mut self, class: &str, name: &str, desc: &str) -> u16 {
    let class_index = self.class(class);
    let name_and_type_index = self.name_and_type(name, desc);
    self.push(Constant::Fieldref { class_index, name_and_type_index })
  }

  pub fn method_ref(&mut self, class: &str, name: &str, desc: &str) -> u16 {
    let class_index = self.class(class);
    let name_and_type_index = self.name_and_type(name, desc);
    self.push(Constant::Methodref { class_index, name_and_type_index })
  }

  pub fn field(&mut self, flags: u16, name: &str, desc: &str) -> &mut Self {
    let name = self.utf8(name);
    let desc = self.utf8(desc);
    self.fields.push(Member { flags, name, desc, attributes: vec![] });
    self
  }

  pub fn method(&mut self, flags: u16, name: &str, desc: &str, code: CodeSpec) -> &mut Self {
    let name = self.utf8(name);
    let desc = self.utf8(desc);
    let code_name = self.utf8("Code");
    let mut sub = Vec::new();
    if !code.line_numbers.is_empty() {
      let lnt = self.utf8("LineNumberTable");
      let mut info = Vec::new();
      info.extend_from_slice(&(code.line_numbers.len() as u16).to_be_bytes());
      for (pc, line) in &code.line_numbers {
        info.extend_from_slice(&pc.to_be_bytes());
        info.extend_from_slice(&line.to_be_bytes());
      }
      sub.push((lnt, info));
    }
    let mut info = Vec::new();
    info.extend_from_slice(&code.max_stack.to_be_bytes());
    info.extend_from_slice(&code.max_locals.to_be_bytes());
    info.extend_from_slice(&(code.code.len() as u32).to_be_bytes());
    info.extend_from_slice(&code.code);
    info.extend_from_slice(&(code.exception_table.len() as u16).to_be_bytes());
    for (start, end, handler, catch) in &code.exception_table {
      for v in [start, end, handler, catch] {
        info.extend_from_slice(&v.to_be_bytes());
      }
    }
    write_attributes(&mut info, &sub);
    self.methods.push(Member { flags, name, desc, attributes: vec![(code_name, info)] });
    self
  }

  pub fn abstract_method(&mut self, flags: u16, name: &str, desc: &str) -> &mut Self {
    let name = self.utf8(name);
    let desc = self.utf8(desc);
    self.methods.push(Member { flags, name, desc, attributes: vec![] });
    self
  }

  pub fn source_file(&mut self, file: &str) -> &mut Self {
    let name = self.utf8("SourceFile");
    let file = self.utf8(file);
    self.attributes.push((name, file.to_be_bytes().to_vec()));
    self
  }

  pub fn build(&self) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&52u16.to_be_bytes());
    out.extend_from_slice(&(self.pool.len() as u16).to_be_bytes());
    for c in &self.pool[1..] {
      write_constant(&mut out, c);
    }
    out.extend_from_slice(&0x0021u16.to_be_bytes());
    out.extend_from_slice(&self.this_class.to_be_bytes());
    out.extend_from_slice(&self.super_class.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    for members in [&self.fields, &self.methods] {
      out.extend_from_slice(&(members.len() as u16).to_be_bytes());
      for m in members {
        out.extend_from_slice(&m.flags.to_be_bytes());
        out.extend_from_slice(&m.name.to_be_bytes());
        out.extend_from_slice(&m.desc.to_be_bytes());
        write_attributes(&mut out, &m.attributes);
      }
    }
    write_attributes(&mut out, &self.attributes);
    out
  }
}

fn write_attributes(out: &mut Vec<u8>, attributes: &[(u16, Vec<u8>)]) {
  out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
  for (name, info) in attributes {
    out.extend_from_slice(&name.to_be_bytes());
    out.extend_from_slice(&(info.len() as u32).to_be_bytes());
    out.extend_from_slice(info);
  }
}

fn write_constant(out: &mut Vec<u8>, c: &Constant) {
  if matches!(c, Constant::Unusable) {
    return
  }
  out.push(c.tag());
  match c {
    Constant::Utf8(s) => {
      out.extend_from_slice(&(s.len() as u16).to_be_bytes());
      out.extend_from_slice(s.as_bytes());
    }
    Constant::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
    Constant::Float(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
    Constant::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
    Constant::Double(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
    Constant::Class { name_index } => out.extend_from_slice(&name_index.to_be_bytes()),
    Constant::String { string_index } => out.extend_from_slice(&string_index.to_be_bytes()),
    Constant::Fieldref { class_index, name_and_type_index }
    | Constant::Methodref { class_index, name_and_type_index }
    | Constant::InterfaceMethodref { class_index, name_and_type_index } => {
      out.extend_from_slice(&class_index.to_be_bytes());
      out.extend_from_slice(&name_and_type_index.to_be_bytes());
    }
    Constant::NameAndType { name_index, descriptor_index } => {
      out.extend_from_slice(&name_index.to_be_bytes());
      out.extend_from_slice(&descriptor_index.to_be_bytes());
    }
    Constant::MethodHandle { reference_kind, reference_index } => {
      out.push(*reference_kind);
      out.extend_from_slice(&reference_index.to_be_bytes());
    }
    Constant::MethodType { descriptor_index } => out.extend_from_slice(&descriptor_index.to_be_bytes()),
    Constant::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
      out.extend_from_slice(&bootstrap_method_attr_index.to_be_bytes());
      out.extend_from_slice(&name_and_type_index.to_be_bytes());
    }
    Constant::Unusable => {}
  }
}

pub const MAIN_DESC: &str = "([Ljava/lang/String;)V";
pub const PUBLIC_STATIC: u16 = 0x0009;

/// `TestInterpreter.main`: arithmetic on `a=5, b=3`, a counter, a negation,
/// an `if (x > 5)` and a `while (i < 5)` loop.
///
/// Locals: args, a, b, soma, subtracao, multiplicacao, divisao, resto,
/// contador, positivo, negativo, x, i.
pub fn test_interpreter_main() -> CodeSpec {
  let code = vec![
    0x08,             //  0: iconst_5
    0x3C,             //  1: istore_1
    0x06,             //  2: iconst_3
    0x3D,             //  3: istore_2
    0x1B, 0x1C, 0x60, //  4: iload_1, iload_2, iadd
    0x3E,             //  7: istore_3
    0x1B, 0x1C, 0x64, //  8: iload_1, iload_2, isub
    0x36, 4,          // 11: istore 4
    0x1B, 0x1C, 0x68, // 13: iload_1, iload_2, imul
    0x36, 5,          // 16: istore 5
    0x1B, 0x1C, 0x6C, // 18: iload_1, iload_2, idiv
    0x36, 6,          // 21: istore 6
    0x1B, 0x1C, 0x70, // 23: iload_1, iload_2, irem
    0x36, 7,          // 26: istore 7
    0x03,             // 28: iconst_0
    0x36, 8,          // 29: istore 8
    0x15, 8, 0x04, 0x60, 0x36, 8, // 31: contador = contador + 1
    0x15, 8, 0x04, 0x60, 0x36, 8, // 37
    0x15, 8, 0x04, 0x60, 0x36, 8, // 43
    0x10, 10,         // 49: bipush 10
    0x36, 9,          // 51: istore 9
    0x15, 9,          // 53: iload 9
    0x74,             // 55: ineg
    0x36, 10,         // 56: istore 10
    0x10, 10,         // 58: bipush 10
    0x36, 11,         // 60: istore 11
    0x15, 11,         // 62: iload 11
    0x08,             // 64: iconst_5
    0xA4, 0x00, 0x06, // 65: if_icmple 71
    0x84, 11, 1,      // 68: iinc 11, 1
    0x03,             // 71: iconst_0
    0x36, 12,         // 72: istore 12
    0x15, 12,         // 74: iload 12
    0x08,             // 76: iconst_5
    0xA2, 0x00, 0x09, // 77: if_icmpge 86
    0x84, 12, 1,      // 80: iinc 12, 1
    0xA7, 0xFF, 0xF7, // 83: goto 74
    0xB1,             // 86: return
  ];
  CodeSpec::new(2, 13, code)
}

/// `TestIntegration.main`: a chain of arithmetic from `a=10, b=20`, an if/else
/// on `h > 0` and a `switch (h)` compiled to `tableswitch`.
///
/// Locals: args, a, b, c, d, e, f, g, h, result.
pub fn test_integration_main() -> CodeSpec {
  let code = vec![
    0x10, 10,         //   0: bipush 10
    0x3C,             //   2: istore_1
    0x10, 20,         //   3: bipush 20
    0x3D,             //   5: istore_2
    0x1B, 0x1C, 0x60, //   6: iload_1, iload_2, iadd
    0x3E,             //   9: istore_3
    0x1D, 0x08, 0x64, //  10: iload_3, iconst_5, isub
    0x36, 4,          //  13: istore 4
    0x15, 4, 0x05, 0x68, // 15: iload 4, iconst_2, imul
    0x36, 5,          //  19: istore 5
    0x15, 5, 0x06, 0x6C, // 21: iload 5, iconst_3, idiv
    0x36, 6,          //  25: istore 6
    0x15, 6, 0x10, 7, 0x70, // 27: iload 6, bipush 7, irem
    0x36, 7,          //  32: istore 7
    0x15, 7, 0x74,    //  34: iload 7, ineg
    0x36, 8,          //  37: istore 8
    0x15, 8,          //  39: iload 8
    0x9E, 0x00, 0x09, //  41: ifle 50
    0x84, 8, 1,       //  44: iinc 8, 1
    0xA7, 0x00, 0x06, //  47: goto 53
    0x84, 8, 0xFF,    //  50: iinc 8, -1
    0x03,             //  53: iconst_0
    0x36, 9,          //  54: istore 9
    0x15, 8,          //  56: iload 8
    0xAA, 0x00,       //  58: tableswitch, 1 byte of padding
    0, 0, 0, 49,      //  60: default -> 107
    0, 0, 0, 0,       //  64: low 0
    0, 0, 0, 2,       //  68: high 2
    0, 0, 0, 26,      //  72: 0 -> 84
    0, 0, 0, 33,      //  76: 1 -> 91
    0, 0, 0, 41,      //  80: 2 -> 99
    0x10, 100,        //  84: bipush 100
    0x36, 9,          //  86: istore 9
    0xA7, 0x00, 24,   //  88: goto 112
    0x11, 0x00, 0xC8, //  91: sipush 200
    0x36, 9,          //  94: istore 9
    0xA7, 0x00, 16,   //  96: goto 112
    0x11, 0x01, 0x2C, //  99: sipush 300
    0x36, 9,          // 102: istore 9
    0xA7, 0x00, 8,    // 104: goto 112
    0x11, 0x03, 0xE7, // 107: sipush 999
    0x36, 9,          // 110: istore 9
    0xB1,             // 112: return
  ];
  CodeSpec::new(2, 10, code)
}

pub fn class_with_main(name: &str, main: CodeSpec) -> Vec<u8> {
  let mut b = ClassBuilder::new(name);
  b.method(PUBLIC_STATIC, "main", MAIN_DESC, main);
  b.build()
}
