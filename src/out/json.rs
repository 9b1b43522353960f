use std::io::Write;

use serde::{Serialize, Deserialize};

use crate::{
  attributes,
  classfile::{java_version, AccessFlags, ClassFile, FlagTarget, MemberInfo},
  convert::serde::{Flags, Hex32, HexBytes},
  disasm::{self, Instruction},
};

use super::{describe_constant, Result, Sections};

#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
  #[serde_as(as = "Hex32")]
  pub magic: u32,
  pub major_version: u16,
  pub minor_version: u16,
  pub java_version: String,
  pub constant_pool_count: u16,
}

#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
  pub this_class: String,
  pub super_class: Option<String>,
  #[serde_as(as = "Flags")]
  pub access_flags: AccessFlags,
  pub flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantView {
  pub index: u16,
  pub tag: String,
  pub value: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resolved: Option<String>,
}

#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberView {
  pub name: String,
  pub descriptor: String,
  #[serde_as(as = "Flags")]
  pub access_flags: AccessFlags,
  pub flags: Vec<String>,
  /// Methods only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub code_attribute: Option<CodeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CodeView {
  Parsed {
    max_stack: u16,
    max_locals: u16,
    code_length: usize,
    disassembly: Vec<InstructionView>,
  },
  /// Disassembly switched off.
  Omitted,
  Absent,
  Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionView {
  pub pc: usize,
  pub mnemonic: String,
  pub args: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resolved: Option<String>,
}

impl From<Instruction> for InstructionView {
  fn from(i: Instruction) -> Self {
    Self { pc: i.pc, mnemonic: i.mnemonic, args: i.args, resolved: i.resolved }
  }
}

#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeView {
  pub name: String,
  pub length: usize,
  #[serde_as(as = "HexBytes")]
  pub info: Vec<u8>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub decoded: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassView {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub header: Option<Header>,
  pub class_info: ClassInfo,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub interfaces: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub constant_pool: Option<Vec<ConstantView>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fields: Option<Vec<MemberView>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub methods: Option<Vec<MemberView>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub attributes: Option<Vec<AttributeView>>,
}

fn member(cf: &ClassFile, m: &MemberInfo, target: FlagTarget) -> MemberView {
  MemberView {
    name: cf.member_name(m).to_string(),
    descriptor: cf.member_descriptor(m).to_string(),
    access_flags: m.access_flags,
    flags: m.access_flags.names(target).into_iter().map(String::from).collect(),
    code_attribute: None,
  }
}

fn code_view(cf: &ClassFile, m: &MemberInfo, with_code: bool) -> CodeView {
  let code = match attributes::find_code(cf, m) {
    Ok(Some(code)) => code,
    Ok(None) => return CodeView::Absent,
    Err(e) => return CodeView::Error { message: e.to_string() },
  };
  if !with_code {
    return CodeView::Omitted
  }
  match disasm::disassemble(cf, &code) {
    Ok(instructions) => CodeView::Parsed {
      max_stack: code.max_stack,
      max_locals: code.max_locals,
      code_length: code.code.len(),
      disassembly: instructions.into_iter().map(Into::into).collect(),
    },
    Err(e) => CodeView::Error { message: e.to_string() },
  }
}

pub fn build(cf: &ClassFile, sections: &Sections) -> ClassView {
  let header = sections.header.then(|| Header {
    magic: cf.magic,
    major_version: cf.major_version,
    minor_version: cf.minor_version,
    java_version: java_version(cf.major_version).to_string(),
    constant_pool_count: cf.constant_pool.count(),
  });
  let class_info = ClassInfo {
    this_class: cf.this_class_name().to_string(),
    super_class: cf.super_class_name().map(String::from),
    access_flags: cf.access_flags,
    flags: cf.access_flags.names(FlagTarget::Class).into_iter().map(String::from).collect(),
  };
  let interfaces = sections.interfaces.then(|| {
    cf.interfaces.iter().map(|i| cf.constant_pool.class_name(*i).to_string()).collect()
  });
  let constant_pool = sections.constant_pool.then(|| {
    cf.constant_pool.iter()
      .map(|(index, c)| {
        let (value, resolved) = describe_constant(cf, index, c);
        ConstantView { index, tag: c.tag_name().to_string(), value, resolved }
      })
      .collect()
  });
  let fields = sections.fields.then(|| {
    cf.fields.iter().map(|f| member(cf, f, FlagTarget::Field)).collect()
  });
  let methods = sections.methods.then(|| {
    cf.methods.iter()
      .map(|m| MemberView {
        code_attribute: Some(code_view(cf, m, sections.code)),
        ..member(cf, m, FlagTarget::Method)
      })
      .collect()
  });
  let attributes = sections.attributes.then(|| {
    cf.attributes.iter()
      .map(|a| {
        let name = cf.attribute_name(a).to_string();
        let decoded = match name.as_str() {
          "SourceFile" => attributes::source_file(cf).map(String::from),
          _ => None,
        };
        AttributeView { name, length: a.info.len(), info: a.info.clone(), decoded }
      })
      .collect()
  });
  ClassView { header, class_info, interfaces, constant_pool, fields, methods, attributes }
}

pub fn render<W: Write>(cf: &ClassFile, sections: &Sections, w: &mut W) -> Result<()> {
  let view = build(cf, sections);
  serde_json::to_writer_pretty(&mut *w, &view)?;
  writeln!(w)?;
  Ok(())
}
