//! Renderers for a parsed class: human-readable text and JSON.

use serde::{Serialize, Deserialize};

use crate::{
  classfile::{ClassFile, Constant},
  resolve::{resolve_literal, resolve_ref},
};

pub mod json;
pub mod pretty;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("output: {0}")]
  Io(#[from] std::io::Error),
  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}
pub type Result<T, E=Error> = std::result::Result<T, E>;

/// Which parts of the class get rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sections {
  pub header: bool,
  pub constant_pool: bool,
  pub interfaces: bool,
  pub fields: bool,
  pub methods: bool,
  pub attributes: bool,
  /// Disassembly of method bodies.
  pub code: bool,
}

impl Default for Sections {
  fn default() -> Self {
    Self {
      header: true,
      constant_pool: true,
      interfaces: true,
      fields: true,
      methods: true,
      attributes: true,
      code: true,
    }
  }
}

/// Operand text of a constant-pool entry and, for references, what it points at.
pub(crate) fn describe_constant(cf: &ClassFile, index: u16, c: &Constant) -> (String, Option<String>) {
  let pool = &cf.constant_pool;
  match c {
    Constant::Utf8(s) => (s.clone(), None),
    Constant::Integer(_) | Constant::Long(_) | Constant::Float(_) | Constant::Double(_) =>
      (resolve_literal(cf, index), None),
    Constant::Class { name_index } => (format!("#{}", name_index), Some(pool.utf8(*name_index).to_string())),
    Constant::String { string_index } =>
      (format!("#{}", string_index), Some(pool.utf8(*string_index).to_string())),
    Constant::Fieldref { class_index, name_and_type_index }
    | Constant::Methodref { class_index, name_and_type_index }
    | Constant::InterfaceMethodref { class_index, name_and_type_index } =>
      (format!("#{}.#{}", class_index, name_and_type_index), Some(resolve_ref(cf, index))),
    Constant::NameAndType { name_index, descriptor_index } => {
      let (name, desc) = pool.name_and_type(index);
      (format!("#{}:#{}", name_index, descriptor_index), Some(format!("{}:{}", name, desc)))
    }
    Constant::MethodHandle { reference_kind, reference_index } =>
      (format!("{}:#{}", reference_kind, reference_index), Some(resolve_ref(cf, *reference_index))),
    Constant::MethodType { descriptor_index } =>
      (format!("#{}", descriptor_index), Some(pool.utf8(*descriptor_index).to_string())),
    Constant::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
      let (name, desc) = pool.name_and_type(*name_and_type_index);
      (format!("#{}:#{}", bootstrap_method_attr_index, name_and_type_index), Some(format!("{}:{}", name, desc)))
    }
    Constant::Unusable => (String::new(), None),
  }
}

/// Up to 16 bytes of `info` as spaced hex, with `...` when cut short.
pub(crate) fn hex_preview(info: &[u8]) -> String {
  let shown = info.iter().take(16).map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ");
  if info.len() > 16 { format!("{} ...", shown) } else { shown }
}
