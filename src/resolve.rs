//! Human-readable names for constant-pool operands.

use crate::classfile::{ClassFile, Constant};

/// `Class.name:descriptor` for a field or method ref.
pub fn resolve_ref(cf: &ClassFile, index: u16) -> String {
  match cf.constant_pool.member_ref(index) {
    ("", _, _) | (_, "", _) => format!("<invalid ref #{}>", index),
    (class, name, desc) => format!("{}.{}:{}", class, name, desc),
  }
}

pub fn resolve_class_name(cf: &ClassFile, index: u16) -> String {
  match cf.constant_pool.class_name(index) {
    "" => format!("<invalid class #{}>", index),
    name => name.to_string(),
  }
}

pub fn resolve_literal(cf: &ClassFile, index: u16) -> String {
  match cf.constant_pool.get(index) {
    Some(Constant::String { string_index }) => format!("{:?}", cf.utf8(*string_index)),
    Some(Constant::Integer(v)) => v.to_string(),
    Some(Constant::Long(v)) => v.to_string(),
    Some(Constant::Float(v)) => java_float(*v as f64, format!("{:?}", v)),
    Some(Constant::Double(v)) => java_float(*v, format!("{:?}", v)),
    Some(Constant::Class { name_index }) => cf.utf8(*name_index).to_string(),
    Some(Constant::MethodType { descriptor_index }) => cf.utf8(*descriptor_index).to_string(),
    Some(Constant::MethodHandle { reference_index, .. }) => resolve_ref(cf, *reference_index),
    _ => "<?>".to_string(),
  }
}

pub(crate) fn java_float(v: f64, shortest: String) -> String {
  if v.is_nan() {
    "NaN".to_string()
  } else if v.is_infinite() {
    if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
  } else {
    shortest
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::ClassBuilder;

  #[test]
  fn resolves_pool_entries() -> anyhow::Result<()> {
    let mut b = ClassBuilder::new("Sample");
    let m = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let s = b.string("hi \"there\"");
    let f = b.float(1.0);
    let d = b.double(f64::INFINITY);
    let l = b.long(-3);
    let c = b.class("java/lang/String");
    let cf = ClassFile::parse(&b.build())?;
    assert_eq!(resolve_ref(&cf, m), "java/io/PrintStream.println:(I)V");
    assert_eq!(resolve_ref(&cf, s), format!("<invalid ref #{}>", s));
    assert_eq!(resolve_literal(&cf, s), r#""hi \"there\"""#);
    assert_eq!(resolve_literal(&cf, f), "1.0");
    assert_eq!(resolve_literal(&cf, d), "Infinity");
    assert_eq!(resolve_literal(&cf, l), "-3");
    assert_eq!(resolve_literal(&cf, c), "java/lang/String");
    assert_eq!(resolve_literal(&cf, 0), "<?>");
    assert_eq!(resolve_class_name(&cf, c), "java/lang/String");
    assert_eq!(resolve_class_name(&cf, m), format!("<invalid class #{}>", m));
    Ok(())
  }
}
