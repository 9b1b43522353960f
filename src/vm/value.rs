use crate::descriptor::FieldType;

/// Index into [`super::Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ref(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
  Int(i32),
  Long(i64),
  Float(f32),
  Double(f64),
  Reference(Option<Ref>),
  /// Unset local, or the upper half of a long/double local.
  Top,
}

impl Default for Value {
  fn default() -> Self {
    Value::Top
  }
}

impl Value {
  pub const NULL: Value = Value::Reference(None);

  /// Zero value of a field or array element of type `ty`.
  pub fn default_for(ty: &FieldType) -> Value {
    match ty {
      FieldType::Long => Value::Long(0),
      FieldType::Float => Value::Float(0.0),
      FieldType::Double => Value::Double(0.0),
      FieldType::Object(_) | FieldType::Array(_) => Value::NULL,
      _ => Value::Int(0),
    }
  }

  pub fn is_wide(&self) -> bool {
    matches!(self, Value::Long(_) | Value::Double(_))
  }

  pub fn slots(&self) -> usize {
    if self.is_wide() { 2 } else { 1 }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Value::Int(_) => "int",
      Value::Long(_) => "long",
      Value::Float(_) => "float",
      Value::Double(_) => "double",
      Value::Reference(_) => "reference",
      Value::Top => "top",
    }
  }

  pub fn as_int(&self) -> Option<i32> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }
}
