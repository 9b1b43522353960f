use std::collections::{BTreeMap, HashMap};

use crate::descriptor::FieldType;

use super::{Ref, Result, Trap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
  Out, Err,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayKind {
  Boolean, Char, Float, Double, Byte, Short, Int, Long,
  /// Element class name, itself an array descriptor for nested arrays.
  Reference(String),
}

impl ArrayKind {
  /// From a `newarray` type code.
  pub fn from_atype(atype: u8) -> Option<Self> {
    let kind = match atype {
      4 => ArrayKind::Boolean,
      5 => ArrayKind::Char,
      6 => ArrayKind::Float,
      7 => ArrayKind::Double,
      8 => ArrayKind::Byte,
      9 => ArrayKind::Short,
      10 => ArrayKind::Int,
      11 => ArrayKind::Long,
      _ => return None,
    };
    Some(kind)
  }

  pub fn from_element(ty: &FieldType) -> Self {
    match ty {
      FieldType::Boolean => ArrayKind::Boolean,
      FieldType::Char => ArrayKind::Char,
      FieldType::Float => ArrayKind::Float,
      FieldType::Double => ArrayKind::Double,
      FieldType::Byte => ArrayKind::Byte,
      FieldType::Short => ArrayKind::Short,
      FieldType::Int => ArrayKind::Int,
      FieldType::Long => ArrayKind::Long,
      FieldType::Object(name) => ArrayKind::Reference(name.clone()),
      FieldType::Array(_) => ArrayKind::Reference(descriptor_of(ty)),
    }
  }

  pub fn zero(&self) -> Value {
    match self {
      ArrayKind::Float => Value::Float(0.0),
      ArrayKind::Double => Value::Double(0.0),
      ArrayKind::Long => Value::Long(0),
      ArrayKind::Reference(_) => Value::NULL,
      _ => Value::Int(0),
    }
  }

  /// The [`Value::kind`] an element store must supply.
  pub fn value_kind(&self) -> &'static str {
    match self {
      ArrayKind::Long => "long",
      ArrayKind::Float => "float",
      ArrayKind::Double => "double",
      ArrayKind::Reference(_) => "reference",
      _ => "int",
    }
  }

  /// Narrows an int for byte, char, short and boolean arrays.
  pub fn narrow(&self, value: Value) -> Value {
    match (self, value) {
      (ArrayKind::Boolean, Value::Int(i)) => Value::Int(i & 1),
      (ArrayKind::Byte, Value::Int(i)) => Value::Int(i as i8 as i32),
      (ArrayKind::Char, Value::Int(i)) => Value::Int(i as u16 as i32),
      (ArrayKind::Short, Value::Int(i)) => Value::Int(i as i16 as i32),
      (_, v) => v,
    }
  }

  /// Array class name, e.g. `[I` or `[Ljava/lang/String;`.
  pub fn class_name(&self) -> String {
    let element = match self {
      ArrayKind::Boolean => "Z",
      ArrayKind::Char => "C",
      ArrayKind::Float => "F",
      ArrayKind::Double => "D",
      ArrayKind::Byte => "B",
      ArrayKind::Short => "S",
      ArrayKind::Int => "I",
      ArrayKind::Long => "J",
      ArrayKind::Reference(name) if name.starts_with('[') => return format!("[{}", name),
      ArrayKind::Reference(name) => return format!("[L{};", name),
    };
    format!("[{}", element)
  }
}

fn descriptor_of(ty: &FieldType) -> String {
  match ty {
    FieldType::Array(inner) => format!("[{}", descriptor_of(inner)),
    FieldType::Object(name) => format!("L{};", name),
    other => ArrayKind::from_element(other).class_name()[1..].to_string(),
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
  Instance { class: String, fields: BTreeMap<String, Value> },
  Array { kind: ArrayKind, elements: Vec<Value> },
  Str(String),
  Builder(String),
  PrintStream(Stream),
}

pub const STRING: &str = "java/lang/String";

/// Object arena. Nothing is ever freed.
#[derive(Debug, Default)]
pub struct Heap {
  objects: Vec<Object>,
  interned: HashMap<String, Ref>,
}

impl Heap {
  pub fn alloc(&mut self, object: Object) -> Ref {
    self.objects.push(object);
    Ref(self.objects.len() as u32 - 1)
  }

  pub fn get(&self, r: Ref) -> Result<&Object> {
    self.objects.get(r.0 as usize).ok_or(Trap::Dangling(r.0))
  }

  pub fn get_mut(&mut self, r: Ref) -> Result<&mut Object> {
    self.objects.get_mut(r.0 as usize).ok_or(Trap::Dangling(r.0))
  }

  /// String literals share one object per distinct value.
  pub fn intern(&mut self, s: &str) -> Ref {
    if let Some(r) = self.interned.get(s) {
      return *r
    }
    let r = self.alloc(Object::Str(s.to_string()));
    self.interned.insert(s.to_string(), r);
    r
  }

  pub fn new_array(&mut self, kind: ArrayKind, len: usize) -> Ref {
    let elements = vec![kind.zero(); len];
    self.alloc(Object::Array { kind, elements })
  }

  pub fn new_instance(&mut self, class: &str) -> Ref {
    self.alloc(Object::Instance { class: class.to_string(), fields: BTreeMap::new() })
  }

  pub fn new_exception(&mut self, class: &str, message: &str) -> Ref {
    let r = self.new_instance(class);
    if !message.is_empty() {
      let msg = self.alloc(Object::Str(message.to_string()));
      if let Ok(Object::Instance { fields, .. }) = self.get_mut(r) {
        fields.insert("message".to_string(), Value::Reference(Some(msg)));
      }
    }
    r
  }

  pub fn class_of(&self, r: Ref) -> Result<String> {
    let name = match self.get(r)? {
      Object::Instance { class, .. } => class.clone(),
      Object::Array { kind, .. } => kind.class_name(),
      Object::Str(_) => STRING.to_string(),
      Object::Builder(_) => "java/lang/StringBuilder".to_string(),
      Object::PrintStream(_) => "java/io/PrintStream".to_string(),
    };
    Ok(name)
  }

  pub fn string(&self, r: Ref) -> Option<&str> {
    match self.get(r).ok()? {
      Object::Str(s) | Object::Builder(s) => Some(s),
      _ => None,
    }
  }

  /// The `message` of a thrown object, or empty.
  pub fn message(&self, r: Ref) -> String {
    let Ok(Object::Instance { fields, .. }) = self.get(r) else {
      return String::new()
    };
    match fields.get("message") {
      Some(Value::Reference(Some(m))) => self.string(*m).unwrap_or_default().to_string(),
      _ => String::new(),
    }
  }
}
