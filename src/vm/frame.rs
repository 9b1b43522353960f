use std::rc::Rc;

use crate::attributes::Code;

use super::{Ref, Result, Trap, Value};

/// Activation record of one method invocation.
#[derive(Debug, Clone)]
pub struct Frame {
  pub method: String,
  pub descriptor: String,
  pub code: Rc<Code>,
  /// Start of the instruction being executed.
  pub pc: usize,
  /// Where to continue once a call made from `pc` returns.
  pub(super) resume: Option<usize>,
  pub locals: Vec<Value>,
  pub stack: Vec<Value>,
  depth: usize,
  max_stack: usize,
}

impl Frame {
  pub fn new(method: &str, descriptor: &str, code: Rc<Code>) -> Self {
    Self {
      method: method.to_string(),
      descriptor: descriptor.to_string(),
      locals: vec![Value::Top; code.max_locals as usize],
      stack: Vec::with_capacity(code.max_stack as usize),
      max_stack: code.max_stack as usize,
      depth: 0,
      pc: 0,
      resume: None,
      code,
    }
  }

  /// Operand stack depth in slots.
  pub fn depth(&self) -> usize {
    self.depth
  }

  pub fn push(&mut self, value: Value) -> Result<()> {
    if self.depth + value.slots() > self.max_stack {
      return Err(Trap::StackOverflow { pc: self.pc, max: self.max_stack })
    }
    self.depth += value.slots();
    self.stack.push(value);
    Ok(())
  }

  pub fn pop(&mut self) -> Result<Value> {
    let value = self.stack.pop().ok_or(Trap::StackUnderflow { pc: self.pc })?;
    self.depth -= value.slots();
    Ok(value)
  }

  pub fn peek(&self) -> Result<Value> {
    self.stack.last().copied().ok_or(Trap::StackUnderflow { pc: self.pc })
  }

  pub fn clear_stack(&mut self) {
    self.stack.clear();
    self.depth = 0;
  }

  fn mismatch(&self, expected: &'static str, found: Value) -> Trap {
    Trap::TypeMismatch { pc: self.pc, expected, found }
  }

  pub fn pop_int(&mut self) -> Result<i32> {
    match self.pop()? {
      Value::Int(i) => Ok(i),
      v => Err(self.mismatch("int", v)),
    }
  }

  pub fn pop_long(&mut self) -> Result<i64> {
    match self.pop()? {
      Value::Long(i) => Ok(i),
      v => Err(self.mismatch("long", v)),
    }
  }

  pub fn pop_float(&mut self) -> Result<f32> {
    match self.pop()? {
      Value::Float(i) => Ok(i),
      v => Err(self.mismatch("float", v)),
    }
  }

  pub fn pop_double(&mut self) -> Result<f64> {
    match self.pop()? {
      Value::Double(i) => Ok(i),
      v => Err(self.mismatch("double", v)),
    }
  }

  pub fn pop_ref(&mut self) -> Result<Option<Ref>> {
    match self.pop()? {
      Value::Reference(r) => Ok(r),
      v => Err(self.mismatch("reference", v)),
    }
  }

  pub fn load(&self, index: usize) -> Result<Value> {
    self.locals.get(index).copied()
      .ok_or(Trap::LocalOutOfBounds { index, pc: self.pc, max: self.locals.len() })
  }

  /// Loads a local and checks that it holds a value of `kind` (see [`Value::kind`]).
  pub fn load_kind(&self, index: usize, kind: &'static str) -> Result<Value> {
    let value = self.load(index)?;
    if value.kind() != kind {
      return Err(self.mismatch(kind, value))
    }
    Ok(value)
  }

  /// Stores into a local. Long and double values also claim `index + 1`.
  pub fn store(&mut self, index: usize, value: Value) -> Result<()> {
    let needed = index + value.slots();
    if needed > self.locals.len() {
      return Err(Trap::LocalOutOfBounds { index: needed - 1, pc: self.pc, max: self.locals.len() })
    }
    // overwriting the upper half of a wide local invalidates it
    if index > 0 && self.locals[index - 1].is_wide() {
      self.locals[index - 1] = Value::Top;
    }
    self.locals[index] = value;
    if value.is_wide() {
      self.locals[index + 1] = Value::Top;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn frame(max_stack: u16, max_locals: u16) -> Frame {
    let code = Code { max_stack, max_locals, code: vec![0xB1], ..Default::default() };
    Frame::new("run", "()V", Rc::new(code))
  }

  #[test]
  fn stack_counts_slots() -> anyhow::Result<()> {
    let mut f = frame(3, 0);
    f.push(Value::Long(1))?;
    f.push(Value::Int(2))?;
    assert_eq!(f.depth(), 3);
    assert!(matches!(f.push(Value::Int(3)), Err(Trap::StackOverflow { max: 3, .. })));
    assert_eq!(f.pop_int()?, 2);
    assert!(matches!(f.pop_int(), Err(Trap::TypeMismatch { expected: "int", .. })));
    assert!(matches!(f.pop(), Err(Trap::StackUnderflow { .. })));
    Ok(())
  }

  #[test]
  fn wide_locals() -> anyhow::Result<()> {
    let mut f = frame(0, 3);
    f.store(0, Value::Double(1.5))?;
    assert_eq!(f.load(1)?, Value::Top);
    f.store(1, Value::Int(7))?;
    // the double lost its upper half
    assert_eq!(f.load(0)?, Value::Top);
    assert!(matches!(f.store(2, Value::Long(1)), Err(Trap::LocalOutOfBounds { index: 3, .. })));
    assert!(matches!(f.load(3), Err(Trap::LocalOutOfBounds { index: 3, max: 3, .. })));
    assert!(f.load_kind(1, "int").is_ok());
    assert!(f.load_kind(1, "float").is_err());
    Ok(())
  }
}
