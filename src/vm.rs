//! Bytecode interpreter for the methods of a single loaded class.
//!
//! Calls into the class push real frames; everything outside it (`System.out`,
//! `Math`, `StringBuilder`, exception constructors) is served by the natives.

use std::{collections::HashMap, io::Write, rc::Rc};

use crate::{
  attributes::{self, Code},
  classfile::{ClassFile, MethodInfo},
  descriptor,
  disasm,
};

mod frame;
mod heap;
mod native;
mod ops;
mod value;

pub use frame::Frame;
pub use heap::{ArrayKind, Heap, Object, Stream};
pub use value::{Ref, Value};

pub const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";
pub const DEBUG_MAX_INSTRUCTIONS: u64 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum Trap {
  #[error("operand stack overflow at pc {pc} (max_stack {max})")]
  StackOverflow { pc: usize, max: usize },
  #[error("operand stack underflow at pc {pc}")]
  StackUnderflow { pc: usize },
  #[error("local {index} out of bounds at pc {pc} (max_locals {max})")]
  LocalOutOfBounds { index: usize, pc: usize, max: usize },
  #[error("type mismatch at pc {pc}: expected {expected}, found {found}")]
  TypeMismatch { pc: usize, expected: &'static str, found: Value },
  #[error("main([Ljava/lang/String;)V not found in {0}")]
  MainNotFound(String),
  #[error("method {class}.{name}:{descriptor} not found")]
  MethodNotFound { class: String, name: String, descriptor: String },
  #[error("method {name}:{descriptor} has no Code attribute")]
  NoCode { name: String, descriptor: String },
  #[error("field {class}.{name} not found")]
  FieldNotFound { class: String, name: String },
  #[error("uncaught exception {class}: {message}")]
  Uncaught { class: String, message: String },
  #[error("unsupported opcode 0x{opcode:02x} at pc {pc}")]
  Unsupported { opcode: u8, pc: usize },
  #[error("branch at pc {pc} to {target} leaves the code")]
  Branch { pc: usize, target: i64 },
  #[error("bad constant #{index} at pc {pc}")]
  Constant { index: u16, pc: usize },
  #[error("dangling reference @{0}")]
  Dangling(u32),
  #[error("no frame to execute")]
  NoFrame,
  #[error(transparent)]
  Code(#[from] disasm::Error),
  #[error(transparent)]
  Attribute(#[from] attributes::Error),
  #[error(transparent)]
  Descriptor(#[from] descriptor::Error),
  #[error("output: {0}")]
  Io(#[from] std::io::Error),
}
pub type Result<T, E=Trap> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Status {
  #[strum(serialize = "end of code")]
  EndOfCode,
  #[strum(serialize = "returned")]
  Returned,
  #[strum(serialize = "instruction limit reached")]
  InstructionLimit,
}

#[derive(Debug, Clone)]
pub struct ExecConfig {
  /// `None` runs unbounded, unless `debug` is set.
  pub max_instructions: Option<u64>,
  pub debug: bool,
  /// Frames deeper than this throw `StackOverflowError`.
  pub max_depth: usize,
}

impl Default for ExecConfig {
  fn default() -> Self {
    Self { max_instructions: None, debug: false, max_depth: 1024 }
  }
}

impl ExecConfig {
  pub fn limit(&self) -> Option<u64> {
    match (self.max_instructions, self.debug) {
      (Some(max), _) => Some(max),
      (None, true) => Some(DEBUG_MAX_INSTRUCTIONS),
      (None, false) => None,
    }
  }
}

#[derive(Debug, Clone)]
pub struct Outcome {
  pub status: Status,
  pub instructions: u64,
  /// Final locals of the entry frame.
  pub locals: Vec<Value>,
  pub returned: Option<Value>,
}

/// Control transfer decided by one instruction.
pub(crate) enum Flow {
  Next(usize),
  Invoke(Frame),
  Return(Option<Value>),
  Throw(Ref),
}

pub struct Vm<'a, W: Write> {
  class: &'a ClassFile,
  config: ExecConfig,
  out: W,
  pub heap: Heap,
  statics: HashMap<String, Value>,
  frames: Vec<Frame>,
  codes: HashMap<usize, Rc<Code>>,
  instructions: u64,
  system_out: Ref,
  system_err: Ref,
}

impl<'a, W: Write> Vm<'a, W> {
  pub fn new(class: &'a ClassFile, config: ExecConfig, out: W) -> Self {
    let mut heap = Heap::default();
    let system_out = heap.alloc(Object::PrintStream(Stream::Out));
    let system_err = heap.alloc(Object::PrintStream(Stream::Err));
    Self {
      class, config, out, heap, system_out, system_err,
      statics: HashMap::new(),
      frames: Vec::new(),
      codes: HashMap::new(),
      instructions: 0,
    }
  }

  pub fn output(&self) -> &W {
    &self.out
  }

  pub fn into_output(self) -> W {
    self.out
  }

  pub fn static_value(&self, name: &str) -> Option<Value> {
    self.statics.get(name).copied()
  }

  /// Runs `<clinit>` if present, then `main(String[])` with an empty array.
  pub fn run_main(&mut self) -> Result<Outcome> {
    let class_name = self.class.this_class_name().to_string();
    if self.class.method("main", MAIN_DESCRIPTOR).is_none() {
      return Err(Trap::MainNotFound(class_name))
    }
    if self.class.method("<clinit>", "()V").is_some() {
      debug!("vm: running {}.<clinit>", class_name);
      self.invoke("<clinit>", "()V", &[])?;
    }
    let args = self.heap.new_array(ArrayKind::Reference(heap::STRING.to_string()), 0);
    debug!("vm: running {}.main", class_name);
    let outcome = self.invoke("main", MAIN_DESCRIPTOR, &[Value::Reference(Some(args))])?;
    if self.config.debug {
      writeln!(self.out, "[DEBUG] executed {} instructions: {}", outcome.instructions, outcome.status)?;
    }
    Ok(outcome)
  }

  /// Runs a method of the loaded class to completion. `args` include the
  /// receiver for instance methods.
  pub fn invoke(&mut self, name: &str, descriptor: &str, args: &[Value]) -> Result<Outcome> {
    let index = self.method_index(name, descriptor).ok_or_else(|| Trap::MethodNotFound {
      class: self.class.this_class_name().to_string(),
      name: name.to_string(),
      descriptor: descriptor.to_string(),
    })?;
    let mut frame = self.new_frame(index)?;
    let mut slot = 0;
    for arg in args {
      frame.store(slot, *arg)?;
      slot += arg.slots();
    }
    let base = self.frames.len();
    self.frames.push(frame);
    let result = self.execute(base);
    if result.is_err() {
      self.frames.truncate(base);
    }
    result
  }

  fn method_index(&self, name: &str, descriptor: &str) -> Option<usize> {
    self.class.methods.iter()
      .position(|m| self.class.member_name(m) == name && self.class.member_descriptor(m) == descriptor)
  }

  fn method_info(&self, index: usize) -> Option<&'a MethodInfo> {
    self.class.methods.get(index)
  }

  pub(crate) fn new_frame(&mut self, index: usize) -> Result<Frame> {
    let class = self.class;
    let method = self.method_info(index).ok_or(Trap::NoFrame)?;
    let name = class.member_name(method);
    let descriptor = class.member_descriptor(method);
    let code = match self.codes.get(&index) {
      Some(code) => code.clone(),
      None => {
        let code = attributes::find_code(class, method)?.ok_or_else(|| Trap::NoCode {
          name: name.to_string(),
          descriptor: descriptor.to_string(),
        })?;
        attributes::validate_code(&code)?;
        let code = Rc::new(code);
        self.codes.insert(index, code.clone());
        code
      }
    };
    trace!("vm: new frame {}{} (max_stack {}, max_locals {})", name, descriptor, code.max_stack, code.max_locals);
    Ok(Frame::new(name, descriptor, code))
  }

  fn execute(&mut self, base: usize) -> Result<Outcome> {
    let start = self.instructions;
    loop {
      if let Some(max) = self.config.limit() {
        if self.instructions - start >= max {
          warn!("vm: stopped after {} instructions", max);
          let locals = self.frames.get(base).map(|f| f.locals.clone()).unwrap_or_default();
          self.frames.truncate(base);
          return Ok(Outcome { status: Status::InstructionLimit, instructions: max, locals, returned: None })
        }
      }
      let mut frame = self.frames.pop().ok_or(Trap::NoFrame)?;
      if frame.pc >= frame.code.code.len() {
        if self.frames.len() == base {
          return Ok(Outcome {
            status: Status::EndOfCode,
            instructions: self.instructions - start,
            locals: frame.locals,
            returned: None,
          })
        }
        warn!("vm: {}{} ran off the end of its code", frame.method, frame.descriptor);
        self.resume_caller(None)?;
        continue
      }

      self.instructions += 1;
      match self.step(&mut frame)? {
        Flow::Next(pc) => {
          frame.pc = pc;
          self.frames.push(frame);
        }
        Flow::Invoke(callee) => {
          self.frames.push(frame);
          if self.frames.len() >= self.config.max_depth {
            let ex = self.heap.new_exception("java/lang/StackOverflowError", "");
            self.unwind(base, ex)?;
          } else {
            debug!("vm: invoke {}{}", callee.method, callee.descriptor);
            self.frames.push(callee);
          }
        }
        Flow::Return(value) => {
          if self.frames.len() == base {
            return Ok(Outcome {
              status: Status::Returned,
              instructions: self.instructions - start,
              locals: frame.locals,
              returned: value,
            })
          }
          self.resume_caller(value)?;
        }
        Flow::Throw(ex) => {
          self.frames.push(frame);
          self.unwind(base, ex)?;
        }
      }
    }
  }

  fn resume_caller(&mut self, value: Option<Value>) -> Result<()> {
    let caller = self.frames.last_mut().ok_or(Trap::NoFrame)?;
    if let Some(pc) = caller.resume.take() {
      caller.pc = pc;
    }
    if let Some(value) = value {
      caller.push(value)?;
    }
    Ok(())
  }

  /// Delivers a thrown object to the innermost matching handler at or above `base`.
  fn unwind(&mut self, base: usize, ex: Ref) -> Result<()> {
    let class_name = self.heap.class_of(ex)?;
    debug!("vm: throw {}", class_name);
    while self.frames.len() > base {
      let Some(frame) = self.frames.last_mut() else { break };
      let pc = frame.pc;
      let handler = frame.code.exception_table.iter()
        .find(|e| {
          (e.start_pc as usize) <= pc && pc < e.end_pc as usize
            && (e.catch_type == 0 || is_subclass(self.class, &class_name, self.class.constant_pool.class_name(e.catch_type)))
        })
        .map(|e| e.handler_pc as usize);
      if let Some(handler) = handler {
        debug!("vm: {} caught in {} at {}", class_name, frame.method, handler);
        frame.clear_stack();
        frame.push(Value::Reference(Some(ex)))?;
        frame.pc = handler;
        frame.resume = None;
        return Ok(())
      }
      self.frames.pop();
    }
    Err(Trap::Uncaught { message: self.heap.message(ex), class: class_name })
  }

  fn throw(&mut self, class: &str, message: &str) -> Result<Flow> {
    Ok(Flow::Throw(self.heap.new_exception(class, message)))
  }

  fn static_default(&self, descriptor: &str) -> Result<Value> {
    Ok(Value::default_for(&descriptor::parse_field(descriptor)?))
  }

  fn is_instance(&self, r: Ref, target: &str) -> Result<bool> {
    Ok(is_assignable(self.class, &self.heap.class_of(r)?, target))
  }
}

const RUNTIME: &str = "java/lang/RuntimeException";

fn builtin_super(class: &str) -> Option<&'static str> {
  let parent = match class {
    "java/lang/ArithmeticException"
    | "java/lang/NullPointerException"
    | "java/lang/NegativeArraySizeException"
    | "java/lang/ClassCastException"
    | "java/lang/IllegalArgumentException"
    | "java/lang/IllegalStateException"
    | "java/lang/UnsupportedOperationException"
    | "java/lang/IndexOutOfBoundsException"
    | "java/lang/ArrayStoreException" => RUNTIME,
    "java/lang/ArrayIndexOutOfBoundsException" => "java/lang/IndexOutOfBoundsException",
    "java/lang/NumberFormatException" => "java/lang/IllegalArgumentException",
    RUNTIME => "java/lang/Exception",
    "java/lang/Exception" | "java/lang/Error" => "java/lang/Throwable",
    "java/lang/StackOverflowError" => "java/lang/VirtualMachineError",
    "java/lang/VirtualMachineError" => "java/lang/Error",
    "java/lang/Throwable" => "java/lang/Object",
    _ => return None,
  };
  Some(parent)
}

/// Walks the superclass chain of `class`: the loaded class's own super, then
/// the built-in exception hierarchy.
pub fn is_subclass(cf: &ClassFile, class: &str, target: &str) -> bool {
  let mut current = class.to_string();
  for _ in 0..32 {
    if current == target {
      return true
    }
    let parent = if current == cf.this_class_name() {
      cf.super_class_name().map(str::to_string)
    } else {
      builtin_super(&current).map(str::to_string)
    };
    match parent {
      Some(p) => current = p,
      None => return false,
    }
  }
  false
}

/// Whether an object of runtime class `class` is an instance of `target`.
/// Reference arrays are covariant in their element class.
pub fn is_assignable(cf: &ClassFile, class: &str, target: &str) -> bool {
  if class == target || target == "java/lang/Object" {
    return true
  }
  match (class.strip_prefix('['), target.strip_prefix('[')) {
    (Some(from), Some(to)) => match (element_class(from), element_class(to)) {
      (Some(from), Some(to)) => is_assignable(cf, from, to),
      _ => false,
    },
    (Some(_), None) => matches!(target, "java/lang/Cloneable" | "java/io/Serializable"),
    (None, Some(_)) => false,
    (None, None) => is_subclass(cf, class, target),
  }
}

/// `Ljava/lang/String;` to `java/lang/String`; nested arrays stay as they are.
/// `None` for primitive elements.
fn element_class(element: &str) -> Option<&str> {
  if element.starts_with('[') {
    return Some(element)
  }
  element.strip_prefix('L').and_then(|e| e.strip_suffix(';'))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{self, ClassBuilder, CodeSpec};

  fn run(code: CodeSpec) -> anyhow::Result<Outcome> {
    let bytes = testing::class_with_main("Sample", code);
    let cf = ClassFile::parse(&bytes)?;
    let mut vm = Vm::new(&cf, ExecConfig::default(), Vec::new());
    Ok(vm.run_main()?)
  }

  #[test]
  fn test_interpreter_locals() -> anyhow::Result<()> {
    let outcome = run(testing::test_interpreter_main())?;
    assert_eq!(outcome.status, Status::Returned);
    let ints = outcome.locals[1..].iter().map(|v| v.as_int()).collect::<Vec<_>>();
    let expected = [5, 3, 8, 2, 15, 1, 2, 3, 10, -10, 11, 5];
    assert_eq!(ints, expected.iter().map(|i| Some(*i)).collect::<Vec<_>>());
    Ok(())
  }

  #[test]
  fn test_integration_locals() -> anyhow::Result<()> {
    let outcome = run(testing::test_integration_main())?;
    assert_eq!(outcome.status, Status::Returned);
    let ints = outcome.locals[1..].iter().map(|v| v.as_int()).collect::<Vec<_>>();
    let expected = [10, 20, 30, 25, 50, 16, 2, -3, 999];
    assert_eq!(ints, expected.iter().map(|i| Some(*i)).collect::<Vec<_>>());
    Ok(())
  }

  #[test]
  fn main_missing() -> anyhow::Result<()> {
    let cf = ClassFile::parse(&ClassBuilder::new("Empty").build())?;
    let mut vm = Vm::new(&cf, ExecConfig::default(), Vec::new());
    assert!(matches!(vm.run_main(), Err(Trap::MainNotFound(name)) if name == "Empty"));
    Ok(())
  }

  #[test]
  fn end_of_code_and_limit() -> anyhow::Result<()> {
    // iconst_1, istore_0: no return
    let outcome = run(CodeSpec::new(1, 1, vec![0x04, 0x3B]))?;
    assert_eq!(outcome.status, Status::EndOfCode);
    assert_eq!(outcome.locals[0], Value::Int(1));
    assert_eq!(outcome.instructions, 2);

    // goto 0 forever
    let bytes = testing::class_with_main("Spin", CodeSpec::new(0, 1, vec![0xA7, 0x00, 0x00]));
    let cf = ClassFile::parse(&bytes)?;
    let config = ExecConfig { debug: true, ..Default::default() };
    let mut vm = Vm::new(&cf, config, Vec::new());
    let outcome = vm.run_main()?;
    assert_eq!(outcome.status, Status::InstructionLimit);
    assert_eq!(outcome.instructions, DEBUG_MAX_INSTRUCTIONS);
    let out = String::from_utf8(vm.into_output())?;
    assert!(out.starts_with("[DEBUG] [PC=0] goto | stack depth: 0\n"));
    assert!(out.ends_with("[DEBUG] executed 100000 instructions: instruction limit reached\n"));
    Ok(())
  }

  #[test]
  fn clinit_runs_before_main() -> anyhow::Result<()> {
    let mut b = ClassBuilder::new("Init");
    b.field(testing::PUBLIC_STATIC, "counter", "I");
    let [c1, c2] = b.field_ref("Init", "counter", "I").to_be_bytes();
    // bipush 42, putstatic counter, return
    b.method(0x0008, "<clinit>", "()V", CodeSpec::new(1, 0, vec![0x10, 42, 0xB3, c1, c2, 0xB1]));
    // getstatic counter, istore_1, return
    b.method(testing::PUBLIC_STATIC, "main", testing::MAIN_DESC, CodeSpec::new(1, 2, vec![0xB2, c1, c2, 0x3C, 0xB1]));
    let cf = ClassFile::parse(&b.build())?;
    let mut vm = Vm::new(&cf, ExecConfig::default(), Vec::new());
    let outcome = vm.run_main()?;
    assert_eq!(outcome.locals[1], Value::Int(42));
    assert_eq!(vm.static_value("counter"), Some(Value::Int(42)));
    Ok(())
  }

  #[test]
  fn subclass_chain() -> anyhow::Result<()> {
    let cf = ClassFile::parse(&ClassBuilder::new("Sample").build())?;
    assert!(is_subclass(&cf, "java/lang/ArithmeticException", "java/lang/Exception"));
    assert!(is_subclass(&cf, "java/lang/ArrayIndexOutOfBoundsException", "java/lang/RuntimeException"));
    assert!(is_subclass(&cf, "java/lang/StackOverflowError", "java/lang/Throwable"));
    assert!(!is_subclass(&cf, "java/lang/Exception", "java/lang/RuntimeException"));
    assert!(is_subclass(&cf, "Sample", "java/lang/Object"));
    Ok(())
  }

  #[test]
  fn array_assignability() -> anyhow::Result<()> {
    let cf = ClassFile::parse(&ClassBuilder::new("Sample").build())?;
    assert!(is_assignable(&cf, "[Ljava/lang/String;", "[Ljava/lang/Object;"));
    assert!(is_assignable(&cf, "[[Ljava/lang/String;", "[[Ljava/lang/Object;"));
    assert!(is_assignable(&cf, "[[I", "[Ljava/lang/Object;"));
    assert!(is_assignable(&cf, "[LSample;", "[Ljava/lang/Object;"));
    assert!(is_assignable(&cf, "[I", "java/lang/Cloneable"));
    assert!(is_assignable(&cf, "[I", "java/lang/Object"));
    assert!(!is_assignable(&cf, "[I", "[Ljava/lang/Object;"));
    assert!(!is_assignable(&cf, "[I", "[J"));
    assert!(!is_assignable(&cf, "[Ljava/lang/Object;", "[Ljava/lang/String;"));
    assert!(!is_assignable(&cf, "java/lang/String", "[Ljava/lang/String;"));
    assert!(!is_assignable(&cf, "[Ljava/lang/String;", "java/lang/String"));
    Ok(())
  }
}
