use std::io::Write;

use crate::{
  classfile::{ClassFile, Constant},
  descriptor::{self, FieldType},
  disasm,
  opcode::Opcode,
  reader::Reader,
};

use super::{ArrayKind, Flow, Frame, Object, Ref, Result, Trap, Value, Vm};

const KINDS: [&str; 5] = ["int", "long", "float", "double", "reference"];

const NPE: &str = "java/lang/NullPointerException";
const ARITHMETIC: &str = "java/lang/ArithmeticException";
const BOUNDS: &str = "java/lang/ArrayIndexOutOfBoundsException";
const NEGATIVE_SIZE: &str = "java/lang/NegativeArraySizeException";
const CLASS_CAST: &str = "java/lang/ClassCastException";
const ARRAY_STORE: &str = "java/lang/ArrayStoreException";

struct Operands<'c> {
  r: Reader<'c>,
  pc: usize,
}

impl<'c> Operands<'c> {
  fn truncated(&self) -> Trap {
    disasm::Error::Truncated { pc: self.pc }.into()
  }

  fn u1(&mut self) -> Result<u8> {
    self.r.read_u1().map_err(|_| self.truncated())
  }

  fn u2(&mut self) -> Result<u16> {
    self.r.read_u2().map_err(|_| self.truncated())
  }

  fn i1(&mut self) -> Result<i8> {
    self.r.read_i1().map_err(|_| self.truncated())
  }

  fn i2(&mut self) -> Result<i16> {
    self.r.read_i2().map_err(|_| self.truncated())
  }

  fn i4(&mut self) -> Result<i32> {
    self.r.read_i4().map_err(|_| self.truncated())
  }

  fn next(&self) -> usize {
    self.r.position()
  }
}

macro_rules! binary {
  ($frame:ident, $pop:ident, $wrap:path, |$a:ident, $b:ident| $e:expr) => {{
    let $b = $frame.$pop()?;
    let $a = $frame.$pop()?;
    $frame.push($wrap($e))?;
  }};
}

macro_rules! unary {
  ($frame:ident, $pop:ident, $wrap:path, |$a:ident| $e:expr) => {{
    let $a = $frame.$pop()?;
    $frame.push($wrap($e))?;
  }};
}

fn load(frame: &mut Frame, index: usize, kind: &'static str) -> Result<()> {
  let value = frame.load_kind(index, kind)?;
  frame.push(value)
}

fn store(frame: &mut Frame, index: usize, kind: &'static str) -> Result<()> {
  let value = frame.pop()?;
  if value.kind() != kind {
    return Err(Trap::TypeMismatch { pc: frame.pc, expected: kind, found: value })
  }
  frame.store(index, value)
}

fn iinc(frame: &mut Frame, index: usize, delta: i32) -> Result<()> {
  match frame.load_kind(index, "int")? {
    Value::Int(i) => frame.store(index, Value::Int(i.wrapping_add(delta))),
    found => Err(Trap::TypeMismatch { pc: frame.pc, expected: "int", found }),
  }
}

fn jump(frame: &Frame, offset: i64) -> Result<Flow> {
  let target = frame.pc as i64 + offset;
  if target < 0 || target >= frame.code.code.len() as i64 {
    return Err(Trap::Branch { pc: frame.pc, target })
  }
  Ok(Flow::Next(target as usize))
}

fn fcmp(a: f64, b: f64, nan: i32) -> i32 {
  a.partial_cmp(&b).map(|o| o as i32).unwrap_or(nan)
}

impl<'a, W: Write> Vm<'a, W> {
  /// Executes the instruction at `frame.pc`.
  pub(super) fn step(&mut self, frame: &mut Frame) -> Result<Flow> {
    let code = frame.code.clone();
    let bytes = &code.code;
    let pc = frame.pc;
    let byte = bytes[pc];
    let op = Opcode::from_byte(byte).ok_or(Trap::Unsupported { opcode: byte, pc })?;
    if self.config.debug {
      writeln!(self.out, "[DEBUG] [PC={}] {} | stack depth: {}", pc, op, frame.stack.len())?;
    }
    trace!("{}@{}: {} depth {} {:?}", frame.method, pc, op, frame.depth(), frame.stack);
    let mut o = Operands { r: Reader::at(bytes, pc + 1), pc };

    use Opcode::*;
    match op {
      Nop => {}
      AconstNull => frame.push(Value::NULL)?,
      IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5 =>
        frame.push(Value::Int(byte as i32 - Iconst0 as i32))?,
      Lconst0 | Lconst1 => frame.push(Value::Long(byte as i64 - Lconst0 as i64))?,
      Fconst0 | Fconst1 | Fconst2 => frame.push(Value::Float((byte - Fconst0 as u8) as f32))?,
      Dconst0 | Dconst1 => frame.push(Value::Double((byte - Dconst0 as u8) as f64))?,
      Bipush => frame.push(Value::Int(o.i1()? as i32))?,
      Sipush => frame.push(Value::Int(o.i2()? as i32))?,
      Ldc => {
        let value = self.constant(o.u1()? as u16, pc)?;
        frame.push(value)?
      }
      LdcW | Ldc2W => {
        let value = self.constant(o.u2()?, pc)?;
        frame.push(value)?
      }

      Iload | Lload | Fload | Dload | Aload =>
        load(frame, o.u1()? as usize, KINDS[(byte - Iload as u8) as usize])?,
      _ if (Iload0 as u8..=Aload3 as u8).contains(&byte) => {
        let n = (byte - Iload0 as u8) as usize;
        load(frame, n % 4, KINDS[n / 4])?
      }
      Istore | Lstore | Fstore | Dstore | Astore =>
        store(frame, o.u1()? as usize, KINDS[(byte - Istore as u8) as usize])?,
      _ if (Istore0 as u8..=Astore3 as u8).contains(&byte) => {
        let n = (byte - Istore0 as u8) as usize;
        store(frame, n % 4, KINDS[n / 4])?
      }
      Iaload | Laload | Faload | Daload | Aaload | Baload | Caload | Saload => {
        let index = frame.pop_int()?;
        let Some(array) = frame.pop_ref()? else { return self.throw(NPE, "") };
        let elements = self.elements(array, frame.pc)?;
        match usize::try_from(index).ok().and_then(|i| elements.get(i)) {
          Some(value) => frame.push(*value)?,
          None => {
            let message = format!("Index {} out of bounds for length {}", index, elements.len());
            return self.throw(BOUNDS, &message)
          }
        }
      }
      Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore | Sastore => {
        let value = frame.pop()?;
        let index = frame.pop_int()?;
        let Some(array) = frame.pop_ref()? else { return self.throw(NPE, "") };
        let (kind, len) = match self.heap.get(array)? {
          Object::Array { kind, elements } => (kind.clone(), elements.len()),
          _ => return Err(Trap::TypeMismatch { pc, expected: "array", found: Value::Reference(Some(array)) }),
        };
        if value.kind() != kind.value_kind() {
          return Err(Trap::TypeMismatch { pc, expected: kind.value_kind(), found: value })
        }
        let Some(i) = usize::try_from(index).ok().filter(|i| *i < len) else {
          let message = format!("Index {} out of bounds for length {}", index, len);
          return self.throw(BOUNDS, &message)
        };
        if let (ArrayKind::Reference(element), Value::Reference(Some(r))) = (&kind, value) {
          if !self.is_instance(r, element)? {
            let message = self.heap.class_of(r)?.replace('/', ".");
            return self.throw(ARRAY_STORE, &message)
          }
        }
        if let Object::Array { elements, .. } = self.heap.get_mut(array)? {
          elements[i] = kind.narrow(value);
        }
      }

      Pop => { frame.pop()?; }
      Pop2 => {
        if !frame.pop()?.is_wide() {
          frame.pop()?;
        }
      }
      Dup => {
        let v = frame.peek()?;
        frame.push(v)?
      }
      DupX1 => {
        let v1 = frame.pop()?;
        let v2 = frame.pop()?;
        for v in [v1, v2, v1] { frame.push(v)? }
      }
      DupX2 => {
        let v1 = frame.pop()?;
        let v2 = frame.pop()?;
        if v2.is_wide() {
          for v in [v1, v2, v1] { frame.push(v)? }
        } else {
          let v3 = frame.pop()?;
          for v in [v1, v3, v2, v1] { frame.push(v)? }
        }
      }
      Dup2 => {
        let v1 = frame.pop()?;
        if v1.is_wide() {
          for v in [v1, v1] { frame.push(v)? }
        } else {
          let v2 = frame.pop()?;
          for v in [v2, v1, v2, v1] { frame.push(v)? }
        }
      }
      Dup2X1 => {
        let v1 = frame.pop()?;
        let v2 = frame.pop()?;
        if v1.is_wide() {
          for v in [v1, v2, v1] { frame.push(v)? }
        } else {
          let v3 = frame.pop()?;
          for v in [v2, v1, v3, v2, v1] { frame.push(v)? }
        }
      }
      Dup2X2 => {
        let v1 = frame.pop()?;
        let v2 = frame.pop()?;
        match (v1.is_wide(), v2.is_wide()) {
          (true, true) => for v in [v1, v2, v1] { frame.push(v)? },
          (true, false) => {
            let v3 = frame.pop()?;
            for v in [v1, v3, v2, v1] { frame.push(v)? }
          }
          (false, _) => {
            let v3 = frame.pop()?;
            if v3.is_wide() {
              for v in [v2, v1, v3, v2, v1] { frame.push(v)? }
            } else {
              let v4 = frame.pop()?;
              for v in [v2, v1, v4, v3, v2, v1] { frame.push(v)? }
            }
          }
        }
      }
      Swap => {
        let v1 = frame.pop()?;
        let v2 = frame.pop()?;
        frame.push(v1)?;
        frame.push(v2)?
      }

      Iadd => binary!(frame, pop_int, Value::Int, |a, b| a.wrapping_add(b)),
      Ladd => binary!(frame, pop_long, Value::Long, |a, b| a.wrapping_add(b)),
      Fadd => binary!(frame, pop_float, Value::Float, |a, b| a + b),
      Dadd => binary!(frame, pop_double, Value::Double, |a, b| a + b),
      Isub => binary!(frame, pop_int, Value::Int, |a, b| a.wrapping_sub(b)),
      Lsub => binary!(frame, pop_long, Value::Long, |a, b| a.wrapping_sub(b)),
      Fsub => binary!(frame, pop_float, Value::Float, |a, b| a - b),
      Dsub => binary!(frame, pop_double, Value::Double, |a, b| a - b),
      Imul => binary!(frame, pop_int, Value::Int, |a, b| a.wrapping_mul(b)),
      Lmul => binary!(frame, pop_long, Value::Long, |a, b| a.wrapping_mul(b)),
      Fmul => binary!(frame, pop_float, Value::Float, |a, b| a * b),
      Dmul => binary!(frame, pop_double, Value::Double, |a, b| a * b),
      Idiv | Irem => {
        let b = frame.pop_int()?;
        let a = frame.pop_int()?;
        if b == 0 {
          return self.throw(ARITHMETIC, "/ by zero")
        }
        frame.push(Value::Int(if op == Idiv { a.wrapping_div(b) } else { a.wrapping_rem(b) }))?
      }
      Ldiv | Lrem => {
        let b = frame.pop_long()?;
        let a = frame.pop_long()?;
        if b == 0 {
          return self.throw(ARITHMETIC, "/ by zero")
        }
        frame.push(Value::Long(if op == Ldiv { a.wrapping_div(b) } else { a.wrapping_rem(b) }))?
      }
      Fdiv => binary!(frame, pop_float, Value::Float, |a, b| a / b),
      Ddiv => binary!(frame, pop_double, Value::Double, |a, b| a / b),
      Frem => binary!(frame, pop_float, Value::Float, |a, b| a % b),
      Drem => binary!(frame, pop_double, Value::Double, |a, b| a % b),
      Ineg => unary!(frame, pop_int, Value::Int, |a| a.wrapping_neg()),
      Lneg => unary!(frame, pop_long, Value::Long, |a| a.wrapping_neg()),
      Fneg => unary!(frame, pop_float, Value::Float, |a| -a),
      Dneg => unary!(frame, pop_double, Value::Double, |a| -a),

      Ishl | Ishr | Iushr => {
        let shift = (frame.pop_int()? & 0x1f) as u32;
        let a = frame.pop_int()?;
        frame.push(Value::Int(match op {
          Ishl => a.wrapping_shl(shift),
          Ishr => a >> shift,
          _ => ((a as u32) >> shift) as i32,
        }))?
      }
      Lshl | Lshr | Lushr => {
        let shift = (frame.pop_int()? & 0x3f) as u32;
        let a = frame.pop_long()?;
        frame.push(Value::Long(match op {
          Lshl => a.wrapping_shl(shift),
          Lshr => a >> shift,
          _ => ((a as u64) >> shift) as i64,
        }))?
      }
      Iand => binary!(frame, pop_int, Value::Int, |a, b| a & b),
      Land => binary!(frame, pop_long, Value::Long, |a, b| a & b),
      Ior => binary!(frame, pop_int, Value::Int, |a, b| a | b),
      Lor => binary!(frame, pop_long, Value::Long, |a, b| a | b),
      Ixor => binary!(frame, pop_int, Value::Int, |a, b| a ^ b),
      Lxor => binary!(frame, pop_long, Value::Long, |a, b| a ^ b),
      Iinc => {
        let index = o.u1()? as usize;
        let delta = o.i1()? as i32;
        iinc(frame, index, delta)?
      }

      I2l => unary!(frame, pop_int, Value::Long, |a| a as i64),
      I2f => unary!(frame, pop_int, Value::Float, |a| a as f32),
      I2d => unary!(frame, pop_int, Value::Double, |a| a as f64),
      L2i => unary!(frame, pop_long, Value::Int, |a| a as i32),
      L2f => unary!(frame, pop_long, Value::Float, |a| a as f32),
      L2d => unary!(frame, pop_long, Value::Double, |a| a as f64),
      F2i => unary!(frame, pop_float, Value::Int, |a| a as i32),
      F2l => unary!(frame, pop_float, Value::Long, |a| a as i64),
      F2d => unary!(frame, pop_float, Value::Double, |a| a as f64),
      D2i => unary!(frame, pop_double, Value::Int, |a| a as i32),
      D2l => unary!(frame, pop_double, Value::Long, |a| a as i64),
      D2f => unary!(frame, pop_double, Value::Float, |a| a as f32),
      I2b => unary!(frame, pop_int, Value::Int, |a| a as i8 as i32),
      I2c => unary!(frame, pop_int, Value::Int, |a| a as u16 as i32),
      I2s => unary!(frame, pop_int, Value::Int, |a| a as i16 as i32),

      Lcmp => binary!(frame, pop_long, Value::Int, |a, b| a.cmp(&b) as i32),
      Fcmpl => binary!(frame, pop_float, Value::Int, |a, b| fcmp(a as f64, b as f64, -1)),
      Fcmpg => binary!(frame, pop_float, Value::Int, |a, b| fcmp(a as f64, b as f64, 1)),
      Dcmpl => binary!(frame, pop_double, Value::Int, |a, b| fcmp(a, b, -1)),
      Dcmpg => binary!(frame, pop_double, Value::Int, |a, b| fcmp(a, b, 1)),

      Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle => {
        let offset = o.i2()? as i64;
        let v = frame.pop_int()?;
        let taken = match op {
          Ifeq => v == 0,
          Ifne => v != 0,
          Iflt => v < 0,
          Ifge => v >= 0,
          Ifgt => v > 0,
          _ => v <= 0,
        };
        if taken {
          return jump(frame, offset)
        }
      }
      IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple => {
        let offset = o.i2()? as i64;
        let b = frame.pop_int()?;
        let a = frame.pop_int()?;
        let taken = match op {
          IfIcmpeq => a == b,
          IfIcmpne => a != b,
          IfIcmplt => a < b,
          IfIcmpge => a >= b,
          IfIcmpgt => a > b,
          _ => a <= b,
        };
        if taken {
          return jump(frame, offset)
        }
      }
      IfAcmpeq | IfAcmpne => {
        let offset = o.i2()? as i64;
        let b = frame.pop_ref()?;
        let a = frame.pop_ref()?;
        if (a == b) == (op == IfAcmpeq) {
          return jump(frame, offset)
        }
      }
      Ifnull | Ifnonnull => {
        let offset = o.i2()? as i64;
        let r = frame.pop_ref()?;
        if r.is_none() == (op == Ifnull) {
          return jump(frame, offset)
        }
      }
      Goto => return jump(frame, o.i2()? as i64),
      GotoW => return jump(frame, o.i4()? as i64),
      Tableswitch | Lookupswitch => {
        let switch = disasm::decode_switch(bytes, pc)?;
        let key = frame.pop_int()?;
        return jump(frame, switch.offset_for(key) as i64)
      }

      Ireturn => return Ok(Flow::Return(Some(Value::Int(frame.pop_int()?)))),
      Lreturn => return Ok(Flow::Return(Some(Value::Long(frame.pop_long()?)))),
      Freturn => return Ok(Flow::Return(Some(Value::Float(frame.pop_float()?)))),
      Dreturn => return Ok(Flow::Return(Some(Value::Double(frame.pop_double()?)))),
      Areturn => return Ok(Flow::Return(Some(Value::Reference(frame.pop_ref()?)))),
      Return => return Ok(Flow::Return(None)),

      Getstatic => {
        let index = o.u2()?;
        let value = self.get_static(index, pc)?;
        frame.push(value)?
      }
      Putstatic => {
        let index = o.u2()?;
        let value = frame.pop()?;
        self.put_static(index, pc, value)?
      }
      Getfield => {
        let index = o.u2()?;
        let Some(obj) = frame.pop_ref()? else { return self.throw(NPE, "") };
        let value = self.get_field(obj, index, pc)?;
        frame.push(value)?
      }
      Putfield => {
        let index = o.u2()?;
        let value = frame.pop()?;
        let Some(obj) = frame.pop_ref()? else { return self.throw(NPE, "") };
        self.put_field(obj, index, pc, value)?
      }
      Invokevirtual | Invokespecial | Invokestatic | Invokeinterface => {
        let index = o.u2()?;
        if op == Invokeinterface {
          o.u1()?;
          o.u1()?;
        }
        return self.invoke_method(frame, op, index, o.next())
      }

      New => {
        let index = o.u2()?;
        let class = self.class_ref(index, pc)?;
        let r = match class {
          "java/lang/StringBuilder" => self.heap.alloc(Object::Builder(String::new())),
          _ => self.heap.new_instance(class),
        };
        frame.push(Value::Reference(Some(r)))?
      }
      Newarray => {
        let atype = o.u1()?;
        let kind = ArrayKind::from_atype(atype).ok_or(Trap::Unsupported { opcode: byte, pc })?;
        let count = frame.pop_int()?;
        if count < 0 {
          return self.throw(NEGATIVE_SIZE, &count.to_string())
        }
        let r = self.heap.new_array(kind, count as usize);
        frame.push(Value::Reference(Some(r)))?
      }
      Anewarray => {
        let index = o.u2()?;
        let class = self.class_ref(index, pc)?;
        let count = frame.pop_int()?;
        if count < 0 {
          return self.throw(NEGATIVE_SIZE, &count.to_string())
        }
        let r = self.heap.new_array(ArrayKind::Reference(class.to_string()), count as usize);
        frame.push(Value::Reference(Some(r)))?
      }
      Multianewarray => {
        let index = o.u2()?;
        let dims = o.u1()? as usize;
        let ty = descriptor::parse_field(self.class_ref(index, pc)?)?;
        let mut counts = Vec::with_capacity(dims);
        for _ in 0..dims {
          counts.push(frame.pop_int()?);
        }
        counts.reverse();
        if let Some(count) = counts.iter().find(|c| **c < 0) {
          return self.throw(NEGATIVE_SIZE, &count.to_string())
        }
        let r = self.multi_array(&ty, &counts, index, pc)?;
        frame.push(Value::Reference(Some(r)))?
      }
      Arraylength => {
        let Some(array) = frame.pop_ref()? else { return self.throw(NPE, "") };
        let len = self.elements(array, pc)?.len();
        frame.push(Value::Int(len as i32))?
      }
      Athrow => {
        let Some(ex) = frame.pop_ref()? else { return self.throw(NPE, "") };
        return Ok(Flow::Throw(ex))
      }
      Checkcast => {
        let index = o.u2()?;
        let target = self.class_ref(index, pc)?;
        if let Value::Reference(Some(r)) = frame.peek()? {
          if !self.is_instance(r, target)? {
            let message = format!("class {} cannot be cast to class {}", self.heap.class_of(r)?, target);
            return self.throw(CLASS_CAST, &message)
          }
        }
      }
      Instanceof => {
        let index = o.u2()?;
        let target = self.class_ref(index, pc)?;
        let result = match frame.pop_ref()? {
          Some(r) => self.is_instance(r, target)?,
          None => false,
        };
        frame.push(Value::Int(result as i32))?
      }
      Monitorenter | Monitorexit => {
        if frame.pop_ref()?.is_none() {
          return self.throw(NPE, "")
        }
      }
      Wide => {
        let inner = o.u1()?;
        match Opcode::from_byte(inner) {
          Some(Iload | Lload | Fload | Dload | Aload) =>
            load(frame, o.u2()? as usize, KINDS[(inner - Iload as u8) as usize])?,
          Some(Istore | Lstore | Fstore | Dstore | Astore) =>
            store(frame, o.u2()? as usize, KINDS[(inner - Istore as u8) as usize])?,
          Some(Iinc) => {
            let index = o.u2()? as usize;
            let delta = o.i2()? as i32;
            iinc(frame, index, delta)?
          }
          Some(Ret) => return Err(Trap::Unsupported { opcode: inner, pc }),
          _ => return Err(disasm::Error::Wide { pc, opcode: inner }.into()),
        }
      }

      Jsr | JsrW | Ret | Invokedynamic | Breakpoint | Impdep1 | Impdep2 =>
        return Err(Trap::Unsupported { opcode: byte, pc }),
      // the `_n` loads and stores are matched by the range guards above
      _ => return Err(Trap::Unsupported { opcode: byte, pc }),
    }
    Ok(Flow::Next(o.next()))
  }

  fn constant(&mut self, index: u16, pc: usize) -> Result<Value> {
    let class = self.class;
    let value = match class.constant_pool.get(index) {
      Some(Constant::Integer(i)) => Value::Int(*i),
      Some(Constant::Float(f)) => Value::Float(*f),
      Some(Constant::Long(l)) => Value::Long(*l),
      Some(Constant::Double(d)) => Value::Double(*d),
      Some(Constant::String { string_index }) => Value::Reference(Some(self.heap.intern(class.utf8(*string_index)))),
      Some(Constant::Class { name_index }) => {
        let name = self.heap.intern(class.utf8(*name_index));
        let r = self.heap.new_instance("java/lang/Class");
        if let Object::Instance { fields, .. } = self.heap.get_mut(r)? {
          fields.insert("name".to_string(), Value::Reference(Some(name)));
        }
        Value::Reference(Some(r))
      }
      _ => return Err(Trap::Constant { index, pc }),
    };
    Ok(value)
  }

  fn class_ref(&self, index: u16, pc: usize) -> Result<&'a str> {
    let class: &'a ClassFile = self.class;
    match class.constant_pool.class_name(index) {
      "" => Err(Trap::Constant { index, pc }),
      name => Ok(name),
    }
  }

  fn member_ref(&self, index: u16, pc: usize) -> Result<(&'a str, &'a str, &'a str)> {
    let class: &'a ClassFile = self.class;
    match class.constant_pool.member_ref(index) {
      ("", _, _) => Err(Trap::Constant { index, pc }),
      member => Ok(member),
    }
  }

  fn elements(&self, array: Ref, pc: usize) -> Result<&Vec<Value>> {
    match self.heap.get(array)? {
      Object::Array { elements, .. } => Ok(elements),
      _ => Err(Trap::TypeMismatch { pc, expected: "array", found: Value::Reference(Some(array)) }),
    }
  }

  fn get_static(&mut self, index: u16, pc: usize) -> Result<Value> {
    let (class, name, desc) = self.member_ref(index, pc)?;
    if class == self.class.this_class_name() {
      return match self.statics.get(name) {
        Some(value) => Ok(*value),
        None => self.static_default(desc),
      }
    }
    match (class, name) {
      ("java/lang/System", "out") => Ok(Value::Reference(Some(self.system_out))),
      ("java/lang/System", "err") => Ok(Value::Reference(Some(self.system_err))),
      _ => Err(Trap::FieldNotFound { class: class.to_string(), name: name.to_string() }),
    }
  }

  fn put_static(&mut self, index: u16, pc: usize, value: Value) -> Result<()> {
    let (class, name, _) = self.member_ref(index, pc)?;
    if class != self.class.this_class_name() {
      return Err(Trap::FieldNotFound { class: class.to_string(), name: name.to_string() })
    }
    self.statics.insert(name.to_string(), value);
    Ok(())
  }

  fn get_field(&self, obj: Ref, index: u16, pc: usize) -> Result<Value> {
    let (class, name, desc) = self.member_ref(index, pc)?;
    match self.heap.get(obj)? {
      Object::Instance { fields, .. } => match fields.get(name) {
        Some(value) => Ok(*value),
        None => self.static_default(desc),
      },
      _ => Err(Trap::FieldNotFound { class: class.to_string(), name: name.to_string() }),
    }
  }

  fn put_field(&mut self, obj: Ref, index: u16, pc: usize, value: Value) -> Result<()> {
    let (class, name, _) = self.member_ref(index, pc)?;
    match self.heap.get_mut(obj)? {
      Object::Instance { fields, .. } => {
        fields.insert(name.to_string(), value);
        Ok(())
      }
      _ => Err(Trap::FieldNotFound { class: class.to_string(), name: name.to_string() }),
    }
  }

  fn multi_array(&mut self, ty: &FieldType, counts: &[i32], index: u16, pc: usize) -> Result<Ref> {
    let (FieldType::Array(element), Some(&count)) = (ty, counts.first()) else {
      return Err(Trap::Constant { index, pc })
    };
    let r = self.heap.new_array(ArrayKind::from_element(element), count as usize);
    if counts.len() > 1 {
      for i in 0..count as usize {
        let sub = self.multi_array(element, &counts[1..], index, pc)?;
        if let Object::Array { elements, .. } = self.heap.get_mut(r)? {
          elements[i] = Value::Reference(Some(sub));
        }
      }
    }
    Ok(r)
  }

  fn invoke_method(&mut self, frame: &mut Frame, op: Opcode, index: u16, next: usize) -> Result<Flow> {
    let (class, name, desc) = self.member_ref(index, frame.pc)?;
    let method = descriptor::parse_method(desc)?;
    let mut args = Vec::with_capacity(method.params.len() + 1);
    for _ in &method.params {
      args.push(frame.pop()?);
    }
    if op != Opcode::Invokestatic {
      // `Integer` receivers stay unboxed
      match frame.pop()? {
        Value::Reference(None) => return self.throw(NPE, ""),
        receiver => args.push(receiver),
      }
    }
    args.reverse();

    if class == self.class.this_class_name() {
      if let Some(target) = self.method_index(name, desc) {
        let mut callee = self.new_frame(target)?;
        let mut slot = 0;
        for arg in &args {
          callee.store(slot, *arg)?;
          slot += arg.slots();
        }
        frame.resume = Some(next);
        return Ok(Flow::Invoke(callee))
      }
    }
    if let Some(value) = self.native(class, name, desc, &method, &args, frame.pc)? {
      frame.push(value)?;
    }
    Ok(Flow::Next(next))
  }
}
