use std::io::Write;

use crate::{
  descriptor::{FieldType, MethodDescriptor},
  resolve,
};

use super::{ArrayKind, Object, Ref, Result, Trap, Value, Vm};

impl<'a, W: Write> Vm<'a, W> {
  /// Library methods the interpreter provides itself. `args` start with the
  /// receiver for instance methods; `pc` is the calling instruction.
  pub(super) fn native(
    &mut self,
    class: &str,
    name: &str,
    desc: &str,
    method: &MethodDescriptor,
    args: &[Value],
    pc: usize,
  ) -> Result<Option<Value>> {
    let not_found = || Trap::MethodNotFound {
      class: class.to_string(),
      name: name.to_string(),
      descriptor: desc.to_string(),
    };
    trace!("vm: native {}.{}{}", class, name, desc);

    let ret = match (class, name) {
      ("java/io/PrintStream", "println" | "print") => {
        let text = match args.get(1) {
          Some(v) => self.render(v, method.params.first(), pc)?,
          None => String::new(),
        };
        if name == "println" {
          writeln!(self.out, "{}", text)?;
        } else {
          write!(self.out, "{}", text)?;
        }
        None
      }
      ("java/lang/Math", "abs") => Some(match args {
        [Value::Int(a)] => Value::Int(a.wrapping_abs()),
        [Value::Long(a)] => Value::Long(a.wrapping_abs()),
        [Value::Float(a)] => Value::Float(a.abs()),
        [Value::Double(a)] => Value::Double(a.abs()),
        _ => return Err(not_found()),
      }),
      ("java/lang/Math", "max" | "min") => {
        let max = name == "max";
        Some(match args {
          [Value::Int(a), Value::Int(b)] => Value::Int(if max { *a.max(b) } else { *a.min(b) }),
          [Value::Long(a), Value::Long(b)] => Value::Long(if max { *a.max(b) } else { *a.min(b) }),
          [Value::Float(a), Value::Float(b)] => Value::Float(if max { a.max(*b) } else { a.min(*b) }),
          [Value::Double(a), Value::Double(b)] => Value::Double(if max { a.max(*b) } else { a.min(*b) }),
          _ => return Err(not_found()),
        })
      }
      // boxed integers stay unboxed
      ("java/lang/Integer", "valueOf" | "intValue") => match args {
        [v @ Value::Int(_)] | [v @ Value::Reference(_)] => Some(*v),
        _ => return Err(not_found()),
      },
      ("java/lang/String", "length") => {
        let s = self.receiver_string(args).ok_or_else(not_found)?;
        Some(Value::Int(s.encode_utf16().count() as i32))
      }
      ("java/lang/StringBuilder", "<init>") => {
        let initial = match args.get(1) {
          Some(v) => self.render(v, method.params.first(), pc)?,
          None => String::new(),
        };
        *self.builder(args).ok_or_else(not_found)? = initial;
        None
      }
      ("java/lang/StringBuilder", "append") => {
        let text = match args.get(1) {
          Some(v) => self.render(v, method.params.first(), pc)?,
          None => return Err(not_found()),
        };
        self.builder(args).ok_or_else(not_found)?.push_str(&text);
        args.first().copied()
      }
      ("java/lang/StringBuilder", "toString") => {
        let s = self.receiver_string(args).ok_or_else(not_found)?.to_string();
        Some(Value::Reference(Some(self.heap.alloc(Object::Str(s)))))
      }
      ("java/lang/Object", "hashCode") => match args.first() {
        Some(Value::Reference(Some(r))) => Some(Value::Int(r.0 as i32)),
        _ => return Err(not_found()),
      },
      (_, "<init>") => {
        if let [Value::Reference(Some(this)), message] = args {
          if let Object::Instance { fields, .. } = self.heap.get_mut(*this)? {
            fields.insert("message".to_string(), *message);
          }
        }
        None
      }
      (_, "getMessage") => {
        let Some(Value::Reference(Some(this))) = args.first() else { return Err(not_found()) };
        match self.heap.get(*this)? {
          Object::Instance { fields, .. } => Some(fields.get("message").copied().unwrap_or(Value::NULL)),
          _ => return Err(not_found()),
        }
      }
      _ => return Err(not_found()),
    };
    Ok(ret)
  }

  fn receiver_string(&self, args: &[Value]) -> Option<&str> {
    match args.first() {
      Some(Value::Reference(Some(r))) => self.heap.string(*r),
      _ => None,
    }
  }

  fn builder(&mut self, args: &[Value]) -> Option<&mut String> {
    let Some(Value::Reference(Some(r))) = args.first() else { return None };
    match self.heap.get_mut(*r).ok()? {
      Object::Builder(s) => Some(s),
      _ => None,
    }
  }

  /// Text of a value the way `PrintStream.print` and `StringBuilder.append`
  /// show it, given the declared parameter type.
  fn render(&self, value: &Value, ty: Option<&FieldType>, pc: usize) -> Result<String> {
    let text = match (ty, value) {
      (Some(FieldType::Boolean), Value::Int(i)) => (*i != 0).to_string(),
      (Some(FieldType::Char), Value::Int(i)) => to_char(*i).to_string(),
      (_, Value::Int(i)) => i.to_string(),
      (_, Value::Long(l)) => l.to_string(),
      (_, Value::Float(f)) => resolve::java_float(*f as f64, format!("{:?}", f)),
      (_, Value::Double(d)) => resolve::java_float(*d, format!("{:?}", d)),
      (_, Value::Reference(None)) => "null".to_string(),
      (_, Value::Reference(Some(r))) => self.render_object(*r)?,
      (_, Value::Top) => return Err(Trap::TypeMismatch { pc, expected: "value", found: Value::Top }),
    };
    Ok(text)
  }

  fn render_object(&self, r: Ref) -> Result<String> {
    let text = match self.heap.get(r)? {
      Object::Str(s) | Object::Builder(s) => s.clone(),
      Object::Array { kind: ArrayKind::Char, elements } => elements.iter()
        .filter_map(Value::as_int)
        .map(to_char)
        .collect(),
      _ => format!("{}@{:x}", self.heap.class_of(r)?.replace('/', "."), r.0),
    };
    Ok(text)
  }
}

fn to_char(i: i32) -> char {
  char::from_u32(i as u16 as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}

#[cfg(test)]
mod tests {
  use crate::classfile::ClassFile;
  use crate::descriptor::FieldType;
  use crate::testing::{self, ClassBuilder, CodeSpec};
  use crate::vm::{ExecConfig, Trap, Value, Vm};

  fn printed(build: impl FnOnce(&mut ClassBuilder) -> CodeSpec) -> anyhow::Result<String> {
    let mut b = ClassBuilder::new("Hello");
    let code = build(&mut b);
    b.method(testing::PUBLIC_STATIC, "main", testing::MAIN_DESC, code);
    let cf = ClassFile::parse(&b.build())?;
    let mut vm = Vm::new(&cf, ExecConfig::default(), Vec::new());
    vm.run_main()?;
    Ok(String::from_utf8(vm.into_output())?)
  }

  fn u2(index: u16) -> [u8; 2] {
    index.to_be_bytes()
  }

  #[test]
  fn println_overloads() -> anyhow::Result<()> {
    let out = printed(|b| {
      let [o1, o2] = u2(b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;"));
      let [s1, s2] = u2(b.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V"));
      let [i1, i2] = u2(b.method_ref("java/io/PrintStream", "println", "(I)V"));
      let [z1, z2] = u2(b.method_ref("java/io/PrintStream", "println", "(Z)V"));
      let [c1, c2] = u2(b.method_ref("java/io/PrintStream", "print", "(C)V"));
      let [d1, d2] = u2(b.method_ref("java/io/PrintStream", "println", "(D)V"));
      let hello = b.string("hello") as u8;
      CodeSpec::new(3, 1, vec![
        0xB2, o1, o2, 0x12, hello, 0xB6, s1, s2,
        0xB2, o1, o2, 0x10, 0xF9, 0xB6, i1, i2,
        0xB2, o1, o2, 0x04, 0xB6, z1, z2,
        0xB2, o1, o2, 0x10, b'x', 0xB6, c1, c2,
        0xB2, o1, o2, 0x0F, 0xB6, d1, d2,
        0xB1,
      ])
    })?;
    assert_eq!(out, "hello\n-7\ntrue\nx1.0\n");
    Ok(())
  }

  #[test]
  fn string_builder_and_math() -> anyhow::Result<()> {
    let out = printed(|b| {
      let sb = b.class("java/lang/StringBuilder");
      let [o1, o2] = u2(b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;"));
      let [n1, n2] = u2(sb);
      let [init1, init2] = u2(b.method_ref("java/lang/StringBuilder", "<init>", "()V"));
      let [as1, as2] = u2(b.method_ref("java/lang/StringBuilder", "append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;"));
      let [ai1, ai2] = u2(b.method_ref("java/lang/StringBuilder", "append", "(I)Ljava/lang/StringBuilder;"));
      let [ts1, ts2] = u2(b.method_ref("java/lang/StringBuilder", "toString", "()Ljava/lang/String;"));
      let [m1, m2] = u2(b.method_ref("java/lang/Math", "max", "(II)I"));
      let [p1, p2] = u2(b.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V"));
      let max = b.string("max=") as u8;
      CodeSpec::new(4, 1, vec![
        0xB2, o1, o2,
        0xBB, n1, n2, 0x59, 0xB7, init1, init2,
        0x12, max, 0xB6, as1, as2,
        0x10, 3, 0x10, 9, 0xB8, m1, m2, 0xB6, ai1, ai2,
        0xB6, ts1, ts2,
        0xB6, p1, p2,
        0xB1,
      ])
    })?;
    assert_eq!(out, "max=9\n");
    Ok(())
  }

  #[test]
  fn unknown_library_method() -> anyhow::Result<()> {
    let result = printed(|b| {
      let [m1, m2] = u2(b.method_ref("java/util/List", "of", "()Ljava/util/List;"));
      CodeSpec::new(1, 1, vec![0xB8, m1, m2, 0x57, 0xB1])
    });
    let err = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert_eq!(err, "method java/util/List.of:()Ljava/util/List; not found");
    Ok(())
  }

  #[test]
  fn render_reports_calling_pc() -> anyhow::Result<()> {
    let cf = ClassFile::parse(&ClassBuilder::new("Hello").build())?;
    let vm = Vm::new(&cf, ExecConfig::default(), Vec::new());
    assert_eq!(vm.render(&Value::Int(65), Some(&FieldType::Char), 4)?, "A");
    match vm.render(&Value::Top, None, 17) {
      Err(Trap::TypeMismatch { pc, expected, found }) => {
        assert_eq!(pc, 17);
        assert_eq!(expected, "value");
        assert_eq!(found, Value::Top);
      }
      other => panic!("unexpected {:?}", other),
    }
    Ok(())
  }

  #[test]
  fn boxed_integer_receiver() -> anyhow::Result<()> {
    let out = printed(|b| {
      let [o1, o2] = u2(b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;"));
      let [v1, v2] = u2(b.method_ref("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;"));
      let [i1, i2] = u2(b.method_ref("java/lang/Integer", "intValue", "()I"));
      let [p1, p2] = u2(b.method_ref("java/io/PrintStream", "println", "(I)V"));
      CodeSpec::new(2, 1, vec![
        0xB2, o1, o2,
        0x10, 42, 0xB8, v1, v2, 0xB6, i1, i2,
        0xB6, p1, p2,
        0xB1,
      ])
    })?;
    assert_eq!(out, "42\n");
    Ok(())
  }
}
