/// Every instruction the JVM defines, by its byte value.
///
/// Mnemonics come from `strum`; names holding a digit are spelled out since
/// the snake-case conversion would drop their underscore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::FromRepr, strum::IntoStaticStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Opcode {
  Nop = 0x00,
  AconstNull,
  #[strum(serialize = "iconst_m1")] IconstM1,
  #[strum(serialize = "iconst_0")] Iconst0,
  #[strum(serialize = "iconst_1")] Iconst1,
  #[strum(serialize = "iconst_2")] Iconst2,
  #[strum(serialize = "iconst_3")] Iconst3,
  #[strum(serialize = "iconst_4")] Iconst4,
  #[strum(serialize = "iconst_5")] Iconst5,
  #[strum(serialize = "lconst_0")] Lconst0,
  #[strum(serialize = "lconst_1")] Lconst1,
  #[strum(serialize = "fconst_0")] Fconst0,
  #[strum(serialize = "fconst_1")] Fconst1,
  #[strum(serialize = "fconst_2")] Fconst2,
  #[strum(serialize = "dconst_0")] Dconst0,
  #[strum(serialize = "dconst_1")] Dconst1,
  Bipush = 0x10,
  Sipush,
  Ldc,
  LdcW,
  #[strum(serialize = "ldc2_w")] Ldc2W,
  Iload = 0x15,
  Lload,
  Fload,
  Dload,
  Aload,
  #[strum(serialize = "iload_0")] Iload0 = 0x1a,
  #[strum(serialize = "iload_1")] Iload1,
  #[strum(serialize = "iload_2")] Iload2,
  #[strum(serialize = "iload_3")] Iload3,
  #[strum(serialize = "lload_0")] Lload0,
  #[strum(serialize = "lload_1")] Lload1,
  #[strum(serialize = "lload_2")] Lload2,
  #[strum(serialize = "lload_3")] Lload3,
  #[strum(serialize = "fload_0")] Fload0,
  #[strum(serialize = "fload_1")] Fload1,
  #[strum(serialize = "fload_2")] Fload2,
  #[strum(serialize = "fload_3")] Fload3,
  #[strum(serialize = "dload_0")] Dload0,
  #[strum(serialize = "dload_1")] Dload1,
  #[strum(serialize = "dload_2")] Dload2,
  #[strum(serialize = "dload_3")] Dload3,
  #[strum(serialize = "aload_0")] Aload0,
  #[strum(serialize = "aload_1")] Aload1,
  #[strum(serialize = "aload_2")] Aload2,
  #[strum(serialize = "aload_3")] Aload3,
  Iaload = 0x2e,
  Laload,
  Faload,
  Daload,
  Aaload,
  Baload,
  Caload,
  Saload,
  Istore = 0x36,
  Lstore,
  Fstore,
  Dstore,
  Astore,
  #[strum(serialize = "istore_0")] Istore0 = 0x3b,
  #[strum(serialize = "istore_1")] Istore1,
  #[strum(serialize = "istore_2")] Istore2,
  #[strum(serialize = "istore_3")] Istore3,
  #[strum(serialize = "lstore_0")] Lstore0,
  #[strum(serialize = "lstore_1")] Lstore1,
  #[strum(serialize = "lstore_2")] Lstore2,
  #[strum(serialize = "lstore_3")] Lstore3,
  #[strum(serialize = "fstore_0")] Fstore0,
  #[strum(serialize = "fstore_1")] Fstore1,
  #[strum(serialize = "fstore_2")] Fstore2,
  #[strum(serialize = "fstore_3")] Fstore3,
  #[strum(serialize = "dstore_0")] Dstore0,
  #[strum(serialize = "dstore_1")] Dstore1,
  #[strum(serialize = "dstore_2")] Dstore2,
  #[strum(serialize = "dstore_3")] Dstore3,
  #[strum(serialize = "astore_0")] Astore0,
  #[strum(serialize = "astore_1")] Astore1,
  #[strum(serialize = "astore_2")] Astore2,
  #[strum(serialize = "astore_3")] Astore3,
  Iastore = 0x4f,
  Lastore,
  Fastore,
  Dastore,
  Aastore,
  Bastore,
  Castore,
  Sastore,
  Pop = 0x57,
  #[strum(serialize = "pop2")] Pop2,
  Dup,
  #[strum(serialize = "dup_x1")] DupX1,
  #[strum(serialize = "dup_x2")] DupX2,
  #[strum(serialize = "dup2")] Dup2,
  #[strum(serialize = "dup2_x1")] Dup2X1,
  #[strum(serialize = "dup2_x2")] Dup2X2,
  Swap,
  Iadd = 0x60, Ladd, Fadd, Dadd,
  Isub, Lsub, Fsub, Dsub,
  Imul, Lmul, Fmul, Dmul,
  Idiv, Ldiv, Fdiv, Ddiv,
  Irem, Lrem, Frem, Drem,
  Ineg, Lneg, Fneg, Dneg,
  Ishl = 0x78, Lshl, Ishr, Lshr, Iushr, Lushr,
  Iand = 0x7e, Land, Ior, Lor, Ixor, Lxor,
  Iinc = 0x84,
  #[strum(serialize = "i2l")] I2l = 0x85,
  #[strum(serialize = "i2f")] I2f,
  #[strum(serialize = "i2d")] I2d,
  #[strum(serialize = "l2i")] L2i,
  #[strum(serialize = "l2f")] L2f,
  #[strum(serialize = "l2d")] L2d,
  #[strum(serialize = "f2i")] F2i,
  #[strum(serialize = "f2l")] F2l,
  #[strum(serialize = "f2d")] F2d,
  #[strum(serialize = "d2i")] D2i,
  #[strum(serialize = "d2l")] D2l,
  #[strum(serialize = "d2f")] D2f,
  #[strum(serialize = "i2b")] I2b,
  #[strum(serialize = "i2c")] I2c,
  #[strum(serialize = "i2s")] I2s,
  Lcmp = 0x94, Fcmpl, Fcmpg, Dcmpl, Dcmpg,
  Ifeq = 0x99, Ifne, Iflt, Ifge, Ifgt, Ifle,
  IfIcmpeq = 0x9f, IfIcmpne, IfIcmplt, IfIcmpge, IfIcmpgt, IfIcmple,
  IfAcmpeq = 0xa5, IfAcmpne,
  Goto = 0xa7,
  Jsr,
  Ret,
  Tableswitch,
  Lookupswitch,
  Ireturn = 0xac, Lreturn, Freturn, Dreturn, Areturn, Return,
  Getstatic = 0xb2, Putstatic, Getfield, Putfield,
  Invokevirtual = 0xb6, Invokespecial, Invokestatic, Invokeinterface, Invokedynamic,
  New = 0xbb,
  Newarray,
  Anewarray,
  Arraylength,
  Athrow,
  Checkcast = 0xc0,
  Instanceof,
  Monitorenter,
  Monitorexit,
  Wide = 0xc4,
  Multianewarray,
  Ifnull,
  Ifnonnull,
  GotoW,
  JsrW,
  Breakpoint = 0xca,
  #[strum(serialize = "impdep1")] Impdep1 = 0xfe,
  #[strum(serialize = "impdep2")] Impdep2 = 0xff,
}

/// Operand layout following an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
  None,
  /// `bipush`: signed byte.
  Byte,
  /// `sipush`: signed short.
  Short,
  /// `ldc`: one-byte constant-pool index.
  U1,
  /// Two-byte constant-pool index.
  U2,
  /// One-byte local index (two bytes under `wide`).
  Local,
  Branch2,
  Branch4,
  Iinc,
  TableSwitch,
  LookupSwitch,
  Wide,
  InvokeInterface,
  InvokeDynamic,
  MultiANewArray,
  NewArray,
}

impl Opcode {
  pub fn from_byte(byte: u8) -> Option<Opcode> {
    Self::from_repr(byte)
  }

  pub fn mnemonic(self) -> &'static str {
    self.into()
  }

  pub fn operands(self) -> Operands {
    use Opcode::*;
    match self {
      Bipush => Operands::Byte,
      Sipush => Operands::Short,
      Ldc => Operands::U1,
      LdcW | Ldc2W
      | Getstatic | Putstatic | Getfield | Putfield
      | Invokevirtual | Invokespecial | Invokestatic
      | New | Anewarray | Checkcast | Instanceof => Operands::U2,
      Iload | Lload | Fload | Dload | Aload
      | Istore | Lstore | Fstore | Dstore | Astore | Ret => Operands::Local,
      Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle
      | IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple
      | IfAcmpeq | IfAcmpne | Goto | Jsr | Ifnull | Ifnonnull => Operands::Branch2,
      GotoW | JsrW => Operands::Branch4,
      Iinc => Operands::Iinc,
      Tableswitch => Operands::TableSwitch,
      Lookupswitch => Operands::LookupSwitch,
      Wide => Operands::Wide,
      Invokeinterface => Operands::InvokeInterface,
      Invokedynamic => Operands::InvokeDynamic,
      Multianewarray => Operands::MultiANewArray,
      Newarray => Operands::NewArray,
      _ => Operands::None,
    }
  }

  /// Fixed operand byte count; `None` for the variable-length switches and `wide`.
  pub fn operand_len(self) -> Option<usize> {
    let len = match self.operands() {
      Operands::None => 0,
      Operands::Byte | Operands::U1 | Operands::Local | Operands::NewArray => 1,
      Operands::Short | Operands::U2 | Operands::Branch2 | Operands::Iinc => 2,
      Operands::MultiANewArray => 3,
      Operands::Branch4 | Operands::InvokeInterface | Operands::InvokeDynamic => 4,
      Operands::TableSwitch | Operands::LookupSwitch | Operands::Wide => return None,
    };
    Some(len)
  }
}

/// `newarray` element type codes.
pub fn array_type_name(atype: u8) -> Option<&'static str> {
  let name = match atype {
    4 => "boolean",
    5 => "char",
    6 => "float",
    7 => "double",
    8 => "byte",
    9 => "short",
    10 => "int",
    11 => "long",
    _ => return None,
  };
  Some(name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mnemonics() {
    assert_eq!(Opcode::from_byte(0x00), Some(Opcode::Nop));
    assert_eq!(Opcode::AconstNull.mnemonic(), "aconst_null");
    assert_eq!(Opcode::Iconst5.to_string(), "iconst_5");
    assert_eq!(Opcode::IfIcmpge.mnemonic(), "if_icmpge");
    assert_eq!(Opcode::Ldc2W.mnemonic(), "ldc2_w");
    assert_eq!(Opcode::Dup2X1.mnemonic(), "dup2_x1");
    assert_eq!(Opcode::GotoW.mnemonic(), "goto_w");
    assert_eq!(Opcode::Invokevirtual.mnemonic(), "invokevirtual");
  }

  #[test]
  fn byte_values_line_up() {
    let checks = [
      (0x1a, Opcode::Iload0), (0x4e, Opcode::Astore3), (0x60, Opcode::Iadd), (0x74, Opcode::Ineg),
      (0x84, Opcode::Iinc), (0x93, Opcode::I2s), (0xa7, Opcode::Goto), (0xaa, Opcode::Tableswitch),
      (0xb1, Opcode::Return), (0xbb, Opcode::New), (0xc9, Opcode::JsrW), (0xca, Opcode::Breakpoint),
      (0xff, Opcode::Impdep2),
    ];
    for (byte, op) in checks {
      assert_eq!(Opcode::from_byte(byte), Some(op), "byte 0x{:02x}", byte);
      assert_eq!(op as u8, byte);
    }
    for byte in 0xcb..=0xfd {
      assert_eq!(Opcode::from_byte(byte), None);
    }
  }

  #[test]
  fn operand_kinds() {
    assert_eq!(Opcode::Bipush.operand_len(), Some(1));
    assert_eq!(Opcode::Invokestatic.operands(), Operands::U2);
    assert_eq!(Opcode::Invokeinterface.operand_len(), Some(4));
    assert_eq!(Opcode::Multianewarray.operand_len(), Some(3));
    assert_eq!(Opcode::Lookupswitch.operand_len(), None);
    assert_eq!(array_type_name(10), Some("int"));
    assert_eq!(array_type_name(3), None);
  }
}
