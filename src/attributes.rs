use crate::classfile::{AttributeInfo, ClassFile, MethodInfo};
use crate::reader::{self, Reader};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("attribute: {0}")]
  Read(#[from] reader::Error),
  #[error("Code attribute too short: {0} bytes")]
  TooShort(usize),
  #[error("invalid code_length {length} (payload holds {available})")]
  CodeLength { length: u32, available: usize },
  #[error("empty code array")]
  EmptyCode,
  #[error("exception entry #{index} [{start_pc}, {end_pc}) -> {handler_pc} out of range for code of {len} bytes")]
  ExceptionRange { index: usize, start_pc: u16, end_pc: u16, handler_pc: u16, len: usize },
}
pub type Result<T, E=Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
  pub start_pc: u16,
  pub end_pc: u16,
  pub handler_pc: u16,
  /// 0 catches everything.
  pub catch_type: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
  pub start_pc: u16,
  pub line_number: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
  pub start_pc: u16,
  pub length: u16,
  pub name: String,
  pub descriptor: String,
  pub index: u16,
}

#[derive(Debug, Clone, Default)]
pub struct Code {
  pub max_stack: u16,
  pub max_locals: u16,
  pub code: Vec<u8>,
  pub exception_table: Vec<ExceptionEntry>,
  /// Sub-attributes other than the two decoded tables.
  pub attributes: Vec<AttributeInfo>,
  pub line_numbers: Vec<LineNumber>,
  pub local_variables: Vec<LocalVariable>,
}

impl Code {
  pub fn line_at(&self, pc: u16) -> Option<u16> {
    self.line_numbers.iter()
      .filter(|i| i.start_pc <= pc)
      .max_by_key(|i| i.start_pc)
      .map(|i| i.line_number)
  }
}

pub fn parse_code(cf: &ClassFile, attr: &AttributeInfo) -> Result<Code> {
  let data = &attr.info;
  if data.len() < 12 {
    return Err(Error::TooShort(data.len()))
  }
  let mut r = Reader::new(data);
  let max_stack = r.read_u2()?;
  let max_locals = r.read_u2()?;
  let length = r.read_u4()?;
  if length == 0 || length > 65535 || length as usize > r.remaining() {
    return Err(Error::CodeLength { length, available: r.remaining() })
  }
  let code = r.read_bytes(length as usize)?.to_vec();

  let count = r.read_u2()?;
  let mut exception_table = Vec::with_capacity(count as usize);
  for _ in 0..count {
    exception_table.push(ExceptionEntry {
      start_pc: r.read_u2()?,
      end_pc: r.read_u2()?,
      handler_pc: r.read_u2()?,
      catch_type: r.read_u2()?,
    });
  }

  let mut result = Code { max_stack, max_locals, code, exception_table, ..Default::default() };
  let count = r.read_u2()?;
  for _ in 0..count {
    let name_index = r.read_u2()?;
    let len = r.read_u4()? as usize;
    let info = r.read_bytes(len)?;
    match cf.utf8(name_index) {
      "LineNumberTable" => match parse_line_numbers(info) {
        Ok(lines) => result.line_numbers = lines,
        Err(e) => warn!("skipping malformed LineNumberTable: {}", e),
      },
      "LocalVariableTable" => match parse_local_variables(cf, info) {
        Ok(vars) => result.local_variables = vars,
        Err(e) => warn!("skipping malformed LocalVariableTable: {}", e),
      },
      name => {
        debug!("Code: keeping {} ({} bytes) raw", name, len);
        result.attributes.push(AttributeInfo { name_index, info: info.to_vec() });
      }
    }
  }
  Ok(result)
}

fn parse_line_numbers(data: &[u8]) -> reader::Result<Vec<LineNumber>> {
  let mut r = Reader::new(data);
  let count = r.read_u2()?;
  (0..count).map(|_| Ok(LineNumber { start_pc: r.read_u2()?, line_number: r.read_u2()? })).collect()
}

fn parse_local_variables(cf: &ClassFile, data: &[u8]) -> reader::Result<Vec<LocalVariable>> {
  let mut r = Reader::new(data);
  let count = r.read_u2()?;
  let mut result = Vec::with_capacity(count as usize);
  for _ in 0..count {
    let start_pc = r.read_u2()?;
    let length = r.read_u2()?;
    let name = cf.utf8(r.read_u2()?).to_string();
    let descriptor = cf.utf8(r.read_u2()?).to_string();
    let index = r.read_u2()?;
    result.push(LocalVariable { start_pc, length, name, descriptor, index });
  }
  Ok(result)
}

/// `Ok(None)` for abstract and native methods.
pub fn find_code(cf: &ClassFile, method: &MethodInfo) -> Result<Option<Code>> {
  match cf.attribute(&method.attributes, "Code") {
    Some(attr) => parse_code(cf, attr).map(Some),
    None => Ok(None),
  }
}

pub fn validate_code(code: &Code) -> Result<()> {
  let len = code.code.len();
  if len == 0 {
    return Err(Error::EmptyCode)
  }
  for (index, e) in code.exception_table.iter().enumerate() {
    if e.start_pc >= e.end_pc || e.end_pc as usize > len || e.handler_pc as usize >= len {
      return Err(Error::ExceptionRange {
        index, start_pc: e.start_pc, end_pc: e.end_pc, handler_pc: e.handler_pc, len,
      })
    }
  }
  Ok(())
}

pub fn source_file(cf: &ClassFile) -> Option<&str> {
  let attr = cf.attribute(&cf.attributes, "SourceFile")?;
  let index = Reader::new(&attr.info).read_u2().ok()?;
  Some(cf.utf8(index))
}
