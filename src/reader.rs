use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("unexpected end of input at offset {offset}: need {need} bytes, {left} left")]
  Eof { offset: usize, need: usize, left: usize },
  #[error("read {path}: {source}")]
  Io { path: String, #[source] source: std::io::Error },
}
pub type Result<T, E=Error> = std::result::Result<T, E>;

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
  let path = path.as_ref();
  std::fs::read(path).map_err(|source| Error::Io { path: path.to_string_lossy().to_string(), source })
}

/// Big-endian cursor over a class file (or any slice of one).
#[derive(Debug, Clone)]
pub struct Reader<'a> {
  data: &'a [u8],
  offset: usize,
}

impl<'a> Reader<'a> {
  pub fn new(data: &'a [u8]) -> Self {
    Self { data, offset: 0 }
  }

  pub fn at(data: &'a [u8], offset: usize) -> Self {
    Self { data, offset }
  }

  pub fn position(&self) -> usize {
    self.offset
  }

  pub fn remaining(&self) -> usize {
    self.data.len().saturating_sub(self.offset)
  }

  pub fn is_empty(&self) -> bool {
    self.remaining() == 0
  }

  fn take(&mut self, need: usize) -> Result<&'a [u8]> {
    let left = self.remaining();
    if need > left {
      return Err(Error::Eof { offset: self.offset, need, left })
    }
    let slice = &self.data[self.offset..self.offset + need];
    self.offset += need;
    Ok(slice)
  }

  pub fn read_u1(&mut self) -> Result<u8> {
    Ok(self.take(1)?[0])
  }

  pub fn read_u2(&mut self) -> Result<u16> {
    let b = self.take(2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
  }

  pub fn read_u4(&mut self) -> Result<u32> {
    let b = self.take(4)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
  }

  pub fn read_i1(&mut self) -> Result<i8> {
    Ok(self.read_u1()? as i8)
  }

  pub fn read_i2(&mut self) -> Result<i16> {
    Ok(self.read_u2()? as i16)
  }

  pub fn read_i4(&mut self) -> Result<i32> {
    Ok(self.read_u4()? as i32)
  }

  pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
    self.take(n)
  }

  pub fn skip(&mut self, n: usize) -> Result<()> {
    self.take(n).map(|_| ())
  }

  /// Skips padding so the cursor sits on a multiple of 4 from `base`.
  pub fn align4(&mut self, base: usize) -> Result<()> {
    let rel = self.offset - base;
    let pad = (4 - rel % 4) % 4;
    self.skip(pad)
  }
}
