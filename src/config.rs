//! `jclass.toml`: defaults for the command line.
//!
//! ```toml
//! [output]
//! mode = "json"
//! code = false
//!
//! [sections]
//! constant_pool = false
//!
//! [exec]
//! max_instructions = 5000
//! ```

use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::{out::Sections, vm::{ExecConfig, DEBUG_MAX_INSTRUCTIONS}};

pub const DEFAULT_PATH: &str = "jclass.toml";

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("config {path}: {source}")]
  Io { path: PathBuf, source: std::io::Error },
  #[error("config {path}: {source}")]
  Toml { path: PathBuf, source: toml::de::Error },
}
pub type Result<T, E=Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
  #[default]
  Pretty,
  Json,
  /// Parse only.
  Reader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
  pub mode: Mode,
  pub code: bool,
}

impl Default for Output {
  fn default() -> Self {
    Self { mode: Mode::Pretty, code: true }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Exec {
  pub max_instructions: Option<u64>,
  pub debug_max_instructions: u64,
}

impl Default for Exec {
  fn default() -> Self {
    Self { max_instructions: None, debug_max_instructions: DEBUG_MAX_INSTRUCTIONS }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub output: Output,
  pub sections: Sections,
  pub exec: Exec,
}

impl Config {
  pub fn parse(text: &str, path: &Path) -> Result<Self> {
    toml::from_str(text).map_err(|source| Error::Toml { path: path.to_path_buf(), source })
  }

  /// Reads `path`, or `jclass.toml` when it exists. No file means defaults.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(path) => path.to_path_buf(),
      None if Path::new(DEFAULT_PATH).exists() => PathBuf::from(DEFAULT_PATH),
      None => return Ok(Self::default()),
    };
    let text = std::fs::read_to_string(&path).map_err(|source| Error::Io { path: path.clone(), source })?;
    let config = Self::parse(&text, &path)?;
    debug!("config: loaded {}", path.display());
    Ok(config)
  }

  pub fn sections(&self) -> Sections {
    Sections { code: self.output.code, ..self.sections }
  }

  pub fn exec(&self, debug: bool) -> ExecConfig {
    let max_instructions = match (self.exec.max_instructions, debug) {
      (Some(max), _) => Some(max),
      (None, true) => Some(self.exec.debug_max_instructions),
      (None, false) => None,
    };
    ExecConfig { max_instructions, debug, ..Default::default() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_file_keeps_defaults() -> anyhow::Result<()> {
    let text = r#"
      [output]
      mode = "json"
      code = false

      [sections]
      constant_pool = false

      [exec]
      debug_max_instructions = 50
    "#;
    let config = Config::parse(text, Path::new("test.toml"))?;
    assert_eq!(config.output.mode, Mode::Json);
    let sections = config.sections();
    assert!(!sections.constant_pool);
    assert!(!sections.code);
    assert!(sections.methods && sections.header);
    assert_eq!(config.exec(true).max_instructions, Some(50));
    assert_eq!(config.exec(false).max_instructions, None);
    Ok(())
  }

  #[test]
  fn defaults_and_errors() -> anyhow::Result<()> {
    let config = Config::parse("", Path::new("empty.toml"))?;
    assert_eq!(config, Config::default());
    assert_eq!(config.exec(true).limit(), Some(DEBUG_MAX_INSTRUCTIONS));
    assert_eq!("reader".parse::<Mode>()?, Mode::Reader);

    let err = Config::parse("[output]\nmode = \"xml\"", Path::new("bad.toml")).err();
    assert!(matches!(err, Some(Error::Toml { .. })));
    let err = Config::load(Some(Path::new("/nonexistent/jclass.toml"))).err();
    assert!(matches!(err, Some(Error::Io { .. })));
    Ok(())
  }
}
