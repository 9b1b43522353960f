use pest::{Parser, iterators::Pair};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("descriptor: {0}")]
  Parse(#[from] pest::error::Error<Rule>),
  #[error("descriptor: require {0:?}")]
  Require(Rule),
  #[error("descriptor: require {require:?} found {found:?}")]
  Mismatch { require: Rule, found: Rule },
}
pub type Result<T, E=Error> = std::result::Result<T, E>;

#[derive(Parser)]
#[grammar = "descriptor.pest"] // relative to src
struct DescriptorParser;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
  Byte,
  Char,
  Double,
  Float,
  Int,
  Long,
  Short,
  Boolean,
  /// Internal binary name, e.g. `java/lang/String`.
  Object(String),
  Array(Box<FieldType>),
}

impl FieldType {
  /// Local-variable and operand-stack slots taken by a value of this type.
  pub fn slots(&self) -> usize {
    match self {
      FieldType::Long | FieldType::Double => 2,
      _ => 1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
  pub params: Vec<FieldType>,
  /// `None` is `void`.
  pub ret: Option<FieldType>,
}

impl MethodDescriptor {
  pub fn arg_slots(&self) -> usize {
    self.params.iter().map(FieldType::slots).sum()
  }

  /// Java-source form with a method name, e.g. `void main(java.lang.String[])`.
  pub fn signature(&self, name: &str) -> String {
    let params = self.params.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    match &self.ret {
      Some(ret) => format!("{} {}({})", ret, name, params),
      None => format!("void {}({})", name, params),
    }
  }
}

pub fn parse_field(input: &str) -> Result<FieldType> {
  let mut pairs = DescriptorParser::parse(Rule::field, input)?;
  let pair = pairs.next().ok_or(Error::Require(Rule::field))?;
  let inner = pair.into_inner().next().ok_or(Error::Require(Rule::field_type))?;
  parse_field_type(inner)
}

pub fn parse_method(input: &str) -> Result<MethodDescriptor> {
  let mut pairs = DescriptorParser::parse(Rule::method, input)?;
  let pair = pairs.next().ok_or(Error::Require(Rule::method))?;
  let mut pairs = pair.into_inner();

  let params = pairs.next().ok_or(Error::Require(Rule::params))?;
  let params = params.into_inner().map(parse_field_type).collect::<Result<Vec<_>>>()?;

  let ret = pairs.next().ok_or(Error::Require(Rule::return_type))?;
  let ret = ret.into_inner().next().ok_or(Error::Require(Rule::return_type))?;
  let ret = match ret.as_rule() {
    Rule::void => None,
    Rule::field_type => Some(parse_field_type(ret)?),
    rule => return Err(Error::Mismatch { require: Rule::return_type, found: rule }),
  };
  Ok(MethodDescriptor { params, ret })
}

// field_type = { base_type | object_type | array_type }
fn parse_field_type(pair: Pair<Rule>) -> Result<FieldType> {
  let pair = match pair.as_rule() {
    Rule::field_type => pair.into_inner().next().ok_or(Error::Require(Rule::field_type))?,
    _ => pair,
  };
  let result = match pair.as_rule() {
    Rule::base_type => match pair.as_str() {
      "B" => FieldType::Byte,
      "C" => FieldType::Char,
      "D" => FieldType::Double,
      "F" => FieldType::Float,
      "I" => FieldType::Int,
      "J" => FieldType::Long,
      "S" => FieldType::Short,
      _ => FieldType::Boolean,
    },
    Rule::object_type => {
      let name = pair.into_inner().next().ok_or(Error::Require(Rule::class_name))?;
      FieldType::Object(name.as_str().to_string())
    }
    Rule::array_type => {
      let inner = pair.into_inner().next().ok_or(Error::Require(Rule::field_type))?;
      FieldType::Array(Box::new(parse_field_type(inner)?))
    }
    rule => return Err(Error::Mismatch { require: Rule::field_type, found: rule }),
  };
  Ok(result)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fields() -> anyhow::Result<()> {
    assert_eq!(parse_field("I")?, FieldType::Int);
    assert_eq!(parse_field("Ljava/lang/String;")?, FieldType::Object("java/lang/String".into()));
    assert_eq!(parse_field("[[J")?, FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::Long)))));
    assert_eq!(parse_field("[[J")?.to_string(), "long[][]");
    assert_eq!(parse_field("Ljava/lang/String;")?.to_string(), "java.lang.String");
    assert!(parse_field("").is_err());
    assert!(parse_field("V").is_err());
    assert!(parse_field("Ljava/lang/String").is_err());
    assert!(parse_field("II").is_err());
    Ok(())
  }

  #[test]
  fn methods() -> anyhow::Result<()> {
    let main = parse_method("([Ljava/lang/String;)V")?;
    assert_eq!(main.ret, None);
    assert_eq!(main.arg_slots(), 1);
    assert_eq!(main.signature("main"), "void main(java.lang.String[])");

    let m = parse_method("(IJDLjava/lang/Object;)Z")?;
    assert_eq!(m.params.len(), 4);
    assert_eq!(m.arg_slots(), 6);
    assert_eq!(m.ret, Some(FieldType::Boolean));
    assert_eq!(parse_method("()V")?.arg_slots(), 0);

    assert!(parse_method("(I").is_err());
    assert!(parse_method("(V)V").is_err());
    assert!(parse_method("()").is_err());
    Ok(())
  }
}
