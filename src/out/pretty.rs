use std::io::Write;

use crate::{
  attributes::{self, Code},
  classfile::{java_version, ClassFile, FlagTarget, MemberInfo},
  descriptor, disasm,
};

use super::{describe_constant, hex_preview, Result, Sections};

fn flag_list(member: &MemberInfo, target: FlagTarget) -> String {
  let names = member.access_flags.names(target);
  if names.is_empty() { String::new() } else { format!("{} ", names.join(" ")) }
}

pub fn render<W: Write>(cf: &ClassFile, sections: &Sections, w: &mut W) -> Result<()> {
  if sections.header {
    header(cf, w)?;
  }
  if sections.interfaces {
    writeln!(w, "Interfaces ({}):", cf.interfaces.len())?;
    for index in &cf.interfaces {
      writeln!(w, "  #{} {}", index, cf.constant_pool.class_name(*index))?;
    }
    writeln!(w)?;
  }
  if sections.constant_pool {
    constant_pool(cf, w)?;
  }
  if sections.fields {
    writeln!(w, "Fields ({}):", cf.fields.len())?;
    for field in &cf.fields {
      let desc = cf.member_descriptor(field);
      let ty = descriptor::parse_field(desc).map(|t| t.to_string()).unwrap_or_else(|_| desc.to_string());
      writeln!(w, "  {}{} {} ({})", flag_list(field, FlagTarget::Field), ty, cf.member_name(field), desc)?;
    }
    writeln!(w)?;
  }
  if sections.methods {
    writeln!(w, "Methods ({}):", cf.methods.len())?;
    for method in &cf.methods {
      self::method(cf, method, sections.code, w)?;
    }
  }
  if sections.attributes {
    writeln!(w, "Attributes ({}):", cf.attributes.len())?;
    for attr in &cf.attributes {
      match cf.attribute_name(attr) {
        "SourceFile" => writeln!(w, "  SourceFile: {}", attributes::source_file(cf).unwrap_or("<invalid>"))?,
        name => writeln!(w, "  {} ({} bytes): {}", name, attr.info.len(), hex_preview(&attr.info))?,
      }
    }
  }
  Ok(())
}

fn header<W: Write>(cf: &ClassFile, w: &mut W) -> Result<()> {
  writeln!(w, "Class file: {}", cf.this_class_name())?;
  writeln!(w, "  magic:          0x{:08X}", cf.magic)?;
  writeln!(w, "  major version:  {} ({})", cf.major_version, java_version(cf.major_version))?;
  writeln!(w, "  minor version:  {}", cf.minor_version)?;
  writeln!(w, "  constant pool:  {}", cf.constant_pool.count())?;
  writeln!(w, "  access flags:   {} [{}]", cf.access_flags, cf.access_flags.names(FlagTarget::Class).join(", "))?;
  writeln!(w, "  this class:     #{} {}", cf.this_class, cf.this_class_name())?;
  match cf.super_class_name() {
    Some(name) => writeln!(w, "  super class:    #{} {}", cf.super_class, name)?,
    None => writeln!(w, "  super class:    none")?,
  }
  writeln!(w)?;
  Ok(())
}

fn constant_pool<W: Write>(cf: &ClassFile, w: &mut W) -> Result<()> {
  writeln!(w, "Constant pool ({}):", cf.constant_pool.count())?;
  for (index, c) in cf.constant_pool.iter() {
    let (operands, resolved) = describe_constant(cf, index, c);
    let line = format!("  #{:<4} = {:<18} {}", index, c.tag_name(), operands);
    match resolved {
      Some(resolved) => writeln!(w, "{:<48} // {}", line, resolved)?,
      None => writeln!(w, "{}", line)?,
    }
  }
  writeln!(w)?;
  Ok(())
}

fn method<W: Write>(cf: &ClassFile, method: &MemberInfo, with_code: bool, w: &mut W) -> Result<()> {
  let name = cf.member_name(method);
  let desc = cf.member_descriptor(method);
  let signature = descriptor::parse_method(desc).map(|d| d.signature(name)).unwrap_or_else(|_| name.to_string());
  writeln!(w, "  {}{} ({}{})", flag_list(method, FlagTarget::Method), signature, name, desc)?;
  match attributes::find_code(cf, method) {
    Ok(Some(code)) => self::code(cf, &code, with_code, w)?,
    Ok(None) => writeln!(w, "    (abstract or native: no Code attribute)")?,
    Err(e) => {
      warn!("out: {}{}: {}", name, desc, e);
      writeln!(w, "    Code: <{}>", e)?
    }
  }
  writeln!(w)?;
  Ok(())
}

fn code<W: Write>(cf: &ClassFile, code: &Code, with_code: bool, w: &mut W) -> Result<()> {
  writeln!(w, "    Code (max_stack={}, max_locals={}, code_length={})",
    code.max_stack, code.max_locals, code.code.len())?;
  if !with_code {
    return Ok(())
  }
  match disasm::disassemble(cf, code) {
    Ok(instructions) => for i in &instructions {
      writeln!(w, "      {}", i)?;
    },
    Err(e) => {
      warn!("out: disassembly stopped: {}", e);
      writeln!(w, "      <{}>", e)?;
    }
  }
  if !code.exception_table.is_empty() {
    writeln!(w, "    Exception table:")?;
    for e in &code.exception_table {
      let catch = match e.catch_type {
        0 => "any".to_string(),
        i => cf.constant_pool.class_name(i).to_string(),
      };
      writeln!(w, "      [{}, {}) -> {} {}", e.start_pc, e.end_pc, e.handler_pc, catch)?;
    }
  }
  if !code.line_numbers.is_empty() {
    let lines = code.line_numbers.iter()
      .map(|l| format!("{}:{}", l.start_pc, l.line_number))
      .collect::<Vec<_>>();
    writeln!(w, "    Line numbers: {}", lines.join(" "))?;
  }
  for v in &code.local_variables {
    writeln!(w, "    Local {} {} {} [{}, +{})", v.index, v.name, v.descriptor, v.start_pc, v.length)?;
  }
  Ok(())
}
