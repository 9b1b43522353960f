#[macro_use] extern crate log;
#[macro_use] extern crate pest_derive;

pub mod attributes;
pub mod classfile;
pub mod config;
pub mod convert;
pub mod descriptor;
pub mod disasm;
pub mod opcode;
pub mod out;
pub mod reader;
pub mod resolve;
pub mod vm;

#[cfg(test)]
mod testing;
