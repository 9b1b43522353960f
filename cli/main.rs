#[macro_use] extern crate log;

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use jclass::{
  classfile::{java_version, ClassFile},
  config::{Config, Mode},
  out, reader,
  vm::{Status, Vm},
};

#[derive(clap::Parser)]
#[command(about = "Read, disassemble and run a Java class file")]
struct Opts {
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
  #[arg(long, conflicts_with_all = ["json", "reader_mode"])]
  pretty: bool,
  #[arg(long, conflicts_with = "reader_mode")]
  json: bool,
  /// Parse only, print nothing.
  #[arg(long)]
  reader_mode: bool,
  /// Skip method disassembly.
  #[arg(long)]
  no_code: bool,
  #[arg(long)]
  no_cp: bool,
  #[arg(long)]
  no_fields: bool,
  #[arg(long)]
  no_methods: bool,
  #[arg(long)]
  no_interfaces: bool,
  #[arg(long)]
  no_attributes: bool,
  /// Execute `main(String[])`.
  #[arg(short, long)]
  run: bool,
  /// Execute with a per-instruction trace.
  #[arg(short, long)]
  debug: bool,
  #[arg(long)]
  config: Option<PathBuf>,
  filename: PathBuf,
}

impl Opts {
  /// Command-line flags over the config file.
  fn merge(&self, mut config: Config) -> Config {
    if self.pretty {
      config.output.mode = Mode::Pretty;
    } else if self.json {
      config.output.mode = Mode::Json;
    } else if self.reader_mode {
      config.output.mode = Mode::Reader;
    }
    let s = &mut config.sections;
    s.constant_pool &= !self.no_cp;
    s.fields &= !self.no_fields;
    s.methods &= !self.no_methods;
    s.interfaces &= !self.no_interfaces;
    s.attributes &= !self.no_attributes;
    config.output.code &= !self.no_code;
    config
  }
}

fn execute(cf: &ClassFile, config: &Config, debug: bool) -> Result<()> {
  let stdout = std::io::stdout();
  let mut vm = Vm::new(cf, config.exec(debug), stdout.lock());
  let outcome = vm.run_main().map_err(|e| {
    error!("vm: {}", e);
    e
  })?;
  match outcome.status {
    Status::InstructionLimit => warn!("vm: {} after {} instructions", outcome.status, outcome.instructions),
    _ => info!("vm: {} after {} instructions", outcome.status, outcome.instructions),
  }
  for (slot, value) in outcome.locals.iter().enumerate() {
    debug!("vm: local {} = {}", slot, value);
  }
  vm.into_output().flush()?;
  Ok(())
}

fn run(opts: &Opts) -> Result<()> {
  let config = opts.merge(Config::load(opts.config.as_deref())?);
  let bytes = reader::read_file(&opts.filename)?;
  let cf = ClassFile::parse(&bytes).with_context(|| format!("parsing {}", opts.filename.display()))?;
  debug!(
    "{}: {} version {}.{} ({}), {} constants, {} fields, {} methods",
    opts.filename.display(), cf.this_class_name(), cf.major_version, cf.minor_version,
    java_version(cf.major_version), cf.constant_pool.count(), cf.fields.len(), cf.methods.len(),
  );

  if opts.run || opts.debug {
    return execute(&cf, &config, opts.debug)
  }
  let sections = config.sections();
  let stdout = std::io::stdout();
  let mut w = stdout.lock();
  match config.output.mode {
    Mode::Pretty => out::pretty::render(&cf, &sections, &mut w)?,
    Mode::Json => out::json::render(&cf, &sections, &mut w)?,
    Mode::Reader => info!("{}: parsed {}", opts.filename.display(), cf.this_class_name()),
  }
  w.flush()?;
  Ok(())
}

fn main() {
  let opts = Opts::parse();
  let verbose_str = match opts.verbose {
    0 => "info",
    1 => "debug",
    _ => "trace",
  };
  let _logger = flexi_logger::Logger::try_with_env_or_str(format!("cli={v},jclass={v}", v=verbose_str))
    .and_then(|logger| logger.start())
    .ok();
  if let Err(e) = run(&opts) {
    eprintln!("error: {:?}", e);
    std::process::exit(1);
  }
}
