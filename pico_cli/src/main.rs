//! pico compiler command-line interface
//!
//! Compiles one source file through the full pipeline: lex, parse, IR
//! construction with on-the-fly SSA, the optional analysis passes,
//! register allocation with phi destruction, and the requested dumps.
//! Exit code 0 on success, 1 on any compilation error.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod driver;

/// The pico programming language compiler
#[derive(Parser)]
#[command(name = "picoc")]
#[command(about = "Compiler for the pico language")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Source file to compile
    source: PathBuf,

    /// Write the final IR dump to this path
    #[arg(long)]
    dump_ir: Option<PathBuf>,

    /// Write a VCG rendering of the final IR to this path
    #[arg(long)]
    vcg: Option<PathBuf>,

    /// Write the parsed AST as JSON to this path
    #[arg(long)]
    emit_ast: Option<PathBuf>,

    /// Number of physical registers in the palette
    #[arg(long, default_value_t = 6)]
    registers: u32,

    /// Treat palette exhaustion as a fatal error instead of spilling
    #[arg(long)]
    strict_registers: bool,

    /// Skip the optional analysis passes
    #[arg(long)]
    no_opt: bool,

    /// Log severity filter
    #[arg(long, default_value = "warn", value_parser = ["debug", "info", "warn", "error"])]
    log_level: String,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        _ => log::LevelFilter::Error,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let options = driver::Options {
        source: cli.source,
        dump_ir: cli.dump_ir,
        vcg: cli.vcg,
        emit_ast: cli.emit_ast,
        registers: cli.registers,
        strict_registers: cli.strict_registers,
        optimize: !cli.no_opt,
    };

    match driver::compile(&options) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) => {
            eprintln!("error: {}", error);
            Ok(ExitCode::from(error.exit_code() as u8))
        }
    }
}
