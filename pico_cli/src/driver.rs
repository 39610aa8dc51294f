//! Pass pipeline driver

use log::info;
use pico_common::{Diagnostics, PicoError, PicoResult};
use pico_ir::{build_program, dump, passes, vcg};
use pico_lexer::Lexer;
use pico_parser::Parser;
use pico_regalloc::{allocate_program, AllocConfig};
use std::fs;
use std::path::PathBuf;

pub struct Options {
    pub source: PathBuf,
    pub dump_ir: Option<PathBuf>,
    pub vcg: Option<PathBuf>,
    pub emit_ast: Option<PathBuf>,
    pub registers: u32,
    pub strict_registers: bool,
    pub optimize: bool,
}

/// Run the whole pipeline over one source file.
pub fn compile(options: &Options) -> PicoResult<()> {
    let source = fs::read_to_string(&options.source)?;

    info!("lexing {}", options.source.display());
    let tokens = Lexer::new(&source).tokenize()?;

    info!("parsing");
    let (computation, symbols) = Parser::new(tokens).parse()?;

    if let Some(path) = &options.emit_ast {
        let json = serde_json::to_string_pretty(&computation)
            .map_err(|e| PicoError::io(e.to_string()))?;
        fs::write(path, json)?;
        info!("wrote AST to {}", path.display());
    }

    info!("constructing IR");
    let mut program = build_program(&computation, &symbols)?;

    // main keeps globals in registers; flag the ones a callee may store.
    let mut diagnostics = Diagnostics::new();
    if let Some(clobbered) = passes::global_clobbering(&program).get("main") {
        for name in clobbered {
            diagnostics.warning(
                format!(
                    "global '{}' is stored by a called function; main's copy is not reloaded",
                    name
                ),
                None,
            );
        }
    }
    for diagnostic in &diagnostics.messages {
        eprintln!("{}", diagnostic);
    }

    if options.optimize {
        passes::run_all(&mut program);
    }

    info!("allocating registers");
    let config = AllocConfig {
        registers: options.registers,
        strict: options.strict_registers,
    };
    allocate_program(&mut program, &config)?;

    if let Some(path) = &options.dump_ir {
        fs::write(path, dump::render_program(&program))?;
        info!("wrote IR dump to {}", path.display());
    }
    if let Some(path) = &options.vcg {
        fs::write(path, vcg::render_vcg(&program))?;
        info!("wrote VCG graph to {}", path.display());
    }

    Ok(())
}
