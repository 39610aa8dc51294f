//! Text rendering of the final IR
//!
//! Per-function sections list `BB_k:` followed by one line per active
//! instruction, `(value_idx) OPCODE operand …`. Operands render as `#n`
//! for constants, `&name` for functions and locations, `BB_k` for branch
//! targets, bare names for named values, and `(idx)` as the fallback.
//! Successor edges follow each block. Dead blocks and inactive
//! instructions are omitted.

use crate::function::Function;
use crate::instruction::InstrId;
use crate::program::Program;
use crate::value::{ValueId, ValueKind, ValuePool};
use std::fmt::Write;

pub fn render_value(pool: &ValuePool, value: ValueId) -> String {
    match pool.kind(value) {
        ValueKind::Const(n) => format!("#{}", n),
        ValueKind::Func(name) | ValueKind::Location(name) => format!("&{}", name),
        ValueKind::Branch(block) => block.to_string(),
        ValueKind::Var(name) => name.clone(),
        ValueKind::GlobalBase => "GlobalBase".to_string(),
        ValueKind::LocalBase => "LocalBase".to_string(),
        ValueKind::Any => value.to_string(),
    }
}

pub fn render_instruction(function: &Function, pool: &ValuePool, id: InstrId) -> String {
    let instr = function.instr(id);
    let mut line = format!("({}) {}", instr.result.0, instr.opcode);
    for &operand in &instr.operands {
        line.push(' ');
        line.push_str(&render_value(pool, operand));
    }
    line
}

pub fn render_function(function: &Function, pool: &ValuePool) -> String {
    let mut out = String::new();
    writeln!(out, "{}:", function.name()).unwrap();
    for block in function.blocks() {
        if block.dead {
            continue;
        }
        writeln!(out, "{}:", block.idx).unwrap();
        for &id in block.instructions() {
            if !function.is_active(id) {
                continue;
            }
            writeln!(out, "{}", render_instruction(function, pool, id)).unwrap();
        }
        for &succ in &block.successors {
            writeln!(out, "{} -> {}", block.idx, succ).unwrap();
        }
    }
    out
}

/// Render every function of the program, `main` included, in the order
/// they were added.
pub fn render_program(program: &Program) -> String {
    let mut out = String::new();
    for function in program.functions() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&render_function(function, &program.pool));
    }
    out
}
