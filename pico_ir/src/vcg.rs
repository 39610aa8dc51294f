//! VCG graph rendering of the final IR
//!
//! One `node:` record per live basic block, titled `fn:BB_k` and labeled
//! with the block's rendered instructions, plus one `edge:` record per
//! successor link. The layout header asks for the compiler-graph
//! algorithm so blocks stack in flow order.

use crate::dump::render_instruction;
use crate::function::Function;
use crate::program::Program;
use crate::value::ValuePool;
use std::fmt::Write;

fn draw_function(out: &mut String, function: &Function, pool: &ValuePool) {
    let name = function.name();
    for block in function.blocks() {
        if block.dead {
            continue;
        }
        writeln!(out, "node: {{").unwrap();
        writeln!(out, "title: \"{}:{}\"", name, block.idx).unwrap();
        write!(out, "label: \"[{}] {}\n", name, block.idx).unwrap();
        for &id in block.instructions() {
            if !function.is_active(id) {
                continue;
            }
            writeln!(out, "{}", render_instruction(function, pool, id)).unwrap();
        }
        writeln!(out, "\"").unwrap();
        writeln!(out, "}}").unwrap();

        for &succ in &block.successors {
            writeln!(out, "edge: {{").unwrap();
            writeln!(out, "sourcename: \"{}:{}\"", name, block.idx).unwrap();
            writeln!(out, "targetname: \"{}:{}\"", name, succ).unwrap();
            writeln!(out, "color: black").unwrap();
            writeln!(out, "}}").unwrap();
        }
    }
}

/// Render the whole program as a VCG graph document.
pub fn render_vcg(program: &Program) -> String {
    let mut out = String::new();
    out.push_str("graph: {\n");
    out.push_str("orientation: top_to_bottom\n");
    out.push_str("manhattan_edges: yes\n");
    out.push_str("layoutalgorithm: compilergraph\n");
    out.push_str("title: \"program\"\n");
    for function in program.functions() {
        draw_function(&mut out, function, &program.pool);
    }
    out.push_str("}\n");
    out
}
