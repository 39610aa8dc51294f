//! Dead code elimination
//!
//! Mark and sweep. Every active instruction with an observable effect is
//! a root; marking follows operands to their defining instructions,
//! through phis and around loop cycles, so a body increment feeding a
//! live header phi stays. Whatever the marking never reaches is
//! deactivated. Unreachable blocks are flagged dead wholesale.

use crate::block::BlockId;
use crate::function::Function;
use crate::instruction::InstrId;
use crate::program::Program;
use crate::value::ValueId;
use hashbrown::{HashMap, HashSet};
use log::debug;

pub fn run(program: &mut Program) {
    for function in program.functions_mut() {
        run_function(function);
    }
}

fn run_function(function: &mut Function) {
    let order = function.post_order();
    mark_unreachable(function, &order);

    // result value → defining active instruction
    let mut def_of: HashMap<ValueId, InstrId> = HashMap::new();
    for id in function.instr_ids() {
        if function.is_active(id) {
            def_of.insert(function.instr(id).result, id);
        }
    }

    let mut live: HashSet<InstrId> = HashSet::new();
    let mut worklist: Vec<InstrId> = function
        .instr_ids()
        .filter(|&id| function.is_active(id) && function.instr(id).opcode.has_side_effect())
        .collect();
    live.extend(worklist.iter().copied());

    while let Some(id) = worklist.pop() {
        for &operand in &function.instr(id).operands {
            if let Some(&def) = def_of.get(&operand) {
                if live.insert(def) {
                    worklist.push(def);
                }
            }
        }
    }

    let mut removed = 0usize;
    for id in function.instr_ids().collect::<Vec<_>>() {
        if function.is_active(id) && !live.contains(&id) {
            function.instr_mut(id).active = false;
            removed += 1;
        }
    }

    if removed > 0 {
        debug!("[dce] {}: removed {} instructions", function.name(), removed);
    }
}

/// Blocks absent from the traversal cannot execute: flag them dead and
/// deactivate their instructions.
fn mark_unreachable(function: &mut Function, order: &[BlockId]) {
    let reachable: HashSet<BlockId> = order.iter().copied().collect();
    let all: Vec<BlockId> = function.blocks().map(|b| b.idx).collect();
    for block in all {
        if reachable.contains(&block) {
            continue;
        }
        function.block_mut(block).dead = true;
        let instrs: Vec<_> = function.block(block).instructions().to_vec();
        for id in instrs {
            function.instr_mut(id).active = false;
        }
    }
}
