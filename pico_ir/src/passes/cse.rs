//! Block-local common subexpression elimination
//!
//! Within a block, a pure instruction repeating the exact opcode and
//! operand list of an earlier one reuses the earlier result. Rewrites
//! happen in program order, so a chain of equal subexpressions collapses
//! in one sweep.

use crate::function::Function;
use crate::instruction::Opcode;
use crate::program::Program;
use crate::value::{ValueId, ValuePool};
use hashbrown::HashMap;
use log::debug;

pub fn run(program: &mut Program) {
    let (functions, pool) = program.functions_and_pool();
    for function in functions {
        run_function(function, pool);
    }
}

fn run_function(function: &mut Function, pool: &mut ValuePool) {
    let mut reused = 0usize;
    let block_ids: Vec<_> = function.blocks().map(|b| b.idx).collect();

    for block in block_ids {
        let mut seen: HashMap<(Opcode, Vec<ValueId>), ValueId> = HashMap::new();
        let instrs: Vec<_> = function.block(block).instructions().to_vec();

        for id in instrs {
            if !function.is_active(id) || !function.instr(id).opcode.is_pure() {
                continue;
            }
            let key = (
                function.instr(id).opcode,
                function.instr(id).operands.to_vec(),
            );
            match seen.get(&key) {
                Some(&earlier) => {
                    let old = function.instr(id).result;
                    function.replace_uses(pool, old, earlier);
                    function.replace_defs(old, earlier);
                    for operand in key.1 {
                        pool.get_mut(operand).remove_use(id);
                    }
                    function.instr_mut(id).active = false;
                    reused += 1;
                }
                None => {
                    let result = function.instr(id).result;
                    seen.insert(key, result);
                }
            }
        }
    }

    if reused > 0 {
        debug!("[cse] {}: reused {} expressions", function.name(), reused);
    }
}
