//! Redundant load elimination
//!
//! Block-local: a load from an address value already loaded earlier in
//! the block reuses the earlier result. Any store kills the whole
//! availability set (addresses may alias), as does a call to a function
//! that may clobber a global or that we know nothing about.

use crate::function::Function;
use crate::instruction::Opcode;
use crate::passes::clobber::{global_clobbering, ClobberMap};
use crate::program::Program;
use crate::value::{ValueId, ValueKind, ValuePool};
use hashbrown::HashMap;
use log::debug;

pub fn run(program: &mut Program) {
    let clobbers = global_clobbering(program);
    let (functions, pool) = program.functions_and_pool();
    for function in functions {
        run_function(function, pool, &clobbers);
    }
}

fn run_function(function: &mut Function, pool: &mut ValuePool, clobbers: &ClobberMap) {
    let mut removed = 0usize;
    let block_ids: Vec<_> = function.blocks().map(|b| b.idx).collect();

    for block in block_ids {
        // address value → previously loaded result
        let mut available: HashMap<ValueId, ValueId> = HashMap::new();
        let instrs: Vec<_> = function.block(block).instructions().to_vec();

        for id in instrs {
            if !function.is_active(id) {
                continue;
            }
            let opcode = function.instr(id).opcode;
            match opcode {
                Opcode::Load | Opcode::LoadG => {
                    let addr = function.instr(id).operands[0];
                    match available.get(&addr) {
                        Some(&earlier) => {
                            let old = function.instr(id).result;
                            function.replace_uses(pool, old, earlier);
                            function.replace_defs(old, earlier);
                            pool.get_mut(addr).remove_use(id);
                            function.instr_mut(id).active = false;
                            removed += 1;
                        }
                        None => {
                            let result = function.instr(id).result;
                            available.insert(addr, result);
                        }
                    }
                }
                Opcode::Store | Opcode::StoreG => {
                    available.clear();
                }
                Opcode::Call => {
                    let callee = function.instr(id).operands[0];
                    if call_may_clobber(pool, clobbers, callee) {
                        available.clear();
                    }
                }
                _ => {}
            }
        }
    }

    if removed > 0 {
        debug!("[loadelim] {}: removed {} loads", function.name(), removed);
    }
}

fn call_may_clobber(pool: &ValuePool, clobbers: &ClobberMap, callee: ValueId) -> bool {
    match pool.kind(callee) {
        ValueKind::Func(name) => clobbers
            .get(name)
            .map(|set| !set.is_empty())
            .unwrap_or(true),
        _ => true,
    }
}
