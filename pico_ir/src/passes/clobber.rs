//! Interprocedural global-clobbering analysis
//!
//! Records, per function, the set of global names the function may store
//! to: directly through `STOREG` (whose second operand is the location),
//! and transitively through the functions it calls. Consumers use the
//! result to decide when a cached global load is still valid across a
//! call.

use crate::instruction::Opcode;
use crate::program::Program;
use crate::value::ValueKind;
use std::collections::{BTreeMap, BTreeSet};

/// Function name → global names it may clobber
pub type ClobberMap = BTreeMap<String, BTreeSet<String>>;

pub fn global_clobbering(program: &Program) -> ClobberMap {
    let mut clobbers: ClobberMap = BTreeMap::new();
    let mut calls: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for function in program.functions() {
        let direct = clobbers.entry(function.name().to_string()).or_default();
        let callees = calls.entry(function.name().to_string()).or_default();

        for id in function.instr_ids() {
            let instr = function.instr(id);
            if !instr.active {
                continue;
            }
            match instr.opcode {
                Opcode::StoreG => {
                    if let ValueKind::Location(name) = program.pool.kind(instr.operands[1]) {
                        direct.insert(name.clone());
                    }
                }
                Opcode::Call => {
                    if let ValueKind::Func(name) = program.pool.kind(instr.operands[0]) {
                        callees.insert(name.clone());
                    }
                }
                _ => {}
            }
        }
    }

    // Propagate through call edges to a fixpoint. Cycles (recursion)
    // converge because sets only grow.
    loop {
        let mut changed = false;
        for (caller, callees) in &calls {
            let mut gained: BTreeSet<String> = BTreeSet::new();
            for callee in callees {
                if let Some(set) = clobbers.get(callee) {
                    gained.extend(set.iter().cloned());
                }
            }
            let own = clobbers.entry(caller.clone()).or_default();
            let before = own.len();
            own.extend(gained);
            if own.len() > before {
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    clobbers
}
