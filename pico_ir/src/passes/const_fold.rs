//! Constant folding
//!
//! Arithmetic over two constant operands is evaluated at compile time;
//! uses of the folded result are rewritten to the (memoized) constant
//! value and the instruction deactivated. Division by a constant zero and
//! overflowing results are left alone. Folding runs to a fixpoint per
//! function and finishes by collapsing phis the rewrites made trivial.

use crate::function::Function;
use crate::instruction::{InstrId, Opcode};
use crate::program::Program;
use crate::value::{ValueId, ValueKind, ValuePool};
use log::debug;

pub fn run(program: &mut Program) {
    let (functions, pool) = program.functions_and_pool();
    for function in functions {
        run_function(function, pool);
    }
}

fn run_function(function: &mut Function, pool: &mut ValuePool) {
    let mut folded = 0usize;
    loop {
        let mut changed = false;
        for id in function.instr_ids().collect::<Vec<_>>() {
            if let Some(value) = foldable(function, pool, id) {
                let constant = function.constant(pool, value);
                let old = function.instr(id).result;
                let operands: Vec<ValueId> = function.instr(id).operands.to_vec();

                function.replace_uses(pool, old, constant);
                function.replace_defs(old, constant);
                for operand in operands {
                    pool.get_mut(operand).remove_use(id);
                }
                function.instr_mut(id).active = false;

                changed = true;
                folded += 1;
            }
        }
        if !changed {
            break;
        }
    }

    // Rewrites can leave phis whose operands now agree.
    let phis: Vec<InstrId> = function
        .instr_ids()
        .filter(|&id| function.is_active(id) && function.instr(id).is_phi())
        .collect();
    for phi in phis {
        function.try_remove_trivial_phi(pool, phi);
    }

    if folded > 0 {
        debug!("[fold] {}: folded {} instructions", function.name(), folded);
    }
}

fn foldable(function: &Function, pool: &ValuePool, id: InstrId) -> Option<i64> {
    let instr = function.instr(id);
    if !instr.active || instr.operands.len() != 2 {
        return None;
    }
    let lhs = constant_of(pool, instr.operands[0])?;
    let rhs = constant_of(pool, instr.operands[1])?;
    match instr.opcode {
        Opcode::Add => lhs.checked_add(rhs),
        Opcode::Sub => lhs.checked_sub(rhs),
        Opcode::Mul => lhs.checked_mul(rhs),
        Opcode::Div => {
            if rhs == 0 {
                None
            } else {
                lhs.checked_div(rhs)
            }
        }
        _ => None,
    }
}

fn constant_of(pool: &ValuePool, value: ValueId) -> Option<i64> {
    match pool.kind(value) {
        ValueKind::Const(n) => Some(*n),
        _ => None,
    }
}
