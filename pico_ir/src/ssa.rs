//! On-the-fly SSA construction
//!
//! Implements the single-pass algorithm of Braun et al., "Simple and
//! Efficient Construction of Static Single Assignment Form": no CFG or
//! dominator tree is built beforehand. The AST walk writes and reads
//! variable definitions directly; joins materialize phis on demand and
//! unsealed blocks (loop headers before their back edge exists) collect
//! incomplete phis that are filled when the block is sealed.

use crate::function::Function;
use crate::instruction::InstrId;
use crate::value::{ValueId, ValueKind, ValuePool};
use crate::BlockId;
use log::trace;

impl Function {
    /// Record `value` as the current definition of `name` in `block`. O(1).
    pub fn write_variable(&mut self, name: &str, block: BlockId, value: ValueId) {
        self.local_defs
            .entry(name.to_string())
            .or_default()
            .insert(block, value);
    }

    /// Current definition of `name` at the end of `block`, materializing
    /// phis in predecessors as needed.
    pub fn read_variable(&mut self, pool: &mut ValuePool, name: &str, block: BlockId) -> ValueId {
        if let Some(&value) = self.local_defs.get(name).and_then(|defs| defs.get(&block)) {
            return value;
        }
        self.read_variable_recursive(pool, name, block)
    }

    /// Three cases:
    /// 1. `block` unsealed: more predecessors may appear, so place an
    ///    operand-less phi and fill it at seal time.
    /// 2. exactly one predecessor: the definition flows through unchanged.
    /// 3. several predecessors: place a phi, record it as the definition
    ///    *first* to break cycles on back edges, then fill its operands.
    fn read_variable_recursive(
        &mut self,
        pool: &mut ValuePool,
        name: &str,
        block: BlockId,
    ) -> ValueId {
        let result = if !self.block(block).sealed {
            let phi = self.make_phi(pool, block);
            self.incomplete_phis
                .entry(block)
                .or_default()
                .insert(name.to_string(), phi);
            trace!("incomplete phi for '{}' in {}", name, block);
            self.instr(phi).result
        } else if self.block(block).predecessors.len() == 1 {
            let pred = self.block(block).predecessors[0];
            self.read_variable(pool, name, pred)
        } else {
            let phi = self.make_phi(pool, block);
            let phi_result = self.instr(phi).result;
            self.write_variable(name, block, phi_result);
            self.add_phi_operands(pool, name, phi)
        };

        self.write_variable(name, block, result);
        result
    }

    /// Query each predecessor for the incoming definition and append it as
    /// a phi operand, recording the (predecessor, value) pair. Operand
    /// order therefore follows predecessor order. Ends by removing the phi
    /// if it turned out trivial.
    pub fn add_phi_operands(&mut self, pool: &mut ValuePool, name: &str, phi: InstrId) -> ValueId {
        debug_assert!(self.instr(phi).active, "operands added to a removed phi");

        let block = self.instr(phi).block;
        let predecessors: Vec<BlockId> = self.block(block).predecessors.to_vec();
        for pred in predecessors {
            let operand = self.read_variable(pool, name, pred);
            if !self.instr(phi).active {
                // A removal cascade triggered by the predecessor read
                // already rerouted this phi; the definition table holds
                // the replacement.
                return self.read_variable(pool, name, block);
            }
            let instr = self.instr_mut(phi);
            instr.operands.push(operand);
            instr.op_source.insert(pred, operand);
            pool.get_mut(operand).add_use(phi);
        }

        self.try_remove_trivial_phi(pool, phi)
    }

    /// If the phi's operands (ignoring self-references and duplicates)
    /// collapse to a single value, the phi is redundant: deactivate it,
    /// reroute its uses, and recurse into phi users that may have become
    /// trivial in turn. An operand-less phi denotes a read of an
    /// undefined variable and collapses to a fresh undefined value.
    pub fn try_remove_trivial_phi(&mut self, pool: &mut ValuePool, phi: InstrId) -> ValueId {
        if !self.instr(phi).active {
            return self.instr(phi).result;
        }

        let result = self.instr(phi).result;
        let mut same: Option<ValueId> = None;
        for &operand in &self.instr(phi).operands {
            if Some(operand) == same || operand == result {
                continue;
            }
            if same.is_some() {
                // Two distinct incoming values: a real phi.
                return result;
            }
            same = Some(operand);
        }

        let same = same.unwrap_or_else(|| pool.create(ValueKind::Any));
        trace!("removing trivial phi {:?}, collapses to {:?}", phi, same);

        let users: Vec<InstrId> = pool.get(result).users().collect();
        self.replace_uses(pool, result, same);
        // Definition-table entries still naming the removed phi must
        // follow the replacement too, or later reads resurrect it.
        self.replace_defs(result, same);
        self.instr_mut(phi).active = false;

        for user in users {
            if user != phi && self.instr(user).is_phi() {
                self.try_remove_trivial_phi(pool, user);
            }
        }

        same
    }

    /// Declare `block`'s predecessor set final: fill the operands of its
    /// incomplete phis, then redirect in-block uses of each phi operand to
    /// the phi result (uses from code lowered after the phi's semantic
    /// position), and set the sealed flag.
    pub fn seal_block(&mut self, pool: &mut ValuePool, block: BlockId) {
        debug_assert!(!self.block(block).sealed, "block sealed twice");

        if let Some(pending) = self.incomplete_phis.remove(&block) {
            for (name, phi) in &pending {
                if !self.instr(*phi).active {
                    continue;
                }
                self.add_phi_operands(pool, name, *phi);
            }

            for (_, phi) in pending {
                if !self.instr(phi).active {
                    continue;
                }
                let result = self.instr(phi).result;
                let operands: Vec<ValueId> = self.instr(phi).operands.to_vec();
                for operand in operands {
                    // Only operands the block itself computes (excluding
                    // the phi prefix, which sits at the same semantic
                    // position): a use of such a value below the phi was
                    // lowered against a stale definition. Constants and
                    // values flowing in from predecessors stay put; a
                    // memoized constant in particular may be used both as
                    // a phi operand and as an unrelated literal.
                    let defined_here = self.block(block).instructions().iter().any(|&id| {
                        let instr = self.instr(id);
                        instr.result == operand && !instr.is_phi()
                    });
                    if !defined_here {
                        continue;
                    }
                    let users: Vec<InstrId> = pool.get(operand).users().collect();
                    for user in users {
                        let instr = self.instr(user);
                        if instr.block == block && !instr.is_phi() {
                            self.instr_mut(user).replace_use(operand, result);
                            pool.get_mut(operand).remove_use(user);
                            pool.get_mut(result).add_use(user);
                        }
                    }
                }
            }
        }

        self.block_mut(block).sealed = true;
    }
}

/// SSA-level integrity checks used by tests and debug builds: every
/// active phi has one operand per predecessor and no active phi is
/// trivial.
pub fn check_phis(function: &Function) -> Result<(), String> {
    for id in function.instr_ids() {
        let instr = function.instr(id);
        if !instr.active || !instr.is_phi() {
            continue;
        }
        let preds = &function.block(instr.block).predecessors;
        if instr.operands.len() != preds.len() {
            return Err(format!(
                "phi {:?} in {} has {} operands for {} predecessors",
                id,
                instr.block,
                instr.operands.len(),
                preds.len()
            ));
        }
        for pred in preds {
            if !instr.op_source.contains_key(pred) {
                return Err(format!(
                    "phi {:?} has no operand sourced from predecessor {}",
                    id, pred
                ));
            }
        }
        let mut distinct: Vec<ValueId> = instr
            .operands
            .iter()
            .copied()
            .filter(|&op| op != instr.result)
            .collect();
        distinct.sort();
        distinct.dedup();
        if distinct.len() < 2 {
            return Err(format!("phi {:?} in {} is trivial", id, instr.block));
        }
    }
    Ok(())
}
