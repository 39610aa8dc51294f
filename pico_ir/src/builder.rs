//! IR construction: walking the `Computation` tree
//!
//! Entry order follows the source: globals first (recording offsets from
//! the global base), then each function declaration, finally the body of
//! `main`. Per function the walk drives SSA construction directly; loop
//! headers stay unsealed until their back edge is added.
//!
//! Variables declared at the computation level are global symbols. Inside
//! `main` they are treated as main's own SSA variables; other functions
//! reach them through `LOADG`/`STOREG` with an explicit location operand.

use crate::block::{BlockId, BlockKind};
use crate::function::{Function, VarInfo};
use crate::instruction::Opcode;
use crate::program::{GlobalInfo, Program};
use crate::value::{ValueId, ValueKind};
use log::{debug, info};
use pico_common::{PicoError, PicoResult};
use pico_parser::{
    Assignment, Computation, Designator, Expression, FuncCall, FuncDecl, IfStmt, RelOp, Relation,
    ReturnStmt, Statement, SymbolTable, TypeDecl, WhileStmt, INTRINSIC_INPUT_NUM,
    INTRINSIC_OUTPUT_NEW_LINE, INTRINSIC_OUTPUT_NUM,
};

/// Build the whole-program IR from a validated computation tree.
pub fn build_program(computation: &Computation, symbols: &SymbolTable) -> PicoResult<Program> {
    let mut program = Program::new();

    info!("[ir] declaring globals");
    let mut offset = 0i64;
    for decl in &computation.globals {
        for name in &decl.names {
            let dims = match &decl.type_decl {
                TypeDecl::Scalar => None,
                TypeDecl::Array(dims) => Some(dims.clone()),
            };
            let size = dims.as_ref().map(|d| d.iter().product()).unwrap_or(1);
            program.globals.insert(
                name.value.clone(),
                GlobalInfo { dims, offset },
            );
            offset += size;
        }
    }

    for decl in &computation.functions {
        info!("[ir] lowering function '{}'", decl.name.value);
        let function = build_function(&mut program, symbols, decl)?;
        program.add_function(function);
    }

    info!("[ir] lowering main");
    let main = build_main(&mut program, symbols, computation)?;
    program.add_function(main);

    Ok(program)
}

fn build_function(
    program: &mut Program,
    symbols: &SymbolTable,
    decl: &FuncDecl,
) -> PicoResult<Function> {
    let name = decl.name.value.clone();
    let mut func = Function::new(&name, &mut program.pool);

    // Slot offsets from the local base, declaration order; formals first.
    let mut offset = 0i64;
    for param in &decl.params {
        func.add_variable(param.value.clone(), VarInfo { dims: None, offset });
        offset += 1;
    }
    for var_decl in &decl.locals {
        for local in &var_decl.names {
            let dims = match &var_decl.type_decl {
                TypeDecl::Scalar => None,
                TypeDecl::Array(dims) => Some(dims.clone()),
            };
            let size: i64 = dims.as_ref().map(|d| d.iter().product()).unwrap_or(1);
            func.add_variable(local.value.clone(), VarInfo { dims, offset });
            offset += size;
        }
    }

    let mut lowerer = Lowerer {
        symbols,
        program,
        func: &mut func,
        scope: Some(name),
    };
    lowerer.load_formals(decl);
    lowerer.lower_body(&decl.body)?;
    lowerer.finish_function(false);

    Ok(func)
}

fn build_main(
    program: &mut Program,
    symbols: &SymbolTable,
    computation: &Computation,
) -> PicoResult<Function> {
    let mut func = Function::new("main", &mut program.pool);
    let mut lowerer = Lowerer {
        symbols,
        program,
        func: &mut func,
        scope: None,
    };
    lowerer.lower_body(&computation.body)?;
    lowerer.finish_function(true);
    Ok(func)
}

/// Statement and expression lowering for one function.
struct Lowerer<'a> {
    symbols: &'a SymbolTable,
    program: &'a mut Program,
    func: &'a mut Function,
    /// `None` while lowering the body of `main`
    scope: Option<String>,
}

impl<'a> Lowerer<'a> {
    fn scope_name(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Formals are addressable slots; load each once in the entry block
    /// and seed the SSA definition table with the loaded value.
    fn load_formals(&mut self, decl: &FuncDecl) {
        let entry = self.func.entry;
        for param in &decl.params {
            let loc = self.func.location(&mut self.program.pool, &param.value);
            let value = self
                .func
                .emit_in(&mut self.program.pool, entry, Opcode::Load, &[loc]);
            // The loaded formal is a named source value.
            self.program.pool.get_mut(value).kind = ValueKind::Var(param.value.clone());
            self.func.write_variable(&param.value, entry, value);
        }
    }

    fn lower_body(&mut self, body: &[Statement]) -> PicoResult<()> {
        for statement in body {
            self.lower_statement(statement)?;
            // Nothing after a return is reachable in this sequence.
            if matches!(statement, Statement::Return(_)) {
                break;
            }
        }
        Ok(())
    }

    fn lower_statement(&mut self, statement: &Statement) -> PicoResult<()> {
        match statement {
            Statement::Assignment(assign) => self.lower_assignment(assign),
            Statement::Call(call) => self.lower_call(call).map(|_| ()),
            Statement::If(if_stmt) => self.lower_if(if_stmt),
            Statement::While(while_stmt) => self.lower_while(while_stmt),
            Statement::Return(ret) => self.lower_return(ret),
        }
    }

    fn lower_assignment(&mut self, assign: &Assignment) -> PicoResult<()> {
        debug!("[ir] lowering assignment to '{}'", assign.target.name());
        let rhs = self.lower_expression(&assign.value)?;

        match &assign.target {
            Designator::Var(name) => {
                if self.is_ssa_scalar(&name.value) {
                    let block = self.func.current_block();
                    self.func.write_variable(&name.value, block, rhs);
                } else {
                    // Global scalar written from a function body.
                    let loc = self.func.location(&mut self.program.pool, &name.value);
                    self.func
                        .emit(&mut self.program.pool, Opcode::StoreG, &[rhs, loc]);
                }
            }
            Designator::Array { .. } => {
                let addr = self.lower_array_address(&assign.target)?;
                self.func
                    .emit(&mut self.program.pool, Opcode::Store, &[rhs, addr]);
            }
        }
        Ok(())
    }

    /// Scalars resolved in the current function's own scope use SSA
    /// directly; so do globals inside `main`, which owns them.
    fn is_ssa_scalar(&self, name: &str) -> bool {
        match self.scope_name() {
            Some(scope) => self.symbols.is_local(Some(scope), name),
            None => true,
        }
    }

    fn lower_expression(&mut self, expr: &Expression) -> PicoResult<ValueId> {
        match expr {
            Expression::Number(n) => Ok(self.func.constant(&mut self.program.pool, n.value)),
            Expression::Designator(designator) => self.lower_designator_read(designator),
            Expression::Call(call) => self.lower_call(call),
            Expression::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expression(lhs)?;
                let rhs = self.lower_expression(rhs)?;
                let opcode = match op {
                    pico_parser::BinaryOp::Add => Opcode::Add,
                    pico_parser::BinaryOp::Sub => Opcode::Sub,
                    pico_parser::BinaryOp::Mul => Opcode::Mul,
                    pico_parser::BinaryOp::Div => Opcode::Div,
                };
                Ok(self.func.emit(&mut self.program.pool, opcode, &[lhs, rhs]))
            }
        }
    }

    fn lower_designator_read(&mut self, designator: &Designator) -> PicoResult<ValueId> {
        match designator {
            Designator::Var(name) => {
                if self.is_ssa_scalar(&name.value) {
                    let block = self.func.current_block();
                    Ok(self
                        .func
                        .read_variable(&mut self.program.pool, &name.value, block))
                } else {
                    let loc = self.func.location(&mut self.program.pool, &name.value);
                    Ok(self.func.emit(&mut self.program.pool, Opcode::LoadG, &[loc]))
                }
            }
            Designator::Array { .. } => {
                let addr = self.lower_array_address(designator)?;
                Ok(self.func.emit(&mut self.program.pool, Opcode::Load, &[addr]))
            }
        }
    }

    /// Linear address of an array element.
    ///
    /// `base + offset` comes first via ADDA, then the index expression is
    /// folded from the innermost dimension outward:
    /// `ADDA(ADDA(base, offset), ADD(MUL(stride_k, e_k), inner))` with
    /// `stride_k` the product of all dimensions after `k`.
    fn lower_array_address(&mut self, designator: &Designator) -> PicoResult<ValueId> {
        let Designator::Array { name, indices } = designator else {
            return Err(PicoError::ir("array address of a scalar designator"));
        };

        let (base, offset, dims) = self.array_base(&name.value, name.span.line())?;
        let offset_val = self.func.constant(&mut self.program.pool, offset);
        let array_base = self
            .func
            .emit(&mut self.program.pool, Opcode::Adda, &[base, offset_val]);

        // Index expressions evaluate in source order.
        let mut lowered = Vec::with_capacity(indices.len());
        for index in indices {
            lowered.push(self.lower_expression(index)?);
        }

        let mut index_val = lowered[lowered.len() - 1];
        let mut stride = 1i64;
        for k in (0..lowered.len() - 1).rev() {
            stride *= dims[k + 1];
            let stride_val = self.func.constant(&mut self.program.pool, stride);
            let scaled = self
                .func
                .emit(&mut self.program.pool, Opcode::Mul, &[stride_val, lowered[k]]);
            index_val = self
                .func
                .emit(&mut self.program.pool, Opcode::Add, &[scaled, index_val]);
        }

        Ok(self
            .func
            .emit(&mut self.program.pool, Opcode::Adda, &[array_base, index_val]))
    }

    /// Base pointer, slot offset, and dimensions for an array name
    fn array_base(&mut self, name: &str, line: u32) -> PicoResult<(ValueId, i64, Vec<i64>)> {
        if self.symbols.is_local(self.scope_name(), name) {
            let info = self
                .func
                .variable(name)
                .ok_or_else(|| PicoError::semantic(line, format!("unknown local '{}'", name)))?;
            let dims = info
                .dims
                .clone()
                .ok_or_else(|| PicoError::semantic(line, format!("'{}' is not an array", name)))?;
            Ok((self.func.local_base, info.offset, dims))
        } else {
            let info = self
                .program
                .globals
                .get(name)
                .ok_or_else(|| PicoError::semantic(line, format!("unknown global '{}'", name)))?;
            let dims = info
                .dims
                .clone()
                .ok_or_else(|| PicoError::semantic(line, format!("'{}' is not an array", name)))?;
            Ok((self.program.global_base, info.offset, dims))
        }
    }

    fn lower_call(&mut self, call: &FuncCall) -> PicoResult<ValueId> {
        match call.name.value.as_str() {
            INTRINSIC_INPUT_NUM => Ok(self.func.emit(&mut self.program.pool, Opcode::Read, &[])),
            INTRINSIC_OUTPUT_NUM => {
                let value = self.lower_expression(&call.args[0])?;
                Ok(self
                    .func
                    .emit(&mut self.program.pool, Opcode::WriteX, &[value]))
            }
            INTRINSIC_OUTPUT_NEW_LINE => {
                Ok(self.func.emit(&mut self.program.pool, Opcode::WriteNl, &[]))
            }
            name => {
                for arg in &call.args {
                    let value = self.lower_expression(arg)?;
                    self.func.emit(&mut self.program.pool, Opcode::Arg, &[value]);
                }
                let callee = self.program.pool.create(ValueKind::Func(name.to_string()));
                Ok(self
                    .func
                    .emit(&mut self.program.pool, Opcode::Call, &[callee]))
            }
        }
    }

    fn lower_relation(&mut self, relation: &Relation) -> PicoResult<ValueId> {
        let lhs = self.lower_expression(&relation.lhs)?;
        let rhs = self.lower_expression(&relation.rhs)?;
        Ok(self.func.emit(&mut self.program.pool, Opcode::Cmp, &[lhs, rhs]))
    }

    /// Conditional branch taken when `op` holds for the comparison result
    fn branch_opcode(op: RelOp) -> Opcode {
        match op {
            RelOp::Eq => Opcode::Beq,
            RelOp::Neq => Opcode::Bne,
            RelOp::Lt => Opcode::Blt,
            RelOp::Lte => Opcode::Ble,
            RelOp::Gt => Opcode::Bgt,
            RelOp::Gte => Opcode::Bge,
        }
    }

    /// True when `block` already ends in a terminator
    fn terminated(&self, block: BlockId) -> bool {
        self.func
            .block(block)
            .instructions()
            .last()
            .map(|&id| self.func.instr(id).opcode.is_terminator())
            .unwrap_or(false)
    }

    /// Close the current block with `BRA target` and the matching edge,
    /// unless the block already ended (a `return` inside the arm).
    fn branch_to(&mut self, target: BlockId) {
        let current = self.func.current_block();
        if self.terminated(current) {
            return;
        }
        let label = self.func.branch_target(&mut self.program.pool, target);
        self.func.emit(&mut self.program.pool, Opcode::Bra, &[label]);
        self.func.add_edge(current, target);
    }

    /// The condition branches to the false arm (negated relation); the
    /// true arm is the fall-through. Arms are sealed as soon as their
    /// single predecessor edge exists, the join once both arms are in.
    fn lower_if(&mut self, if_stmt: &IfStmt) -> PicoResult<()> {
        let cmp = self.lower_relation(&if_stmt.condition)?;
        let cond_block = self.func.current_block();

        let then_block = self.func.create_block(BlockKind::Normal);
        let else_block = if_stmt
            .else_body
            .as_ref()
            .map(|_| self.func.create_block(BlockKind::Normal));
        let join_block = self.func.create_block(BlockKind::Join);
        let false_target = else_block.unwrap_or(join_block);

        let label = self.func.branch_target(&mut self.program.pool, false_target);
        let opcode = Self::branch_opcode(if_stmt.condition.op.negated());
        self.func.emit(&mut self.program.pool, opcode, &[cmp, label]);
        self.func.add_edge(cond_block, then_block);
        self.func.add_edge(cond_block, false_target);
        self.func.seal_block(&mut self.program.pool, then_block);
        if let Some(else_block) = else_block {
            self.func.seal_block(&mut self.program.pool, else_block);
        }

        self.func.set_current_block(then_block);
        self.lower_body(&if_stmt.then_body)?;
        self.branch_to(join_block);

        if let (Some(else_block), Some(else_body)) = (else_block, &if_stmt.else_body) {
            self.func.set_current_block(else_block);
            self.lower_body(else_body)?;
            self.branch_to(join_block);
        }

        self.func.seal_block(&mut self.program.pool, join_block);
        self.func.set_current_block(join_block);
        Ok(())
    }

    /// The loop header is a join of the pre-header and the back edge. The
    /// back-edge predecessor does not exist while the body is lowered, so
    /// the header stays unsealed until afterwards; reads inside the loop
    /// collect incomplete phis in the header.
    fn lower_while(&mut self, while_stmt: &WhileStmt) -> PicoResult<()> {
        let pre_header = self.func.current_block();
        let header = self.func.create_block(BlockKind::LoopHead);
        if !self.terminated(pre_header) {
            self.func.add_edge(pre_header, header);
        }

        self.func.set_current_block(header);
        let cmp = self.lower_relation(&while_stmt.condition)?;

        let body_block = self.func.create_block(BlockKind::Normal);
        let exit_block = self.func.create_block(BlockKind::Normal);
        let label = self.func.branch_target(&mut self.program.pool, exit_block);
        let opcode = Self::branch_opcode(while_stmt.condition.op.negated());
        self.func.emit(&mut self.program.pool, opcode, &[cmp, label]);
        self.func.add_edge(header, body_block);
        self.func.add_edge(header, exit_block);
        self.func.seal_block(&mut self.program.pool, body_block);

        self.func.set_current_block(body_block);
        self.lower_body(&while_stmt.body)?;
        self.branch_to(header);

        self.func.seal_block(&mut self.program.pool, header);
        self.func.seal_block(&mut self.program.pool, exit_block);
        self.func.set_current_block(exit_block);
        Ok(())
    }

    fn lower_return(&mut self, ret: &ReturnStmt) -> PicoResult<()> {
        match &ret.value {
            Some(value) => {
                let value = self.lower_expression(value)?;
                self.func.emit(&mut self.program.pool, Opcode::Ret, &[value]);
            }
            None => {
                self.func.emit(&mut self.program.pool, Opcode::Ret, &[]);
            }
        }
        Ok(())
    }

    /// Create the exit block, linked from the final lowered block. `main`
    /// ends in END; functions that can fall off the end get an implicit
    /// bare RET.
    fn finish_function(&mut self, is_main: bool) {
        let last = self.func.current_block();
        let exit = self.func.create_block(BlockKind::Exit);
        let reachable = !self.terminated(last);
        if reachable {
            self.func.add_edge(last, exit);
        }
        self.func.seal_block(&mut self.program.pool, exit);
        self.func.set_current_block(exit);
        if is_main {
            self.func.emit(&mut self.program.pool, Opcode::End, &[]);
        } else if reachable {
            self.func.emit(&mut self.program.pool, Opcode::Ret, &[]);
        }
        self.func.exit = Some(exit);
    }
}
