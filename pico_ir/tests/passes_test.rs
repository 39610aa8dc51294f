//! Behavior of the optional analysis passes

use pico_ir::passes::{self, global_clobbering};
use pico_ir::{build_program, Opcode, Program, ValueKind};
use pico_lexer::Lexer;
use pico_parser::Parser;
use pretty_assertions::assert_eq;

fn build(source: &str) -> Program {
    let tokens = Lexer::new(source).tokenize().expect("lexes");
    let (computation, symbols) = Parser::new(tokens).parse().expect("parses");
    build_program(&computation, &symbols).expect("builds IR")
}

fn count_active(program: &Program, name: &str, opcode: Opcode) -> usize {
    let function = program.function(name).unwrap();
    function
        .instr_ids()
        .filter(|&id| function.is_active(id) && function.instr(id).opcode == opcode)
        .count()
}

#[test]
fn constant_folding_collapses_arithmetic() {
    let mut program = build("main var a; { let a <- 2 + 3 * 4; call OutputNum(a) }.");
    assert_eq!(count_active(&program, "main", Opcode::Add), 1);
    assert_eq!(count_active(&program, "main", Opcode::Mul), 1);

    passes::const_fold::run(&mut program);

    assert_eq!(count_active(&program, "main", Opcode::Add), 0);
    assert_eq!(count_active(&program, "main", Opcode::Mul), 0);

    // The WRITEX operand is now the folded constant.
    let main = program.function("main").unwrap();
    let writex = main
        .instr_ids()
        .map(|id| main.instr(id))
        .find(|instr| instr.opcode == Opcode::WriteX)
        .unwrap();
    assert_eq!(program.pool.kind(writex.operands[0]), &ValueKind::Const(14));
}

#[test]
fn constant_folding_leaves_division_by_zero() {
    let mut program = build("main var a; { let a <- 7 / 0; call OutputNum(a) }.");
    passes::const_fold::run(&mut program);
    assert_eq!(count_active(&program, "main", Opcode::Div), 1);
}

#[test]
fn folding_collapses_phis_that_become_trivial() {
    let mut program = build(
        "main var a, b; \
         { if 1 < 2 then let a <- 2 + 3 else let a <- 1 + 4 fi; \
           let b <- a; call OutputNum(b) }.",
    );
    let main = program.function("main").unwrap();
    let phis_before = main
        .instr_ids()
        .filter(|&id| main.instr(id).is_phi() && main.is_active(id))
        .count();
    assert_eq!(phis_before, 1, "distinct ADDs keep the phi alive");

    passes::const_fold::run(&mut program);

    // Both arms fold to #5; the phi is now trivial and must go.
    let main = program.function("main").unwrap();
    let phis_after = main
        .instr_ids()
        .filter(|&id| main.instr(id).is_phi() && main.is_active(id))
        .count();
    assert_eq!(phis_after, 0);

    let writex = main
        .instr_ids()
        .map(|id| main.instr(id))
        .find(|instr| instr.opcode == Opcode::WriteX)
        .unwrap();
    assert_eq!(program.pool.kind(writex.operands[0]), &ValueKind::Const(5));
}

#[test]
fn cse_reuses_identical_expressions_within_a_block() {
    let mut program = build(
        "main var a, b, c; \
         { let a <- 1; let b <- a + 2; let c <- a + 2; call OutputNum(b + c) }.",
    );
    assert_eq!(count_active(&program, "main", Opcode::Add), 3);

    passes::cse::run(&mut program);

    assert_eq!(count_active(&program, "main", Opcode::Add), 2);
}

#[test]
fn dce_removes_unused_computations_but_keeps_effects() {
    let mut program = build(
        "main var a, b; { let a <- 1 + 2; let b <- 3 + 4; call OutputNum(b) }.",
    );
    assert_eq!(count_active(&program, "main", Opcode::Add), 2);

    passes::dce::run(&mut program);

    // a's ADD is dead, b's feeds the WRITEX.
    assert_eq!(count_active(&program, "main", Opcode::Add), 1);
    assert_eq!(count_active(&program, "main", Opcode::WriteX), 1);
}

#[test]
fn dce_keeps_loop_increments_feeding_live_phis() {
    let mut program = build(
        "main var i; { let i <- 0; while i < 10 do let i <- i + 1 od; call OutputNum(i) }.",
    );
    passes::dce::run(&mut program);

    let main = program.function("main").unwrap();
    assert_eq!(count_active(&program, "main", Opcode::Add), 1);
    let phis = main
        .instr_ids()
        .filter(|&id| main.instr(id).is_phi() && main.is_active(id))
        .count();
    assert_eq!(phis, 1, "live phi and its increment both survive");
}

#[test]
fn dce_never_breaks_control_flow() {
    let mut program = build(
        "main var i, x; \
         { let x <- 7; let i <- 0; while i < 10 do let i <- i + 1 od; call OutputNum(x) }.",
    );
    passes::dce::run(&mut program);

    // i is never observed after the loop, but the loop still runs: the
    // conditional branch pins its comparison, which pins the phi and the
    // increment. Deleting the loop wholesale is a job for a control-flow
    // pass, not DCE.
    assert_eq!(count_active(&program, "main", Opcode::Cmp), 1);
    assert_eq!(count_active(&program, "main", Opcode::Add), 1);
    assert_eq!(count_active(&program, "main", Opcode::Bge), 1);
}

#[test]
fn clobbering_is_transitive_through_calls() {
    let program = build(
        "main var g, h; \
         procedure writeg; { let g <- 1 }; \
         procedure callsit; { call writeg }; \
         { let g <- 0; let h <- 0; call callsit; call OutputNum(g) }.",
    );
    let clobbers = global_clobbering(&program);

    assert!(clobbers["writeg"].contains("g"));
    assert!(clobbers["callsit"].contains("g"), "transitive clobber");
    assert!(!clobbers["writeg"].contains("h"));
    assert!(clobbers["main"].contains("g"), "main calls callsit");
}

#[test]
fn redundant_global_loads_collapse_within_a_block() {
    let mut program = build(
        "main var g; \
         function twice; var t; { let t <- g + g; return t }; \
         { let g <- 1; call OutputNum(call twice) }.",
    );
    assert_eq!(count_active(&program, "twice", Opcode::LoadG), 2);

    passes::load_elim::run(&mut program);

    assert_eq!(count_active(&program, "twice", Opcode::LoadG), 1);
}

#[test]
fn stores_kill_available_loads() {
    let mut program = build(
        "main var g; \
         function stale; var t; { let t <- g; let g <- 5; let t <- t + g; return t }; \
         { let g <- 1; call OutputNum(call stale) }.",
    );
    assert_eq!(count_active(&program, "stale", Opcode::LoadG), 2);

    passes::load_elim::run(&mut program);

    // The STOREG between the loads invalidates the first one.
    assert_eq!(count_active(&program, "stale", Opcode::LoadG), 2);
}

#[test]
fn run_all_is_stable_on_a_mixed_program() {
    let mut program = build(
        "main var a, b, i; \
         { let a <- 2 + 3; let b <- a + 0; let i <- 0; \
           while i < b do let i <- i + 1 od; \
           call OutputNum(i) }.",
    );
    passes::run_all(&mut program);

    let main = program.function("main").unwrap();
    pico_ir::ssa::check_phis(main).unwrap();
    assert_eq!(count_active(&program, "main", Opcode::WriteX), 1);
}
