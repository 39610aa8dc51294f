//! Register allocation over real programs: coalescing, coloring,
//! spilling, and phi destruction

use pico_ir::{build_program, Opcode, Program, ValueId, ValueKind, ValuePool};
use pico_lexer::Lexer;
use pico_parser::Parser;
use pico_regalloc::{
    allocate_program, check_coloring, AllocConfig, Color, IgBuilder, RegAllocator,
};
use pretty_assertions::assert_eq;

fn build(source: &str) -> Program {
    let tokens = Lexer::new(source).tokenize().expect("lexes");
    let (computation, symbols) = Parser::new(tokens).parse().expect("parses");
    build_program(&computation, &symbols).expect("builds IR")
}

fn main_index(program: &mut Program) -> usize {
    let (functions, _) = program.functions_and_pool();
    functions
        .iter()
        .position(|f| f.name() == "main")
        .expect("main exists")
}

const JOIN_PHI_SOURCE: &str =
    "main var a, b; { let a <- 1; if 1 < 2 then let a <- 3 else let a <- 4 fi; \
     let b <- a; call OutputNum(b) }.";

#[test]
fn coalesced_phi_shares_one_color_and_emits_no_moves() {
    let mut program = build(JOIN_PHI_SOURCE);

    // Snapshot the phi triple before allocation rewrites the IR.
    let main = program.function("main").unwrap();
    let phi = main
        .instr_ids()
        .map(|id| main.instr(id))
        .find(|instr| instr.is_phi() && instr.active)
        .expect("join phi exists")
        .clone();
    let (a1, a2, r) = (phi.operands[0], phi.operands[1], phi.result);

    let colorings = allocate_program(&mut program, &AllocConfig::default()).unwrap();
    let coloring = &colorings["main"];

    assert_eq!(coloring[&a1], coloring[&a2]);
    assert_eq!(coloring[&a1], coloring[&r]);

    let main = program.function("main").unwrap();
    assert!(
        !main.instr_ids().any(|id| main.instr(id).opcode == Opcode::Move),
        "a coalesced phi lowers to nothing"
    );
    assert!(
        !main
            .instr_ids()
            .any(|id| main.instr(id).is_phi() && main.is_active(id)),
        "no active phi survives destruction"
    );
}

#[test]
fn coloring_separates_interference_edges() {
    let mut program = build(
        "main var a, b; { let a <- 1; let b <- 2; \
         if a < b then let a <- b + 3 else let b <- a + 4 fi; \
         call OutputNum(a); call OutputNum(b) }.",
    );

    let index = main_index(&mut program);
    let (functions, pool) = program.functions_and_pool();
    let main = &mut functions[index];

    let graph = IgBuilder::build(main, pool);
    let mut allocator = RegAllocator::new(graph.clone(), AllocConfig::default());
    allocator.color_graph(pool).unwrap();
    check_coloring(&graph, &allocator.coloring).unwrap();

    allocator.destroy_phis(main, pool);
    check_coloring(&graph, &allocator.coloring).unwrap();
    assert!(!main
        .instr_ids()
        .any(|id| main.instr(id).is_phi() && main.is_active(id)));
}

/// The classic swap: both header phis carry the other's result around the
/// back edge, so operand and result interfere and coalescing must refuse.
/// Phi destruction then has to produce moves.
const SWAP_SOURCE: &str = "main var a, b, t; \
     { let a <- 0; let b <- 1; \
       while a < 9 do let t <- a; let a <- b; let b <- t od; \
       call OutputNum(a); call OutputNum(b) }.";

#[test]
fn swap_loop_phis_do_not_coalesce_and_produce_moves() {
    let mut program = build(SWAP_SOURCE);

    let main = program.function("main").unwrap();
    let phis: Vec<_> = main
        .instr_ids()
        .filter(|&id| main.instr(id).is_phi() && main.is_active(id))
        .map(|id| main.instr(id).clone())
        .collect();
    assert_eq!(phis.len(), 2, "one phi per swapped variable");

    let colorings = allocate_program(&mut program, &AllocConfig::default()).unwrap();
    let coloring = &colorings["main"];

    // The two phi results interfere (both live across the loop) and must
    // differ in color.
    assert_ne!(coloring[&phis[0].result], coloring[&phis[1].result]);

    let main = program.function("main").unwrap();
    let moves: Vec<_> = main
        .instr_ids()
        .filter(|&id| main.instr(id).opcode == Opcode::Move)
        .collect();
    assert!(!moves.is_empty(), "swap requires phi-destruction moves");

    // Every move's destination register carries the phi result's color.
    for id in moves {
        let reg = main.instr(id).operands[1];
        assert!(coloring.contains_key(&reg));
    }
}

#[test]
fn moves_splice_before_the_block_terminator() {
    let mut program = build(SWAP_SOURCE);
    allocate_program(&mut program, &AllocConfig::default()).unwrap();

    let main = program.function("main").unwrap();
    for block in main.blocks() {
        let instrs = block.instructions();
        for (position, &id) in instrs.iter().enumerate() {
            if main.instr(id).opcode == Opcode::Move {
                // Nothing after a move except more moves or the terminator.
                for &later in &instrs[position + 1..] {
                    let opcode = main.instr(later).opcode;
                    assert!(
                        opcode == Opcode::Move || opcode.is_terminator(),
                        "move must sit at the end of {}, found {:?} after it",
                        block.idx,
                        opcode
                    );
                }
            }
        }
    }
}

#[test]
fn loop_header_phi_coalesces_with_increment() {
    let mut program = build("main var i; { let i <- 0; while i < 10 do let i <- i + 1 od; call OutputNum(i) }.");

    let main = program.function("main").unwrap();
    let phi = main
        .instr_ids()
        .map(|id| main.instr(id))
        .find(|instr| instr.is_phi() && instr.active)
        .unwrap()
        .clone();

    let colorings = allocate_program(&mut program, &AllocConfig::default()).unwrap();
    let coloring = &colorings["main"];
    assert_eq!(coloring[&phi.result], coloring[&phi.operands[1]]);

    let main = program.function("main").unwrap();
    assert!(!main.instr_ids().any(|id| main.instr(id).opcode == Opcode::Move));
}

#[test]
fn loop_depth_raises_spill_priority() {
    let mut program = build(SWAP_SOURCE);
    let index = main_index(&mut program);
    let (functions, pool) = program.functions_and_pool();
    let main = &mut functions[index];
    IgBuilder::build(main, pool);

    // The header phis live inside the loop; the initial constants do not.
    let phi_results: Vec<ValueId> = main
        .instr_ids()
        .filter(|&id| main.instr(id).is_phi() && main.is_active(id))
        .map(|id| main.instr(id).result)
        .collect();
    for result in phi_results {
        assert_eq!(pool.get(result).loop_depth, 1);
    }
}

#[test]
fn strict_mode_fails_on_a_clique_larger_than_the_palette() {
    let mut pool = ValuePool::new();
    let values: Vec<ValueId> = (0..3).map(|_| pool.create(ValueKind::Any)).collect();
    let mut graph = pico_regalloc::InterferenceGraph::new();
    for (i, &a) in values.iter().enumerate() {
        for &b in &values[i + 1..] {
            graph.add_edge(a, b);
        }
    }

    let mut strict = RegAllocator::new(
        graph.clone(),
        AllocConfig { registers: 2, strict: true },
    );
    let err = strict.color_graph(&mut pool).unwrap_err();
    assert!(matches!(err, pico_common::PicoError::AllocError { .. }));

    // The default mode keeps going with a virtual color instead.
    let mut relaxed = RegAllocator::new(
        graph.clone(),
        AllocConfig { registers: 2, strict: false },
    );
    relaxed.color_graph(&mut pool).unwrap();
    check_coloring(&graph, &relaxed.coloring).unwrap();
    let virtual_colors = values
        .iter()
        .filter(|v| !relaxed.color_of(**v).is_physical(2))
        .count();
    assert_eq!(virtual_colors, 1);
}

#[test]
fn spill_retry_ranks_expensive_values_first() {
    // A triangle over a one-register palette: one value keeps the
    // register, the other two spill. The retry hands the deeper (more
    // expensive) value the lower virtual slot.
    let mut pool = ValuePool::new();
    let keeper = pool.create(ValueKind::Any);
    let cheap = pool.create(ValueKind::Any);
    let costly = pool.create(ValueKind::Any);
    pool.get_mut(costly).loop_depth = 2;

    let mut graph = pico_regalloc::InterferenceGraph::new();
    graph.add_edge(keeper, cheap);
    graph.add_edge(keeper, costly);
    graph.add_edge(cheap, costly);

    let mut allocator = RegAllocator::new(graph, AllocConfig { registers: 1, strict: false });
    allocator.color_graph(&mut pool).unwrap();

    assert_eq!(allocator.color_of(keeper), Color::Reg(1));
    assert_eq!(allocator.color_of(costly), Color::Reg(2));
    assert_eq!(allocator.color_of(cheap), Color::Reg(3));
    assert!(pool.get(costly).spill_cost > pool.get(cheap).spill_cost);
}

#[test]
fn allocation_respects_a_custom_palette_size() {
    let mut program = build(SWAP_SOURCE);
    let colorings = allocate_program(
        &mut program,
        &AllocConfig { registers: 3, strict: false },
    )
    .unwrap();
    for color in colorings["main"].values() {
        if let Color::Reg(r) = color {
            assert!(*r <= 8, "tiny program must not need many colors");
        }
    }
}
