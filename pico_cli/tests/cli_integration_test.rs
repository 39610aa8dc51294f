//! End-to-end tests driving the compiled `picoc` binary

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("picoc-test-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

fn picoc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_picoc"))
}

#[test]
fn compiles_a_valid_program_and_writes_dumps() {
    let source = scratch("ok.pico");
    fs::write(
        &source,
        "main var a; { let a <- 0; while a < 5 do let a <- a + 1 od; call OutputNum(a) }.",
    )
    .unwrap();
    let dump = scratch("ok.ir");
    let graph = scratch("ok.vcg");
    let ast = scratch("ok.json");

    let status = picoc()
        .arg(&source)
        .arg("--dump-ir")
        .arg(&dump)
        .arg("--vcg")
        .arg(&graph)
        .arg("--emit-ast")
        .arg(&ast)
        .status()
        .expect("binary runs");
    assert!(status.success());

    let ir = fs::read_to_string(&dump).unwrap();
    assert!(ir.contains("main:"));
    assert!(ir.contains("BB_0:"));
    assert!(ir.contains("END"));

    let vcg = fs::read_to_string(&graph).unwrap();
    assert!(vcg.starts_with("graph: {"));
    assert!(vcg.contains("layoutalgorithm: compilergraph"));

    let json = fs::read_to_string(&ast).unwrap();
    assert!(json.contains("\"globals\""));
}

#[test]
fn parse_error_exits_with_one() {
    let source = scratch("bad_parse.pico");
    fs::write(&source, "main var a; { let a <- }.").unwrap();

    let output = picoc().arg(&source).output().expect("binary runs");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Parse error"), "stderr: {stderr}");
}

#[test]
fn semantic_error_exits_with_one() {
    let source = scratch("bad_sema.pico");
    fs::write(&source, "main var a; { let b <- 1 }.").unwrap();

    let output = picoc().arg(&source).output().expect("binary runs");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Semantic error"), "stderr: {stderr}");
}

#[test]
fn lexical_error_exits_with_one() {
    let source = scratch("bad_lex.pico");
    fs::write(&source, "main var a; { let a <- 3x }.").unwrap();

    let output = picoc().arg(&source).output().expect("binary runs");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Lexical error"), "stderr: {stderr}");
}

#[test]
fn missing_file_exits_with_one() {
    let output = picoc()
        .arg("definitely-not-a-real-file.pico")
        .output()
        .expect("binary runs");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn no_opt_still_compiles() {
    let source = scratch("noopt.pico");
    fs::write(
        &source,
        "main var a; { let a <- 1 + 2; call OutputNum(a) }.",
    )
    .unwrap();
    let dump = scratch("noopt.ir");

    let status = picoc()
        .arg(&source)
        .arg("--no-opt")
        .arg("--dump-ir")
        .arg(&dump)
        .status()
        .expect("binary runs");
    assert!(status.success());
    assert!(fs::read_to_string(&dump).unwrap().contains("ADD"));
}

#[test]
fn custom_register_count_is_accepted() {
    let source = scratch("regs.pico");
    fs::write(
        &source,
        "main var a, b; { let a <- 1; let b <- 2; call OutputNum(a + b) }.",
    )
    .unwrap();

    let status = picoc()
        .arg(&source)
        .arg("--registers")
        .arg("2")
        .status()
        .expect("binary runs");
    assert!(status.success());
}
