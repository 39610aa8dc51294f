//! Integration tests for the pico lexer over whole programs

use pico_lexer::{Lexer, TokenKind};
use proptest::prelude::*;

#[test]
fn tokenizes_a_complete_program() {
    let source = r#"
main
var a, b;
array[3][4] grid;
{
    let a <- 1;
    while a < 10 do
        let a <- a + 1;
        let grid[1][2] <- a
    od;
    call OutputNum(a)
}.
"#;

    let tokens = Lexer::new(source).tokenize().expect("program should lex");
    assert_eq!(tokens.first().map(|t| t.kind.clone()), Some(TokenKind::Main));
    assert_eq!(tokens.last().map(|t| t.kind.clone()), Some(TokenKind::EndOfFile));

    let dots = tokens.iter().filter(|t| t.kind == TokenKind::Dot).count();
    assert_eq!(dots, 1, "exactly the program terminator");
}

#[test]
fn keywords_never_glue_to_identifiers() {
    let tokens = Lexer::new("ifx fi0 odd").tokenize().unwrap();
    let idents: Vec<_> = tokens
        .iter()
        .filter_map(|t| match &t.kind {
            TokenKind::Ident(name) => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(idents, vec!["ifx", "fi0", "odd"]);
}

proptest! {
    /// Any grammar-shaped identifier lexes to exactly one identifier or
    /// keyword token plus end-of-file.
    #[test]
    fn identifier_shapes_lex_cleanly(name in "[A-Za-z][A-Za-z0-9]{0,12}") {
        let tokens = Lexer::new(&name).tokenize().unwrap();
        prop_assert_eq!(tokens.len(), 2);
        match &tokens[0].kind {
            TokenKind::Ident(lexeme) => prop_assert_eq!(lexeme, &name),
            kind => prop_assert!(TokenKind::keyword(&name).as_ref() == Some(kind)),
        }
    }

    /// Numbers survive the round trip through the lexer.
    #[test]
    fn numbers_round_trip(n in 0i64..1_000_000_000) {
        let source = n.to_string();
        let tokens = Lexer::new(&source).tokenize().unwrap();
        prop_assert_eq!(&tokens[0].kind, &TokenKind::Number(n));
    }
}
