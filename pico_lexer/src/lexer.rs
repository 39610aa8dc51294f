//! Lexer implementation for the pico language

use crate::{Token, TokenKind};
use log::debug;
use pico_common::{PicoError, PicoResult, Position, Span};

/// Scanner over a borrowed source string.
///
/// Tracks line/column positions for error reporting. There is no error
/// recovery: the first bad character or malformed literal aborts with a
/// `LexicalError`.
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    position: usize,
    current_pos: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            position: 0,
            current_pos: Position::start(),
        }
    }

    /// Tokenize the entire input into a vector of tokens, ending with
    /// an end-of-file token.
    pub fn tokenize(&mut self) -> PicoResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if done {
                break;
            }
        }

        debug!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> PicoResult<Token> {
        self.skip_whitespace_and_comments();

        let start = self.current_pos;
        if self.is_at_end() {
            return Ok(Token::new(TokenKind::EndOfFile, Span::single(start)));
        }

        let kind = match self.current_char() {
            ';' => { self.advance(); TokenKind::Semicolon }
            ',' => { self.advance(); TokenKind::Comma }
            '(' => { self.advance(); TokenKind::LeftParen }
            ')' => { self.advance(); TokenKind::RightParen }
            '{' => { self.advance(); TokenKind::LeftBrace }
            '}' => { self.advance(); TokenKind::RightBrace }
            '[' => { self.advance(); TokenKind::LeftBracket }
            ']' => { self.advance(); TokenKind::RightBracket }
            '.' => { self.advance(); TokenKind::Dot }
            '*' => { self.advance(); TokenKind::Mul }
            '+' => { self.advance(); TokenKind::Add }
            '-' => { self.advance(); TokenKind::Sub }
            '/' => { self.advance(); TokenKind::Div }
            '=' => self.scan_equal()?,
            '!' => self.scan_bang()?,
            '<' => self.scan_less(),
            '>' => self.scan_greater(),
            c if c.is_ascii_digit() => self.scan_number()?,
            c if c.is_ascii_alphabetic() => self.scan_ident_or_keyword(),
            c => {
                return Err(PicoError::lexical(
                    start.line,
                    format!("unexpected character '{}'", c),
                ));
            }
        };

        let span = Span::new(start, self.current_pos);
        Ok(Token::new(kind, span))
    }

    fn scan_equal(&mut self) -> PicoResult<TokenKind> {
        let line = self.current_pos.line;
        self.advance();
        if self.current_char_opt() == Some('=') {
            self.advance();
            Ok(TokenKind::Eq)
        } else {
            Err(PicoError::lexical(line, "expected '==' after '='"))
        }
    }

    fn scan_bang(&mut self) -> PicoResult<TokenKind> {
        let line = self.current_pos.line;
        self.advance();
        if self.current_char_opt() == Some('=') {
            self.advance();
            Ok(TokenKind::Neq)
        } else {
            Err(PicoError::lexical(line, "expected '!=' after '!'"))
        }
    }

    fn scan_less(&mut self) -> TokenKind {
        self.advance();
        match self.current_char_opt() {
            Some('=') => {
                self.advance();
                TokenKind::Lte
            }
            Some('-') => {
                self.advance();
                TokenKind::LeftArrow
            }
            _ => TokenKind::Lt,
        }
    }

    fn scan_greater(&mut self) -> TokenKind {
        self.advance();
        if self.current_char_opt() == Some('=') {
            self.advance();
            TokenKind::Gte
        } else {
            TokenKind::Gt
        }
    }

    fn scan_number(&mut self) -> PicoResult<TokenKind> {
        let line = self.current_pos.line;
        let start = self.position;
        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            self.advance();
        }

        // A digit run immediately followed by a letter is not a number
        // and not two tokens either.
        if !self.is_at_end() && self.current_char().is_ascii_alphabetic() {
            return Err(PicoError::lexical(
                line,
                format!("malformed number '{}...'", &self.input[start..self.position]),
            ));
        }

        let lexeme = &self.input[start..self.position];
        lexeme
            .parse::<i64>()
            .map(TokenKind::Number)
            .map_err(|_| PicoError::lexical(line, format!("number '{}' out of range", lexeme)))
    }

    fn scan_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.position;
        while !self.is_at_end() && self.current_char().is_ascii_alphanumeric() {
            self.advance();
        }

        let lexeme = &self.input[start..self.position];
        TokenKind::keyword(lexeme).unwrap_or_else(|| TokenKind::Ident(lexeme.to_string()))
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current_char_opt() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.advance();
                }
                Some('#') => self.consume_line(),
                Some('/') if self.peek_char() == Some('/') => self.consume_line(),
                _ => break,
            }
        }
    }

    fn consume_line(&mut self) {
        while let Some(c) = self.current_char_opt() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    fn current_char(&self) -> char {
        self.bytes[self.position] as char
    }

    fn current_char_opt(&self) -> Option<char> {
        self.bytes.get(self.position).map(|&b| b as char)
    }

    fn peek_char(&self) -> Option<char> {
        self.bytes.get(self.position + 1).map(|&b| b as char)
    }

    fn advance(&mut self) {
        if self.is_at_end() {
            return;
        }
        if self.current_char() == '\n' {
            self.current_pos.line += 1;
            self.current_pos.column = 1;
        } else {
            self.current_pos.column += 1;
        }
        self.position += 1;
        self.current_pos.offset = self.position as u32;
    }
}
