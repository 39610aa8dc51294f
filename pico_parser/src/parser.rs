//! Recursive-descent parser for the pico language
//!
//! One method per grammar production. The parser owns the token stream
//! and builds the symbol table while it goes; a semantic validation walk
//! over the finished tree checks uses against declarations (calls may
//! reference functions declared later, so use checks cannot happen
//! inline).

use crate::ast::*;
use crate::symbol::{FuncSig, Symbol, SymbolTable};
use log::debug;
use pico_common::{PicoError, PicoResult, Span, Spanned};
use pico_lexer::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    symbols: SymbolTable,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            symbols: SymbolTable::new(),
        }
    }

    /// Parse a whole program and validate uses against declarations.
    pub fn parse(mut self) -> PicoResult<(Computation, SymbolTable)> {
        let computation = self.parse_computation()?;
        validate(&computation, &self.symbols)?;
        debug!(
            "parsed computation: {} globals, {} functions",
            computation.globals.len(),
            computation.functions.len()
        );
        Ok((computation, self.symbols))
    }

    // computation = "main" { varDecl } { funcDecl } "{" statSequence "}" "."
    fn parse_computation(&mut self) -> PicoResult<Computation> {
        let start = self.current_span();
        self.expect(&TokenKind::Main)?;

        let mut globals = Vec::new();
        while matches!(self.peek(), TokenKind::Var | TokenKind::Array) {
            let decl = self.parse_var_decl()?;
            for name in &decl.names {
                self.symbols.declare_global(
                    name.span.line(),
                    &name.value,
                    Symbol::from_type_decl(&decl.type_decl),
                )?;
            }
            globals.push(decl);
        }

        let mut functions = Vec::new();
        while matches!(self.peek(), TokenKind::Function | TokenKind::Procedure) {
            functions.push(self.parse_func_decl()?);
        }

        self.expect(&TokenKind::LeftBrace)?;
        let body = self.parse_stat_sequence()?;
        self.expect(&TokenKind::RightBrace)?;
        let end = self.current_span();
        self.expect(&TokenKind::Dot)?;

        Ok(Computation {
            globals,
            functions,
            body,
            span: start.combine(end),
        })
    }

    // varDecl = typeDecl ident { "," ident } ";"
    fn parse_var_decl(&mut self) -> PicoResult<VarDecl> {
        let start = self.current_span();
        let type_decl = self.parse_type_decl()?;

        let mut names = vec![self.parse_ident()?];
        while self.advance_if(&TokenKind::Comma) {
            names.push(self.parse_ident()?);
        }
        let end = self.current_span();
        self.expect(&TokenKind::Semicolon)?;

        Ok(VarDecl {
            type_decl,
            names,
            span: start.combine(end),
        })
    }

    // typeDecl = "var" | "array" "[" number "]" { "[" number "]" }
    fn parse_type_decl(&mut self) -> PicoResult<TypeDecl> {
        if self.advance_if(&TokenKind::Var) {
            return Ok(TypeDecl::Scalar);
        }

        self.expect(&TokenKind::Array)?;
        let mut dims = Vec::new();
        loop {
            self.expect(&TokenKind::LeftBracket)?;
            let dim = self.parse_number()?;
            if dim.value <= 0 {
                return Err(PicoError::semantic(
                    dim.span.line(),
                    format!("array dimension must be positive, got {}", dim.value),
                ));
            }
            dims.push(dim.value);
            self.expect(&TokenKind::RightBracket)?;
            if self.peek() != &TokenKind::LeftBracket {
                break;
            }
        }
        Ok(TypeDecl::Array(dims))
    }

    // funcDecl = ("function"|"procedure") ident [formalParam] ";" funcBody ";"
    fn parse_func_decl(&mut self) -> PicoResult<FuncDecl> {
        let start = self.current_span();
        let is_procedure = match self.advance().kind.clone() {
            TokenKind::Function => false,
            TokenKind::Procedure => true,
            kind => {
                return Err(PicoError::parse(
                    start.line(),
                    "'function' or 'procedure'",
                    kind.to_string(),
                ));
            }
        };

        let name = self.parse_ident()?;

        // formalParam = "(" [ ident { "," ident } ] ")"
        let mut params = Vec::new();
        if self.advance_if(&TokenKind::LeftParen) {
            if self.peek() != &TokenKind::RightParen {
                params.push(self.parse_ident()?);
                while self.advance_if(&TokenKind::Comma) {
                    params.push(self.parse_ident()?);
                }
            }
            self.expect(&TokenKind::RightParen)?;
        }
        self.expect(&TokenKind::Semicolon)?;

        self.symbols.declare_function(
            name.span.line(),
            &name.value,
            FuncSig {
                arity: params.len(),
                is_procedure,
                is_intrinsic: false,
            },
        )?;
        for param in &params {
            self.symbols
                .declare_local(param.span.line(), &name.value, &param.value, Symbol::Param)?;
        }

        // funcBody = { varDecl } "{" [ statSequence ] "}"
        let mut locals = Vec::new();
        while matches!(self.peek(), TokenKind::Var | TokenKind::Array) {
            let decl = self.parse_var_decl()?;
            for local in &decl.names {
                self.symbols.declare_local(
                    local.span.line(),
                    &name.value,
                    &local.value,
                    Symbol::from_type_decl(&decl.type_decl),
                )?;
            }
            locals.push(decl);
        }

        self.expect(&TokenKind::LeftBrace)?;
        let body = if self.peek() == &TokenKind::RightBrace {
            Vec::new()
        } else {
            self.parse_stat_sequence()?
        };
        self.expect(&TokenKind::RightBrace)?;
        let end = self.current_span();
        self.expect(&TokenKind::Semicolon)?;

        Ok(FuncDecl {
            is_procedure,
            name,
            params,
            locals,
            body,
            span: start.combine(end),
        })
    }

    // statSequence = statement { ";" statement } [ ";" ]
    fn parse_stat_sequence(&mut self) -> PicoResult<Vec<Statement>> {
        let mut statements = vec![self.parse_statement()?];
        while self.advance_if(&TokenKind::Semicolon) {
            if self.starts_statement() {
                statements.push(self.parse_statement()?);
            } else {
                break;
            }
        }
        Ok(statements)
    }

    fn starts_statement(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Let | TokenKind::Call | TokenKind::If | TokenKind::While | TokenKind::Return
        )
    }

    fn parse_statement(&mut self) -> PicoResult<Statement> {
        match self.peek() {
            TokenKind::Let => self.parse_assignment().map(Statement::Assignment),
            TokenKind::Call => self.parse_func_call().map(Statement::Call),
            TokenKind::If => self.parse_if().map(Statement::If),
            TokenKind::While => self.parse_while().map(Statement::While),
            TokenKind::Return => self.parse_return().map(Statement::Return),
            kind => {
                let kind = kind.clone();
                Err(self.unexpected("a statement", &kind))
            }
        }
    }

    // assignment = "let" designator "<-" expression
    fn parse_assignment(&mut self) -> PicoResult<Assignment> {
        let start = self.current_span();
        self.expect(&TokenKind::Let)?;
        let target = self.parse_designator()?;
        self.expect(&TokenKind::LeftArrow)?;
        let value = self.parse_expression()?;
        Ok(Assignment {
            span: start.combine(self.previous_span()),
            target,
            value,
        })
    }

    // funcCall = "call" ident [ "(" [ expression { "," expression } ] ")" ]
    fn parse_func_call(&mut self) -> PicoResult<FuncCall> {
        let start = self.current_span();
        self.expect(&TokenKind::Call)?;
        self.parse_call_tail(start)
    }

    /// Call with the `call` keyword (statement form) already consumed, or
    /// absent (expression form).
    fn parse_call_tail(&mut self, start: Span) -> PicoResult<FuncCall> {
        let name = self.parse_ident()?;
        let mut args = Vec::new();
        if self.advance_if(&TokenKind::LeftParen) {
            if self.peek() != &TokenKind::RightParen {
                args.push(self.parse_expression()?);
                while self.advance_if(&TokenKind::Comma) {
                    args.push(self.parse_expression()?);
                }
            }
            self.expect(&TokenKind::RightParen)?;
        }
        Ok(FuncCall {
            span: start.combine(self.previous_span()),
            name,
            args,
        })
    }

    // ifStmt = "if" relation "then" statSequence [ "else" statSequence ] "fi"
    fn parse_if(&mut self) -> PicoResult<IfStmt> {
        let start = self.current_span();
        self.expect(&TokenKind::If)?;
        let condition = self.parse_relation()?;
        self.expect(&TokenKind::Then)?;
        let then_body = self.parse_stat_sequence()?;
        let else_body = if self.advance_if(&TokenKind::Else) {
            Some(self.parse_stat_sequence()?)
        } else {
            None
        };
        let end = self.current_span();
        self.expect(&TokenKind::Fi)?;
        Ok(IfStmt {
            condition,
            then_body,
            else_body,
            span: start.combine(end),
        })
    }

    // whileStmt = "while" relation "do" statSequence "od"
    fn parse_while(&mut self) -> PicoResult<WhileStmt> {
        let start = self.current_span();
        self.expect(&TokenKind::While)?;
        let condition = self.parse_relation()?;
        self.expect(&TokenKind::Do)?;
        let body = self.parse_stat_sequence()?;
        let end = self.current_span();
        self.expect(&TokenKind::Od)?;
        Ok(WhileStmt {
            condition,
            body,
            span: start.combine(end),
        })
    }

    // returnStmt = "return" [ expression ]
    fn parse_return(&mut self) -> PicoResult<ReturnStmt> {
        let start = self.current_span();
        self.expect(&TokenKind::Return)?;
        let value = if self.starts_expression() {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(ReturnStmt {
            span: start.combine(self.previous_span()),
            value,
        })
    }

    fn starts_expression(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Ident(_) | TokenKind::Number(_) | TokenKind::LeftParen | TokenKind::Call
        )
    }

    // relation = expression relOp expression
    fn parse_relation(&mut self) -> PicoResult<Relation> {
        let start = self.current_span();
        let lhs = self.parse_expression()?;
        let op_span = self.current_span();
        let op = match self.advance().kind.clone() {
            TokenKind::Eq => RelOp::Eq,
            TokenKind::Neq => RelOp::Neq,
            TokenKind::Lt => RelOp::Lt,
            TokenKind::Lte => RelOp::Lte,
            TokenKind::Gt => RelOp::Gt,
            TokenKind::Gte => RelOp::Gte,
            kind => {
                return Err(PicoError::parse(
                    op_span.line(),
                    "a relational operator",
                    kind.to_string(),
                ));
            }
        };
        let rhs = self.parse_expression()?;
        Ok(Relation {
            span: start.combine(self.previous_span()),
            op,
            lhs,
            rhs,
        })
    }

    // expression = term { ("+"|"-") term }
    fn parse_expression(&mut self) -> PicoResult<Expression> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Add => BinaryOp::Add,
                TokenKind::Sub => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // term = factor { ("*"|"/") factor }
    fn parse_term(&mut self) -> PicoResult<Expression> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Mul => BinaryOp::Mul,
                TokenKind::Div => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    // factor = designator | number | "(" expression ")" | funcCall
    fn parse_factor(&mut self) -> PicoResult<Expression> {
        match self.peek().clone() {
            TokenKind::Number(_) => Ok(Expression::Number(self.parse_number()?)),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::Call => {
                let start = self.current_span();
                self.advance();
                self.parse_call_tail(start).map(Expression::Call)
            }
            TokenKind::Ident(_) => self.parse_designator().map(Expression::Designator),
            kind => Err(self.unexpected("a factor", &kind)),
        }
    }

    // designator = ident { "[" expression "]" }
    fn parse_designator(&mut self) -> PicoResult<Designator> {
        let name = self.parse_ident()?;
        let mut indices = Vec::new();
        while self.advance_if(&TokenKind::LeftBracket) {
            indices.push(self.parse_expression()?);
            self.expect(&TokenKind::RightBracket)?;
        }
        if indices.is_empty() {
            Ok(Designator::Var(name))
        } else {
            Ok(Designator::Array { name, indices })
        }
    }

    fn parse_ident(&mut self) -> PicoResult<Spanned<String>> {
        let span = self.current_span();
        match self.advance().kind.clone() {
            TokenKind::Ident(name) => Ok(Spanned::new(name, span)),
            kind => Err(PicoError::parse(span.line(), "an identifier", kind.to_string())),
        }
    }

    fn parse_number(&mut self) -> PicoResult<Spanned<i64>> {
        let span = self.current_span();
        match self.advance().kind.clone() {
            TokenKind::Number(n) => Ok(Spanned::new(n, span)),
            kind => Err(PicoError::parse(span.line(), "a number", kind.to_string())),
        }
    }

    // Token-stream helpers

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.current.min(self.tokens.len() - 1)].kind
    }

    fn current_span(&self) -> Span {
        self.tokens[self.current.min(self.tokens.len() - 1)].span
    }

    fn previous_span(&self) -> Span {
        self.tokens[self.current.saturating_sub(1)].span
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.current.min(self.tokens.len() - 1)];
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    fn advance_if(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> PicoResult<()> {
        if self.advance_if(kind) {
            Ok(())
        } else {
            let found = self.peek().clone();
            Err(self.unexpected(kind.to_string(), &found))
        }
    }

    fn unexpected(&self, expected: impl Into<String>, found: &TokenKind) -> PicoError {
        PicoError::parse(self.current_span().line(), expected, found.to_string())
    }
}

/// Semantic validation of the parsed tree against the symbol table:
/// undeclared names, call arity, scalar/array misuse, dimension counts,
/// value-returning use of procedures.
fn validate(computation: &Computation, symbols: &SymbolTable) -> PicoResult<()> {
    for func in &computation.functions {
        let scope = Some(func.name.value.as_str());
        validate_body(&func.body, scope, symbols, func.is_procedure)?;
    }
    validate_body(&computation.body, None, symbols, true)
}

fn validate_body(
    body: &[Statement],
    scope: Option<&str>,
    symbols: &SymbolTable,
    is_procedure: bool,
) -> PicoResult<()> {
    for statement in body {
        match statement {
            Statement::Assignment(assign) => {
                validate_designator(&assign.target, scope, symbols)?;
                validate_expression(&assign.value, scope, symbols)?;
            }
            Statement::Call(call) => validate_call(call, scope, symbols, false)?,
            Statement::If(if_stmt) => {
                validate_expression(&if_stmt.condition.lhs, scope, symbols)?;
                validate_expression(&if_stmt.condition.rhs, scope, symbols)?;
                validate_body(&if_stmt.then_body, scope, symbols, is_procedure)?;
                if let Some(else_body) = &if_stmt.else_body {
                    validate_body(else_body, scope, symbols, is_procedure)?;
                }
            }
            Statement::While(while_stmt) => {
                validate_expression(&while_stmt.condition.lhs, scope, symbols)?;
                validate_expression(&while_stmt.condition.rhs, scope, symbols)?;
                validate_body(&while_stmt.body, scope, symbols, is_procedure)?;
            }
            Statement::Return(ret) => {
                if let Some(value) = &ret.value {
                    if is_procedure {
                        return Err(PicoError::semantic(
                            ret.span.line(),
                            "procedure cannot return a value",
                        ));
                    }
                    validate_expression(value, scope, symbols)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_expression(
    expr: &Expression,
    scope: Option<&str>,
    symbols: &SymbolTable,
) -> PicoResult<()> {
    match expr {
        Expression::Number(_) => Ok(()),
        Expression::Designator(designator) => validate_designator(designator, scope, symbols),
        Expression::Call(call) => validate_call(call, scope, symbols, true),
        Expression::Binary { lhs, rhs, .. } => {
            validate_expression(lhs, scope, symbols)?;
            validate_expression(rhs, scope, symbols)
        }
    }
}

fn validate_designator(
    designator: &Designator,
    scope: Option<&str>,
    symbols: &SymbolTable,
) -> PicoResult<()> {
    let name = designator.name();
    let line = designator.span().line();
    let symbol = symbols
        .lookup(scope, name)
        .ok_or_else(|| PicoError::semantic(line, format!("undeclared identifier '{}'", name)))?;

    match designator {
        Designator::Var(_) => {
            if symbol.is_array() {
                return Err(PicoError::semantic(
                    line,
                    format!("array '{}' used without indices", name),
                ));
            }
        }
        Designator::Array { indices, .. } => match symbol {
            Symbol::Array { dims } => {
                if dims.len() != indices.len() {
                    return Err(PicoError::semantic(
                        line,
                        format!(
                            "'{}' has {} dimensions, {} indices given",
                            name,
                            dims.len(),
                            indices.len()
                        ),
                    ));
                }
                for index in indices {
                    validate_expression(index, scope, symbols)?;
                }
            }
            _ => {
                return Err(PicoError::semantic(
                    line,
                    format!("scalar '{}' cannot be indexed", name),
                ));
            }
        },
    }
    Ok(())
}

fn validate_call(
    call: &FuncCall,
    scope: Option<&str>,
    symbols: &SymbolTable,
    needs_value: bool,
) -> PicoResult<()> {
    let line = call.span.line();
    let sig = symbols
        .function(&call.name.value)
        .ok_or_else(|| PicoError::semantic(line, format!("call to undeclared function '{}'", call.name.value)))?;

    if sig.arity != call.args.len() {
        return Err(PicoError::semantic(
            line,
            format!(
                "'{}' takes {} arguments, {} given",
                call.name.value,
                sig.arity,
                call.args.len()
            ),
        ));
    }
    if needs_value && sig.is_procedure {
        return Err(PicoError::semantic(
            line,
            format!("procedure '{}' produces no value", call.name.value),
        ));
    }
    for arg in &call.args {
        validate_expression(arg, scope, symbols)?;
    }
    Ok(())
}
