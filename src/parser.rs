//! Parser for the script language
//!
//! Statements are parsed by recursive descent and every `if`/`for`
//! consumes its own `end`. Expressions use precedence climbing over the
//! binary operator table below.

use crate::ast::*;
use crate::error::{Result, ScriptError};
use crate::lexer::{Lexer, Token, TokenKind};

/// Deepest statement/expression nesting accepted before bailing out.
pub const MAX_NESTING: usize = 128;

/// Binding power of infix operators, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equality,
    Comparison,
    Term,
    Factor,
}

fn infix_operator(kind: &TokenKind) -> Option<(BinaryOp, Precedence)> {
    let op = match kind {
        TokenKind::Equal => (BinaryOp::Eq, Precedence::Equality),
        TokenKind::NotEqual => (BinaryOp::Ne, Precedence::Equality),
        TokenKind::Less => (BinaryOp::Lt, Precedence::Comparison),
        TokenKind::Greater => (BinaryOp::Gt, Precedence::Comparison),
        TokenKind::Plus => (BinaryOp::Add, Precedence::Term),
        TokenKind::Minus => (BinaryOp::Sub, Precedence::Term),
        TokenKind::Star => (BinaryOp::Mul, Precedence::Factor),
        TokenKind::Slash => (BinaryOp::Div, Precedence::Factor),
        _ => return None,
    };
    Some(op)
}

fn starts_expression(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number(_)
            | TokenKind::String(_)
            | TokenKind::Identifier(_)
            | TokenKind::LeftParen
            | TokenKind::LeftBracket
            | TokenKind::LeftBrace
    )
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof => "end of input".to_string(),
        _ => format!("'{}'", token.lexeme),
    }
}

/// Lex and parse a script in one step.
pub fn parse_source(source: &str) -> Result<Block> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

/// Parser for script source
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let line = tokens.last().map(|t| t.line).unwrap_or(1);
            tokens.push(Token::new(TokenKind::Eof, line, 0, String::new()));
        }
        Parser {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    /// Parse a complete script into its top-level block
    pub fn parse(&mut self) -> Result<Block> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if self.match_token(&[TokenKind::Semicolon]) {
                continue;
            }
            statements.push(self.statement()?);
        }

        Ok(Block { statements })
    }

    // Helper methods

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    // `new` guarantees a trailing Eof and `advance` never moves past it.
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<String> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            return Ok(name);
        }
        Err(self.error(message))
    }

    fn error(&self, message: &str) -> ScriptError {
        let token = self.peek();
        ScriptError::ParserError {
            line: token.line,
            message: format!("{}, found {}", message, describe(token)),
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ScriptError::ParserError {
                line: self.peek().line,
                message: format!("Nesting deeper than {} levels", MAX_NESTING),
            });
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // Statements

    fn statement(&mut self) -> Result<Statement> {
        self.descend()?;
        let statement = self.statement_inner();
        self.ascend();
        let statement = statement?;
        self.match_token(&[TokenKind::Semicolon]);
        Ok(statement)
    }

    fn statement_inner(&mut self) -> Result<Statement> {
        match &self.peek().kind {
            TokenKind::Set => self.set_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::For => self.for_statement(),
            kind if kind.command_name().is_some() => self.command_statement(),
            TokenKind::Else | TokenKind::End => {
                Err(self.error("Expected a statement ('else' and 'end' must close an 'if' or 'for')"))
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let line = self.peek().line;
                match self.peek_next() {
                    Some(next) if next.kind == TokenKind::Assign => {
                        self.advance();
                        self.advance();
                        let value = self.expression()?;
                        Ok(Statement::Assignment { name, value })
                    }
                    Some(next) if next.line == line && starts_expression(&next.kind) => {
                        self.advance();
                        let arguments = self.command_arguments()?;
                        Ok(Statement::Command {
                            name,
                            arguments,
                            line,
                        })
                    }
                    _ => Ok(Statement::Expression(self.expression()?)),
                }
            }
            _ => Ok(Statement::Expression(self.expression()?)),
        }
    }

    fn set_statement(&mut self) -> Result<Statement> {
        self.advance(); // set
        let name = self.consume_identifier("Expected variable name after 'set'")?;
        self.consume(&TokenKind::Assign, "Expected '=' after variable name")?;
        let value = self.expression()?;
        Ok(Statement::Assignment { name, value })
    }

    fn if_statement(&mut self) -> Result<Statement> {
        let opened = self.advance().line;
        let condition = self.expression()?;
        let then_branch = self.block_until(&[TokenKind::Else, TokenKind::End])?;

        let else_branch = if self.match_token(&[TokenKind::Else]) {
            Some(self.block_until(&[TokenKind::End])?)
        } else {
            None
        };

        self.consume(
            &TokenKind::End,
            &format!("Expected 'end' to close 'if' opened on line {}", opened),
        )?;

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn for_statement(&mut self) -> Result<Statement> {
        let opened = self.advance().line;
        let item = self.consume_identifier("Expected loop variable after 'for'")?;

        match &self.peek().kind {
            TokenKind::Identifier(word) if word == "in" => {
                self.advance();
            }
            _ => return Err(self.error("Expected 'in' after loop variable")),
        }

        let list = self.consume_identifier("Expected list name after 'in'")?;
        let body = self.block_until(&[TokenKind::End])?;

        self.consume(
            &TokenKind::End,
            &format!("Expected 'end' to close 'for' opened on line {}", opened),
        )?;

        Ok(Statement::For { item, list, body })
    }

    fn command_statement(&mut self) -> Result<Statement> {
        let token = self.advance();
        let name = token.kind.command_name().unwrap_or_default().to_string();
        let arguments = self.command_arguments()?;
        Ok(Statement::Command {
            name,
            arguments,
            line: token.line,
        })
    }

    /// Arguments run until `;`, end of input, a keyword, or a token that
    /// starts on a later line than the one before it. A comma always
    /// demands another argument.
    fn command_arguments(&mut self) -> Result<Vec<Expression>> {
        let mut arguments = Vec::new();

        while self.starts_argument() {
            arguments.push(self.expression()?);
            while self.match_token(&[TokenKind::Comma]) {
                arguments.push(self.expression()?);
            }
        }

        Ok(arguments)
    }

    fn starts_argument(&self) -> bool {
        let token = self.peek();
        token.line == self.previous().line && starts_expression(&token.kind)
    }

    /// Collect statements up to (not including) one of `terminators`.
    fn block_until(&mut self, terminators: &[TokenKind]) -> Result<Block> {
        let mut statements = Vec::new();

        while !self.is_at_end() && !terminators.iter().any(|t| self.check(t)) {
            if self.match_token(&[TokenKind::Semicolon]) {
                continue;
            }
            statements.push(self.statement()?);
        }

        Ok(Block { statements })
    }

    // Expressions

    pub fn expression(&mut self) -> Result<Expression> {
        self.descend()?;
        let expr = self.precedence(Precedence::Lowest);
        self.ascend();
        expr
    }

    /// Absorb infix operators that bind tighter than `min`; equal
    /// precedence stops, which keeps operators left-associative.
    ///
    /// Every operator in a chain deepens the left spine of the tree, so
    /// each one counts against the nesting limit until the chain ends.
    fn precedence(&mut self, min: Precedence) -> Result<Expression> {
        let mut left = self.primary()?;
        let mut chained = 0;

        while let Some((operator, precedence)) = infix_operator(&self.peek().kind) {
            if precedence <= min {
                break;
            }
            self.advance();
            self.descend()?;
            chained += 1;
            let right = self.precedence(precedence)?;
            left = Expression::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }

        self.depth = self.depth.saturating_sub(chained);
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expression> {
        match &self.peek().kind {
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(Expression::Integer(n))
            }
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expression::String(s))
            }
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(Expression::Variable(name))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(&TokenKind::RightParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => self.list_literal(),
            TokenKind::LeftBrace => self.object_literal(),
            _ => Err(self.error("Expected expression")),
        }
    }

    fn list_literal(&mut self) -> Result<Expression> {
        self.advance(); // [
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RightBracket) {
            elements.push(self.expression()?);
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }

        self.consume(&TokenKind::RightBracket, "Expected ']' after list elements")?;
        Ok(Expression::List(elements))
    }

    fn object_literal(&mut self) -> Result<Expression> {
        self.advance(); // {
        let mut fields = Vec::new();

        while !self.check(&TokenKind::RightBrace) {
            let key = match &self.peek().kind {
                TokenKind::Identifier(key) | TokenKind::String(key) => key.clone(),
                _ => return Err(self.error("Expected object key")),
            };
            self.advance();
            self.consume(&TokenKind::Colon, "Expected ':' after object key")?;
            fields.push((key, self.expression()?));
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }

        self.consume(&TokenKind::RightBrace, "Expected '}' after object fields")?;
        Ok(Expression::Object(fields))
    }
}
