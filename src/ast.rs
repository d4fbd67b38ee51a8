//! Abstract Syntax Tree definitions for the script language
//!
//! A parsed script is one top-level `Block`. Trees are built per execution
//! and dropped when it finishes; nothing is cached.

use serde::Serialize;
use std::fmt;

/// Statement list: a whole script, an `if` branch or a loop body
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Block {
    pub statements: Vec<Statement>,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    /// `set name = expr` or `name = expr`
    Assignment { name: String, value: Expression },

    /// `if cond ... [else ...] end`
    If {
        condition: Expression,
        then_branch: Block,
        else_branch: Option<Block>,
    },

    /// `render`, `redirect`, `save_session`, `add_cookie`, or an unknown
    /// identifier used in command position
    Command {
        name: String,
        arguments: Vec<Expression>,
        line: usize,
    },

    /// `for item in list ... end`
    For {
        item: String,
        list: String,
        body: Block,
    },

    /// Expression evaluated for its value
    Expression(Expression),
}

/// Expression nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    /// Integer literal
    Integer(i64),

    /// String literal
    String(String),

    /// Variable reference, possibly dotted (`form.name`)
    Variable(String),

    /// Binary operation
    Binary {
        left: Box<Expression>,
        operator: BinaryOp,
        right: Box<Expression>,
    },

    /// `[a, b, c]`
    List(Vec<Expression>),

    /// `{key: value, ...}` in source order
    Object(Vec<(String, Expression)>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
        };
        f.write_str(symbol)
    }
}
