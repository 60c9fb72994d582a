//! Abstract syntax tree produced by the [`Parser`](crate::parser::Parser).
//!
//! Nodes own their tokens.  Function and class declarations sit behind `Rc`
//! because the runtime keeps them alive inside closures and class values
//! after the surrounding statement list has been dropped.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a name‑bearing expression (variable read, assignment, `this`,
/// `super`).  The resolver records scope depths keyed by this id.
///
/// Ids are drawn from a process‑wide counter so expressions parsed from
/// separate REPL lines never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

/// Every kind of *expression* in the language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Prefix operator expression: `not ready` or `-42`.
    Unary { operator: Token, right: Box<Expr> },

    /// Infix operator expression: `a + b`, `x <= y`, `s <> t`.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Parenthesised sub‑expression.
    Grouping(Box<Expr>),

    /// Variable access.
    Variable { id: ExprId, name: Token },

    /// `identifier "=" expression`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Function, method or constructor call.
    Call {
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// object.property
    Get { object: Box<Expr>, name: Token },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// The `this` keyword inside a method.
    This { id: ExprId, keyword: Token },

    /// `super.method`
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
}

/// A named function: top‑level/nested `fun` declarations and class methods.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,

    /// Parameter name tokens (arity ≤ 255).
    pub params: Vec<Token>,

    pub body: Vec<Stmt>,
}

/// `pub? IDENTIFIER ("=" expression)? ";"` inside a class body.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub public: bool,
    pub name: Token,

    /// Absent ⇒ the field starts out as `nil`.
    pub initializer: Option<Expr>,
}

/// `pub? IDENTIFIER "(" parameters? ")" block` inside a class body.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub public: bool,
    pub function: Rc<FunctionDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Token,

    /// Always an [`Expr::Variable`] when present.
    pub superclass: Option<Expr>,

    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
}

/// *Statements* (complete executable constructs).  A program is a sequence of
/// these nodes returned by [`Parser::parse`](crate::parser::Parser::parse).
///
/// There is no `for` node: the parser lowers `for` loops into a block holding
/// the initializer and a `While`.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement used for output.
    Print(Expr),

    /// Variable declaration: `"let" IDENT ("=" initializer)? ";"`.
    Let {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    Function(Rc<FunctionDecl>),

    Return {
        /// The `return` keyword token (for error locations).
        keyword: Token,

        /// Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },

    Class(Rc<ClassDecl>),
}
