//! Whole‑pipeline driver: source text → tokens → AST → resolution →
//! execution.  Shared by the file runner, the REPL and the tests.

use log::{debug, info};
use thiserror::Error;

use crate::ast::Stmt;
use crate::error::{self, LoxError};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::tokenize;
use crate::value::Value;

/// Exit status for lexical, syntax or resolution errors.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Exit status for runtime errors.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Exit status when the script cannot be read.
pub const EXIT_IO_ERROR: i32 = 74;

/// Why a run did not complete.
#[derive(Debug, Error)]
pub enum RunError {
    /// The program was rejected before anything executed.
    #[error("{} static error(s)", .0.len())]
    Static(Vec<LoxError>),

    /// Execution stopped at a runtime error.
    #[error(transparent)]
    Runtime(LoxError),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Static(_) => EXIT_STATIC_ERROR,
            RunError::Runtime(_) => EXIT_RUNTIME_ERROR,
        }
    }
}

/// Turn raw script bytes into source text.
pub fn decode_source(bytes: Vec<u8>) -> error::Result<String> {
    let source = String::from_utf8(bytes)?;
    debug!("Decoded {} bytes of source", source.len());
    Ok(source)
}

/// Lex, parse and resolve `source`.  Lexical and syntax errors are reported
/// together; resolution only runs on a syntactically clean program.
pub fn compile(source: &str, interpreter: &mut Interpreter) -> Result<Vec<Stmt>, RunError> {
    let (tokens, mut errors) = tokenize(source);

    let statements = match Parser::new(&tokens).parse() {
        Ok(statements) => statements,
        Err(parse_errors) => {
            errors.extend(parse_errors);
            return Err(RunError::Static(errors));
        }
    };

    if !errors.is_empty() {
        return Err(RunError::Static(errors));
    }

    Resolver::new(interpreter)
        .resolve(&statements)
        .map_err(RunError::Static)?;

    debug!("Compiled {} statement(s)", statements.len());
    Ok(statements)
}

/// Run a complete program.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<(), RunError> {
    info!("Running program of {} bytes", source.len());

    let statements = compile(source, interpreter)?;
    interpreter.interpret(&statements).map_err(RunError::Runtime)
}

/// Run one REPL entry.  A lone expression statement yields its value.
pub fn run_line(source: &str, interpreter: &mut Interpreter) -> Result<Option<Value>, RunError> {
    let statements = compile(source, interpreter)?;
    interpreter
        .interpret_line(&statements)
        .map_err(RunError::Runtime)
}
