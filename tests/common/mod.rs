#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use lox_interpreter::error::LoxError;
use lox_interpreter::interpreter::Interpreter;
use lox_interpreter::runner::{self, RunError};

/// In‑memory sink that stays readable after the interpreter owning a clone
/// of it has written to it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An interpreter printing into a fresh buffer.
pub fn capturing_interpreter() -> (Interpreter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let interpreter = Interpreter::with_output(Box::new(buffer.clone()));
    (interpreter, buffer)
}

/// Runs `source` and returns everything it printed along with the outcome.
pub fn run_capture(source: &str) -> (String, Result<(), RunError>) {
    let (mut interpreter, buffer) = capturing_interpreter();
    let result = runner::run(source, &mut interpreter);
    (buffer.contents(), result)
}

/// Runs a program that must succeed and returns its output.
pub fn run_ok(source: &str) -> String {
    let (output, result) = run_capture(source);
    if let Err(e) = result {
        panic!("program failed: {:?}\noutput so far:\n{}", e, output);
    }
    output
}

/// Runs a program that must fail at runtime; returns output and the error.
pub fn run_runtime_error(source: &str) -> (String, LoxError) {
    match run_capture(source) {
        (output, Err(RunError::Runtime(e))) => (output, e),
        (output, other) => panic!("expected a runtime error, got {:?}\n{}", other, output),
    }
}

/// Runs a program that must be rejected before execution.
pub fn static_errors(source: &str) -> Vec<String> {
    match run_capture(source) {
        (output, Err(RunError::Static(errors))) => {
            assert_eq!(output, "", "nothing may run after a static error");
            errors.iter().map(|e| e.to_string()).collect()
        }
        (output, other) => panic!("expected static errors, got {:?}\n{}", other, output),
    }
}
