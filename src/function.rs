use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::class::LoxClass;
use crate::environment::Environment;
use crate::instance::LoxInstance;
use crate::value::Value;

/// A user‑defined function or method together with the scope it closes over.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,

    /// Class whose private members the body may touch.  For a bound method
    /// this is the class that *declared* the method; for a plain function it
    /// is whatever class context was active where it was declared.
    context: Option<Rc<LoxClass>>,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
        context: Option<Rc<LoxClass>>,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn declaration(&self) -> &FunctionDecl {
        &self.declaration
    }

    pub fn closure(&self) -> &Rc<RefCell<Environment>> {
        &self.closure
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    pub fn context(&self) -> Option<&Rc<LoxClass>> {
        self.context.as_ref()
    }

    /// Produce a bound method: a copy whose closure gains a scope with `this`
    /// set to `instance`.  `declaring_class` is the class the method was found
    /// on, which is also where `super` inside it starts looking.
    pub fn bind(
        &self,
        instance: Rc<RefCell<LoxInstance>>,
        declaring_class: Rc<LoxClass>,
    ) -> LoxFunction {
        let environment = Environment::child_of(&self.closure);
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        LoxFunction {
            declaration: self.declaration.clone(),
            closure: environment,
            is_initializer: self.is_initializer,
            context: Some(declaring_class),
        }
    }

    /// The bound receiver, if this function came from a property access.
    pub fn receiver(&self) -> Option<Value> {
        let scope = self.closure.borrow();

        if scope.contains("this") {
            scope.get("this", self.declaration.name.line).ok()
        } else {
            None
        }
    }
}

impl fmt::Debug for LoxFunction {
    // Closures can reach themselves through their environment; print the
    // name only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}
