use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::{ClassDecl, FieldDecl};
use crate::environment::Environment;
use crate::function::LoxFunction;

/// A method as stored on its declaring class.
#[derive(Debug, Clone)]
pub struct ClassMethod {
    pub function: Rc<LoxFunction>,
    pub public: bool,
}

/// Runtime class value.  Inheritance is an explicit `superclass` link walked
/// by [`LoxClass::find_method`].
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, ClassMethod>,
    declaration: Rc<ClassDecl>,

    /// Scope the methods close over (holds `super` when there is a
    /// superclass).  Field initializers run in a child of it.
    closure: Rc<RefCell<Environment>>,
}

impl LoxClass {
    pub fn new(
        declaration: Rc<ClassDecl>,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, ClassMethod>,
        closure: Rc<RefCell<Environment>>,
    ) -> Self {
        LoxClass {
            name: declaration.name.lexeme.clone(),
            superclass,
            methods,
            declaration,
            closure,
        }
    }

    /// Look `name` up on this class, then on each ancestor in turn.  Returns
    /// the method together with the class that declared it.
    pub fn find_method(self: &Rc<Self>, name: &str) -> Option<(Rc<LoxClass>, ClassMethod)> {
        let mut class: Option<&Rc<LoxClass>> = Some(self);

        while let Some(current) = class {
            if let Some(method) = current.methods.get(name) {
                debug!("Found method '{}' on class '{}'", name, current.name);
                return Some((current.clone(), method.clone()));
            }

            class = current.superclass.as_ref();
        }

        None
    }

    /// Number of arguments a constructor call takes: the arity of the
    /// nearest `init`, or zero.
    pub fn arity(self: &Rc<Self>) -> usize {
        self.find_method("init")
            .map(|(_, init)| init.function.arity())
            .unwrap_or(0)
    }

    /// Field declarations written in this class's own body.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.declaration.fields
    }

    pub fn closure(&self) -> &Rc<RefCell<Environment>> {
        &self.closure
    }

    /// This class and its ancestors, root first.
    pub fn lineage(self: &Rc<Self>) -> Vec<Rc<LoxClass>> {
        let mut chain: Vec<Rc<LoxClass>> = Vec::new();
        let mut class: Option<Rc<LoxClass>> = Some(self.clone());

        while let Some(current) = class {
            class = current.superclass.clone();
            chain.push(current);
        }

        chain.reverse();
        chain
    }
}

impl fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}
