use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::class::LoxClass;
use crate::value::Value;

/// A field slot.  `owner` is the class whose body declared the field, or
/// `None` for fields created ad hoc by assignment.
#[derive(Debug, Clone)]
pub struct Field {
    pub value: Value,
    pub owner: Option<Rc<LoxClass>>,
    pub public: bool,
}

pub struct LoxInstance {
    /// Fixed at construction.
    pub class: Rc<LoxClass>,
    fields: HashMap<String, Field>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Install a declared field, replacing any inherited field of the same
    /// name together with its owner and visibility.
    pub fn define_field(&mut self, name: &str, field: Field) {
        self.fields.insert(name.to_string(), field);
    }

    /// Store `value`, keeping an existing field's owner and visibility.
    /// Unknown names become public, ownerless fields.
    pub fn set_field(&mut self, name: &str, value: Value) {
        match self.fields.get_mut(name) {
            Some(field) => field.value = value,
            None => {
                self.fields.insert(
                    name.to_string(),
                    Field {
                        value,
                        owner: None,
                        public: true,
                    },
                );
            }
        }
    }
}

impl fmt::Debug for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}
