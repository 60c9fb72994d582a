//! Tree‑walking evaluator.
//!
//! Statements execute in `self.environment`; expressions evaluate to a
//! [`Value`].  Name‑bearing expressions are looked up at the depth the
//! resolver recorded through [`Interpreter::note_local`]; anything the
//! resolver did not record is a global.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use crate::ast::{ClassDecl, Expr, ExprId, LiteralValue, Stmt};
use crate::class::{ClassMethod, LoxClass};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::function::LoxFunction;
use crate::instance::{Field, LoxInstance};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Deepest chain of active calls before the program is aborted with
/// "Stack overflow.".
pub const MAX_CALL_DEPTH: usize = 1024;

/// Non‑local exits from statement execution.
#[derive(Error, Debug)]
pub enum InterpretError {
    #[error(transparent)]
    RuntimeError(#[from] LoxError),

    #[error("Return signal with value: {0}")]
    ReturnSignal(Value),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, InterpretError>;

/// Which kind of class member an access targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Member {
    Field,
    Method,
}

fn runtime_error<T>(token: &Token, message: impl Into<String>) -> IResult<T> {
    Err(InterpretError::RuntimeError(LoxError::runtime(
        token.line, message,
    )))
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,

    /// Class whose private members the running code may access.
    class_context: Option<Rc<LoxClass>>,
    call_depth: usize,
    output: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter that prints to standard output.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates an interpreter whose `print` statements write to `output`.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        Self {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            class_context: None,
            call_depth: 0,
            output,
        }
    }

    /// Called by the resolver: the expression `id` refers to a binding
    /// `depth` scopes out from where it is evaluated.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting {:?} at depth {}", id, depth);
        self.locals.insert(id, depth);
    }

    /// Is `name` already bound in the global scope?
    pub fn is_global(&self, name: &str) -> bool {
        self.globals.borrow().contains(name)
    }

    /// Interprets a list of statements (a "program").  Stops at the first
    /// runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), LoxError> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}
                Err(InterpretError::RuntimeError(e)) => {
                    self.unwind();
                    return Err(e);
                }
                // Rejected by the resolver; nothing further to run.
                Err(InterpretError::ReturnSignal(_)) => break,
            }
        }

        self.output.flush()?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Like [`interpret`](Self::interpret), but a lone expression statement
    /// is evaluated and its value handed back for the REPL to show.
    pub fn interpret_line(&mut self, statements: &[Stmt]) -> Result<Option<Value>, LoxError> {
        if let [Stmt::Expression(expr)] = statements {
            return match self.evaluate(expr) {
                Ok(value) => Ok(Some(value)),
                Err(InterpretError::RuntimeError(e)) => {
                    self.unwind();
                    Err(e)
                }
                Err(InterpretError::ReturnSignal(_)) => Ok(None),
            };
        }

        self.interpret(statements).map(|()| None)
    }

    /// Back to top‑level state after an aborted run, so a REPL session can
    /// continue.
    fn unwind(&mut self) {
        self.environment = self.globals.clone();
        self.class_context = None;
        self.call_depth = 0;
        let _ = self.output.flush();
    }

    // ───────────────────────────── statements ─────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                debug!("Printing value: {}", value);
                writeln!(self.output, "{}", value).map_err(LoxError::from)?;
                Ok(())
            }

            Stmt::Let { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(())
            }

            Stmt::Block(statements) => {
                let scope = Environment::child_of(&self.environment);
                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = LoxFunction::new(
                    declaration.clone(),
                    self.environment.clone(),
                    false,
                    self.class_context.clone(),
                );

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Err(InterpretError::ReturnSignal(value))
            }

            Stmt::Class(declaration) => self.declare_class(declaration),
        }
    }

    /// Runs `statements` inside `environment`, restoring the previous scope
    /// however the block exits.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> IResult<()> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));
        self.environment = previous;
        result
    }

    fn declare_class(&mut self, declaration: &Rc<ClassDecl>) -> IResult<()> {
        let name: &Token = &declaration.name;
        debug!("Declaring class '{}'", name.lexeme);

        let superclass: Option<Rc<LoxClass>> = match &declaration.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                other => {
                    let at: &Token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };
                    return runtime_error(
                        at,
                        format!("Superclass must be a class, not {}.", other.type_name()),
                    );
                }
            },
            None => None,
        };

        // Methods close over a scope holding `super` when there is one.
        let closure = match &superclass {
            Some(parent) => {
                let scope = Environment::child_of(&self.environment);
                scope
                    .borrow_mut()
                    .define("super", Value::Class(parent.clone()));
                scope
            }
            None => self.environment.clone(),
        };

        let methods: HashMap<String, ClassMethod> = declaration
            .methods
            .iter()
            .map(|method| {
                let method_name: &str = &method.function.name.lexeme;
                let function = LoxFunction::new(
                    method.function.clone(),
                    closure.clone(),
                    method_name == "init",
                    None,
                );

                (
                    method_name.to_string(),
                    ClassMethod {
                        function: Rc::new(function),
                        public: method.public,
                    },
                )
            })
            .collect();

        let class = LoxClass::new(declaration.clone(), superclass, methods, closure);

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Class(Rc::new(class)));

        info!("Class '{}' defined", name.lexeme);
        Ok(())
    }

    // ───────────────────────────── expressions ────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                let decided = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if decided {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id).copied() {
                    Some(depth) => Environment::assign_at(
                        &self.environment,
                        depth,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => self.globals.borrow_mut().assign(
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                }

                debug!("Assigned {} to '{}'", value, name.lexeme);
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                if !matches!(callee_val, Value::Function(_) | Value::Class(_)) {
                    return runtime_error(
                        paren,
                        format!(
                            "Value of type {} is not callable; only functions and classes can be called.",
                            callee_val.type_name()
                        ),
                    );
                }

                let mut arg_values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.invoke_callable(callee_val, paren, arg_values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => self.get_property(&instance, name),
                other => runtime_error(
                    name,
                    format!(
                        "Only instances have properties; cannot read '{}' of {}.",
                        name.lexeme,
                        other.type_name()
                    ),
                ),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return runtime_error(name, "Only instances have fields.");
                };

                let value = self.evaluate(value)?;
                self.set_property(&instance, name, value.clone())?;
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> IResult<Value> {
        let value = match self.locals.get(&id) {
            Some(&depth) => Environment::get_at(&self.environment, depth, &name.lexeme, name.line)?,
            None => self.globals.borrow().get(&name.lexeme, name.line)?,
        };

        Ok(value)
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> IResult<Value> {
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => runtime_error(
                    operator,
                    format!("Operand must be a number, not {}.", other.type_name()),
                ),
            },
            TokenType::NOT => Ok(Value::Bool(!right_val.is_truthy())),
            _ => runtime_error(operator, "Invalid unary operator."),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> IResult<Value> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left_val == right_val)),
            TokenType::BANG_EQUAL => return Ok(Value::Bool(left_val != right_val)),
            TokenType::CONCAT => return concatenate(operator, &left_val, &right_val),
            _ => {}
        }

        let (a, b) = match (&left_val, &right_val) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ if operator.token_type == TokenType::PLUS => {
                return runtime_error(
                    operator,
                    "Operands must be numbers; use '<>' to concatenate.",
                );
            }
            _ => return runtime_error(operator, "Operands must be numbers."),
        };

        let result = match operator.token_type {
            TokenType::PLUS => Value::Number(a + b),
            TokenType::MINUS => Value::Number(a - b),
            TokenType::STAR => Value::Number(a * b),
            TokenType::SLASH => Value::Number(a / b),
            TokenType::GREATER => Value::Bool(a > b),
            TokenType::GREATER_EQUAL => Value::Bool(a >= b),
            TokenType::LESS => Value::Bool(a < b),
            TokenType::LESS_EQUAL => Value::Bool(a <= b),
            _ => return runtime_error(operator, "Invalid binary operator."),
        };

        Ok(result)
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> IResult<Value> {
        let Some(distance) = self.locals.get(&id).copied() else {
            return runtime_error(keyword, "Can't use 'super' outside of a class.");
        };

        let Value::Class(superclass) =
            Environment::get_at(&self.environment, distance, "super", keyword.line)?
        else {
            return runtime_error(keyword, "'super' is not bound to a class.");
        };

        // `this` always lives in the scope just inside `super`.
        let receiver =
            Environment::get_at(&self.environment, distance.saturating_sub(1), "this", keyword.line)?;
        let Value::Instance(instance) = receiver else {
            return runtime_error(keyword, "'this' is not bound to an instance.");
        };

        let Some((owner, found)) = superclass.find_method(&method.lexeme) else {
            return runtime_error(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            );
        };

        self.check_access(Member::Method, Some(&owner), found.public, method)?;

        Ok(Value::Function(Rc::new(found.function.bind(instance, owner))))
    }

    // ─────────────────────────────── calls ────────────────────────────────

    /// Invokes a callable (function, bound method, or class constructor).
    fn invoke_callable(
        &mut self,
        callee_val: Value,
        paren: &Token,
        arg_values: Vec<Value>,
    ) -> IResult<Value> {
        match callee_val {
            Value::Function(function) => {
                check_arity(function.arity(), arg_values.len(), paren)?;
                self.call_function(&function, arg_values, paren)
            }

            Value::Class(class) => {
                check_arity(class.arity(), arg_values.len(), paren)?;
                self.instantiate(&class, arg_values, paren)
            }

            other => runtime_error(
                paren,
                format!(
                    "Value of type {} is not callable; only functions and classes can be called.",
                    other.type_name()
                ),
            ),
        }
    }

    fn call_function(
        &mut self,
        function: &LoxFunction,
        arg_values: Vec<Value>,
        paren: &Token,
    ) -> IResult<Value> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return runtime_error(paren, "Stack overflow.");
        }

        debug!("Calling function '{}'", function.name());

        let environment = Environment::child_of(function.closure());
        {
            let mut scope = environment.borrow_mut();
            for (param, arg_val) in function.declaration().params.iter().zip(arg_values) {
                scope.define(&param.lexeme, arg_val);
            }
        }

        self.call_depth += 1;
        let previous_context =
            std::mem::replace(&mut self.class_context, function.context().cloned());

        let result = self.execute_block(&function.declaration().body, environment);

        self.class_context = previous_context;
        self.call_depth -= 1;

        match result {
            Ok(()) | Err(InterpretError::ReturnSignal(_)) if function.is_initializer() => {
                Ok(function.receiver().unwrap_or(Value::Nil))
            }
            Ok(()) => Ok(Value::Nil),
            Err(InterpretError::ReturnSignal(value)) => Ok(value),
            Err(InterpretError::RuntimeError(e)) => Err(InterpretError::RuntimeError(
                e.with_frame(format!("[line {}] in {}()", paren.line, function.name())),
            )),
        }
    }

    /// Builds an instance: fields from the root class down, then `init`.
    fn instantiate(
        &mut self,
        class: &Rc<LoxClass>,
        arg_values: Vec<Value>,
        paren: &Token,
    ) -> IResult<Value> {
        debug!("Instantiating class '{}'", class.name);

        // Field defaults may construct further instances, so building one
        // counts as a call frame.
        if self.call_depth >= MAX_CALL_DEPTH {
            return runtime_error(paren, "Stack overflow.");
        }

        let instance = Rc::new(RefCell::new(LoxInstance::new(class.clone())));

        self.call_depth += 1;
        let fields = class
            .lineage()
            .iter()
            .try_for_each(|ancestor| self.initialize_fields(ancestor, &instance));
        self.call_depth -= 1;

        match fields {
            Ok(()) => {}
            Err(InterpretError::RuntimeError(e)) => {
                return Err(InterpretError::RuntimeError(
                    e.with_frame(format!("[line {}] in {}()", paren.line, class.name)),
                ));
            }
            Err(signal) => return Err(signal),
        }

        if let Some((owner, init)) = class.find_method("init") {
            let initializer = init.function.bind(instance.clone(), owner);
            self.call_function(&initializer, arg_values, paren)?;
        }

        Ok(Value::Instance(instance))
    }

    /// Evaluates `class`'s own field defaults with `this` bound to
    /// `instance`, in the class's private context.
    fn initialize_fields(
        &mut self,
        class: &Rc<LoxClass>,
        instance: &Rc<RefCell<LoxInstance>>,
    ) -> IResult<()> {
        if class.fields().is_empty() {
            return Ok(());
        }

        let scope = Environment::child_of(class.closure());
        scope
            .borrow_mut()
            .define("this", Value::Instance(instance.clone()));

        let previous_env = std::mem::replace(&mut self.environment, scope);
        let previous_context = std::mem::replace(&mut self.class_context, Some(class.clone()));

        let result = class.fields().iter().try_for_each(|field| {
            let value = match &field.initializer {
                Some(expr) => self.evaluate(expr)?,
                None => Value::Nil,
            };

            instance.borrow_mut().define_field(
                &field.name.lexeme,
                Field {
                    value,
                    owner: Some(class.clone()),
                    public: field.public,
                },
            );

            Ok::<(), InterpretError>(())
        });

        self.environment = previous_env;
        self.class_context = previous_context;
        result
    }

    // ───────────────────────────── properties ─────────────────────────────

    /// Field first, then methods up the inheritance chain.
    fn get_property(&self, instance: &Rc<RefCell<LoxInstance>>, name: &Token) -> IResult<Value> {
        let field: Option<Field> = instance.borrow().field(&name.lexeme).cloned();

        if let Some(field) = field {
            self.check_access(Member::Field, field.owner.as_ref(), field.public, name)?;
            return Ok(field.value);
        }

        let class: Rc<LoxClass> = instance.borrow().class.clone();

        if let Some((owner, method)) = class.find_method(&name.lexeme) {
            self.check_access(Member::Method, Some(&owner), method.public, name)?;
            let bound = method.function.bind(instance.clone(), owner);
            return Ok(Value::Function(Rc::new(bound)));
        }

        runtime_error(name, format!("Undefined property '{}'.", name.lexeme))
    }

    fn set_property(
        &self,
        instance: &Rc<RefCell<LoxInstance>>,
        name: &Token,
        value: Value,
    ) -> IResult<()> {
        let existing: Option<Field> = instance.borrow().field(&name.lexeme).cloned();

        if let Some(field) = existing {
            self.check_access(Member::Field, field.owner.as_ref(), field.public, name)?;
        }

        instance.borrow_mut().set_field(&name.lexeme, value);
        Ok(())
    }

    /// A private field is reachable only from code running in the context
    /// of the class that declared it.  A private method is also refused to
    /// the methods of any other class, but code outside every class (top
    /// level and free functions) may still call it.
    fn check_access(
        &self,
        member: Member,
        owner: Option<&Rc<LoxClass>>,
        public: bool,
        name: &Token,
    ) -> IResult<()> {
        if public {
            return Ok(());
        }

        let allowed = match (owner, &self.class_context) {
            (Some(owner), Some(context)) => Rc::ptr_eq(owner, context),
            (_, None) => member == Member::Method,
            (None, Some(_)) => false,
        };

        if allowed {
            Ok(())
        } else {
            let class_name: &str = owner.map(|class| class.name.as_str()).unwrap_or("?");
            runtime_error(
                name,
                format!("'{}' is private to class '{}'.", name.lexeme, class_name),
            )
        }
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> IResult<()> {
    if expected != got {
        return runtime_error(
            paren,
            format!("Expected {} arguments but got {}.", expected, got),
        );
    }

    Ok(())
}

/// `<>`: strings and numbers, each in canonical print form.
fn concatenate(operator: &Token, left: &Value, right: &Value) -> IResult<Value> {
    match (left, right) {
        (Value::String(_) | Value::Number(_), Value::String(_) | Value::Number(_)) => {
            Ok(Value::String(format!("{}{}", left, right)))
        }
        _ => runtime_error(operator, "Operands of '<>' must be strings or numbers."),
    }
}
