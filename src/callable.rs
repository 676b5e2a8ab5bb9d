use crate::ast::FunctionDecl;
use crate::class::Class;
use crate::environment::Environment;
use crate::instance::Instance;
use crate::interpreter::{Completion, Interpreter, RuntimeError};
use crate::token::Token;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;
use strum_macros::Display;
use tracing::trace;

/// Role a user function plays, fixed when it is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FunctionKind {
    #[strum(serialize = "function")]
    Function,
    #[strum(serialize = "initializer")]
    Initializer,
    #[strum(serialize = "static method")]
    StaticMethod,
    #[strum(serialize = "static getter")]
    StaticGetter,
    #[strum(serialize = "instance method")]
    Method,
    #[strum(serialize = "instance getter")]
    Getter,
}

impl FunctionKind {
    pub fn for_member(declaration: &FunctionDecl) -> FunctionKind {
        if declaration.is_initializer() && !declaration.is_static {
            return FunctionKind::Initializer;
        }
        match (declaration.is_static, declaration.is_getter) {
            (true, true) => FunctionKind::StaticGetter,
            (true, false) => FunctionKind::StaticMethod,
            (false, true) => FunctionKind::Getter,
            (false, false) => FunctionKind::Method,
        }
    }
    pub fn is_static(self) -> bool {
        matches!(self, FunctionKind::StaticMethod | FunctionKind::StaticGetter)
    }
    pub fn is_getter(self) -> bool {
        matches!(self, FunctionKind::StaticGetter | FunctionKind::Getter)
    }
}

/// What `this` is bound to in a method.
#[derive(Debug, Clone)]
pub enum Receiver {
    Instance(Instance),
    Class(Class),
}

impl Receiver {
    pub fn value(&self) -> Value {
        match self {
            Receiver::Instance(x) => Value::Instance(x.clone()),
            Receiver::Class(x) => Value::Class(x.clone()),
        }
    }
}

#[derive(Clone)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Environment,
    kind: FunctionKind,
    receiver: Option<Receiver>,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Environment, kind: FunctionKind) -> LoxFunction {
        LoxFunction {
            declaration,
            closure,
            kind,
            receiver: None,
        }
    }
    pub fn bind(&self, receiver: Receiver) -> LoxFunction {
        let closure = self.closure.new_child();
        closure.define("this", true, receiver.value());
        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure,
            kind: self.kind,
            receiver: Some(receiver),
        }
    }
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Value],
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        self.check_receiver(paren)?;
        trace!(function = %self.name(), kind = %self.kind, "call");
        let environment = self.closure.new_child();
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, true, argument.clone());
        }
        let completion = interpreter.execute_block(&self.declaration.body, environment)?;
        if self.kind == FunctionKind::Initializer {
            return Ok(self
                .receiver
                .as_ref()
                .map_or(Value::Nil, Receiver::value));
        }
        match completion {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
    // Static members answer only to the class, everything else only to instances.
    fn check_receiver(&self, paren: &Token) -> Result<(), RuntimeError> {
        let misplaced = match (&self.receiver, self.kind.is_static()) {
            (Some(Receiver::Instance(_)), true) => Some("an instance"),
            (Some(Receiver::Class(_)), false) => Some("the class itself"),
            _ => None,
        };
        match misplaced {
            Some(through) => Err(RuntimeError::new(
                paren,
                format!("Cannot call {} '{}' through {}.", self.kind, self.name(), through),
            )),
            None => Ok(()),
        }
    }
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }
    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }
    pub fn declaration(&self) -> &FunctionDecl {
        &self.declaration
    }
    pub fn equals(&self, other: &LoxFunction) -> bool {
        Rc::ptr_eq(&self.declaration, &other.declaration) && self.closure.ptr_eq(&other.closure)
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoxFunction({}, {})", self.name(), self.kind)
    }
}

pub type NativeFn = fn(&mut Interpreter, &[Value], &Token) -> Result<Value, RuntimeError>;

#[derive(Clone, Copy)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub call: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

#[derive(Clone, Debug)]
pub enum Callable {
    Function(LoxFunction),
    Native(NativeFunction),
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(x) => x.arity(),
            Callable::Native(x) => x.arity,
        }
    }
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Value],
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        if arguments.len() != self.arity() {
            return Err(RuntimeError::new(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    self.arity(),
                    arguments.len()
                ),
            ));
        }
        match self {
            Callable::Function(x) => x.call(interpreter, arguments, paren),
            Callable::Native(x) => (x.call)(interpreter, arguments, paren),
        }
    }
    pub fn equals(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => a.equals(b),
            (Callable::Native(a), Callable::Native(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Function(x) => write!(f, "{}", x),
            Callable::Native(x) => write!(f, "{}", x),
        }
    }
}
