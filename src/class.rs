use crate::ast::INITIALIZER;
use crate::callable::{Callable, LoxFunction, Receiver};
use crate::config::FieldPolicy;
use crate::instance::Instance;
use crate::interpreter::{Interpreter, RuntimeError};
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Result of looking a property up on an instance or class, before getters run.
#[derive(Debug)]
pub enum Member {
    Field(Value),
    Method(LoxFunction),
}

/// A class is also an object: it carries its own static fields and is the
/// receiver of its static methods.
#[derive(Clone)]
pub struct Class {
    data: Rc<RefCell<ClassImpl>>,
}

struct ClassImpl {
    name: String,
    superclass: Option<Class>,
    methods: BTreeMap<String, LoxFunction>,
    fields: BTreeMap<String, Value>,
}

impl Class {
    pub fn new(
        name: &str,
        superclass: Option<Class>,
        methods: BTreeMap<String, LoxFunction>,
    ) -> Class {
        Class {
            data: Rc::new(RefCell::new(ClassImpl {
                name: name.to_string(),
                superclass,
                methods,
                fields: BTreeMap::new(),
            })),
        }
    }
    pub fn superclass(&self) -> Option<Class> {
        self.data.borrow().superclass.clone()
    }
    /// Declared directly on this class, ignoring ancestors.
    pub fn own_method(&self, name: &str) -> Option<LoxFunction> {
        self.data.borrow().methods.get(name).cloned()
    }
    pub fn find_method(&self, name: &str) -> Option<LoxFunction> {
        let data = self.data.borrow();
        match data.methods.get(name) {
            Some(method) => Some(method.clone()),
            None => match &data.superclass {
                Some(superclass) => superclass.find_method(name),
                None => None,
            },
        }
    }
    pub fn get(&self, name: &Token) -> Result<Member, RuntimeError> {
        if let Some(value) = self.data.borrow().fields.get(&name.lexeme) {
            return Ok(Member::Field(value.clone()));
        }
        self.find_method(&name.lexeme)
            .map(|method| Member::Method(method.bind(Receiver::Class(self.clone()))))
            .ok_or_else(|| undefined_property(name))
    }
    pub fn set(&self, name: &Token, value: Value, policy: FieldPolicy) -> Result<(), RuntimeError> {
        check_assignable(self, name)?;
        store_field(&mut self.data.borrow_mut().fields, name, value, policy)
    }
    /// Builds a fresh instance and runs the initializer chain on it.
    pub fn instantiate(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Value],
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        let instance = Instance::new(self.clone());
        let initialized = self.initialize(interpreter, &instance, arguments, paren)?;
        if !initialized && !arguments.is_empty() {
            return Err(RuntimeError::new(
                paren,
                format!("Expected 0 arguments but got {}.", arguments.len()),
            ));
        }
        Ok(Value::Instance(instance))
    }
    // Ancestors initialize first with the same arguments, unless this class's
    // initializer opens with its own `super.init(...)` call.
    pub(crate) fn initialize(
        &self,
        interpreter: &mut Interpreter,
        instance: &Instance,
        arguments: &[Value],
        paren: &Token,
    ) -> Result<bool, RuntimeError> {
        let initializer = self.own_method(INITIALIZER);
        let explicit_super = initializer
            .as_ref()
            .map_or(false, |init| init.declaration().leading_super_init().is_some());
        let mut initialized = false;
        if !explicit_super {
            if let Some(superclass) = self.superclass() {
                initialized = superclass.initialize(interpreter, instance, arguments, paren)?;
            }
        }
        if let Some(init) = initializer {
            let bound = init.bind(Receiver::Instance(instance.clone()));
            Callable::Function(bound).call(interpreter, arguments, paren)?;
            initialized = true;
        }
        Ok(initialized)
    }
    pub fn equals(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data.borrow().name)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.data.borrow().name)
    }
}

pub(crate) fn undefined_property(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined property '{}'.", name.lexeme))
}

/// Getters have no setter counterpart, so a getter name can't be a field too.
pub(crate) fn check_assignable(class: &Class, name: &Token) -> Result<(), RuntimeError> {
    match class.find_method(&name.lexeme) {
        Some(method) if method.kind().is_getter() => Err(RuntimeError::new(
            name,
            format!("Cannot assign to getter '{}'.", name.lexeme),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn store_field(
    fields: &mut BTreeMap<String, Value>,
    name: &Token,
    value: Value,
    policy: FieldPolicy,
) -> Result<(), RuntimeError> {
    if policy == FieldPolicy::UpdateOnly && !fields.contains_key(&name.lexeme) {
        return Err(RuntimeError::new(
            name,
            format!("Undefined property '{}' assigned to.", name.lexeme),
        ));
    }
    fields.insert(name.lexeme.clone(), value);
    Ok(())
}
