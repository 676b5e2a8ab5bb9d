use crate::callable::Receiver;
use crate::class::{check_assignable, store_field, undefined_property, Class, Member};
use crate::config::FieldPolicy;
use crate::interpreter::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub struct Instance {
    data: Rc<RefCell<InstanceImpl>>,
}

struct InstanceImpl {
    class: Class,
    fields: BTreeMap<String, Value>,
}

impl Instance {
    pub fn new(class: Class) -> Instance {
        Instance {
            data: Rc::new(RefCell::new(InstanceImpl {
                class,
                fields: BTreeMap::new(),
            })),
        }
    }
    pub fn class(&self) -> Class {
        self.data.borrow().class.clone()
    }
    /// Fields shadow methods; methods come back bound to this instance.
    pub fn get(&self, name: &Token) -> Result<Member, RuntimeError> {
        if let Some(value) = self.data.borrow().fields.get(&name.lexeme) {
            return Ok(Member::Field(value.clone()));
        }
        self.class()
            .find_method(&name.lexeme)
            .map(|method| Member::Method(method.bind(Receiver::Instance(self.clone()))))
            .ok_or_else(|| undefined_property(name))
    }
    pub fn set(&self, name: &Token, value: Value, policy: FieldPolicy) -> Result<(), RuntimeError> {
        check_assignable(&self.class(), name)?;
        store_field(&mut self.data.borrow_mut().fields, name, value, policy)
    }
    pub fn equals(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.data.borrow().class)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.data.borrow().class)
    }
}

#[cfg(test)]
mod instance_tests {
    use super::Instance;
    use crate::class::{Class, Member};
    use crate::config::FieldPolicy;
    use crate::token::{Token, TokenType};
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenType::Identifier(lexeme.to_string()), lexeme, 1, 1)
    }

    #[test]
    fn fields_are_per_instance() {
        let class = Class::new("Point", None, BTreeMap::new());
        let a = Instance::new(class.clone());
        let b = Instance::new(class);
        a.set(&name("x"), Value::Number(1.0), FieldPolicy::Create)
            .unwrap();
        assert!(matches!(a.get(&name("x")), Ok(Member::Field(Value::Number(_)))));
        assert!(b.get(&name("x")).is_err());
        assert!(!a.equals(&b));
        assert_eq!(a.to_string(), "Point instance");
    }

    #[test]
    fn update_only_allows_existing_fields() {
        let instance = Instance::new(Class::new("Point", None, BTreeMap::new()));
        instance
            .set(&name("x"), Value::Number(1.0), FieldPolicy::Create)
            .unwrap();
        assert!(instance
            .set(&name("x"), Value::Number(2.0), FieldPolicy::UpdateOnly)
            .is_ok());
        assert!(instance
            .set(&name("y"), Value::Number(2.0), FieldPolicy::UpdateOnly)
            .is_err());
    }
}
