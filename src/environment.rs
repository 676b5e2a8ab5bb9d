use crate::interpreter::RuntimeError;
use crate::shared_list::SharedList;
use crate::token::Token;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone)]
struct Slot {
    initialized: bool,
    value: Value,
}

type Frame = BTreeMap<String, Slot>;

/// A handle on a chain of scope frames, innermost first. Clones share frames,
/// so every closure holding a frame observes writes made through any other.
#[derive(Clone)]
pub struct Environment {
    frames: SharedList<Frame>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            frames: SharedList::new().prepend(Frame::new()),
        }
    }
    pub fn new_child(&self) -> Environment {
        Environment {
            frames: self.frames.prepend(Frame::new()),
        }
    }
    pub fn define(&self, name: &str, initialized: bool, value: Value) {
        if let Some(mut frame) = self.frames.peek_mut() {
            frame.insert(name.to_string(), Slot { initialized, value });
        }
    }
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        self.frames
            .find_map(|frame| frame.get(&name.lexeme).map(|slot| read(slot, name)))
            .unwrap_or_else(|| Err(undefined(name)))
    }
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut pending = Some(value);
        self.frames
            .find_map(|frame| {
                let slot = frame.get_mut(&name.lexeme)?;
                if let Some(value) = pending.take() {
                    slot.value = value;
                }
                slot.initialized = true;
                Some(())
            })
            .ok_or_else(|| undefined(name))
    }
    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Value, RuntimeError> {
        let scope = self.ancestor(distance, name)?;
        let frame = scope.peek().ok_or_else(|| undefined(name))?;
        let slot = frame.get(&name.lexeme).ok_or_else(|| undefined(name))?;
        read(slot, name)
    }
    pub fn assign_at(&self, distance: usize, name: &Token, value: Value) -> Result<(), RuntimeError> {
        let scope = self.ancestor(distance, name)?;
        let mut frame = scope.peek_mut().ok_or_else(|| undefined(name))?;
        let slot = frame.get_mut(&name.lexeme).ok_or_else(|| undefined(name))?;
        slot.value = value;
        slot.initialized = true;
        Ok(())
    }
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        self.frames.equals(&other.frames)
    }
    fn ancestor(&self, distance: usize, name: &Token) -> Result<SharedList<Frame>, RuntimeError> {
        self.frames
            .nth_tail(distance)
            .ok_or_else(|| undefined(name))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment(depth {})", self.depth())
    }
}

fn read(slot: &Slot, name: &Token) -> Result<Value, RuntimeError> {
    if slot.initialized {
        Ok(slot.value.clone())
    } else {
        Err(RuntimeError::new(
            name,
            format!("Accessing uninitialized variable '{}'.", name.lexeme),
        ))
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod environment_tests {
    use super::Environment;
    use crate::token::{Token, TokenType};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenType::Identifier(lexeme.to_string()), lexeme, 1, 1)
    }

    fn number(env: &Environment, lexeme: &str) -> f64 {
        match env.get(&name(lexeme)) {
            Ok(Value::Number(x)) => x,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn define_then_get() {
        let env = Environment::new();
        env.define("a", true, Value::Number(1.0));
        assert_eq!(number(&env, "a"), 1.0);
    }

    #[test]
    fn undefined_and_uninitialized_are_distinct() {
        let env = Environment::new();
        env.define("a", false, Value::Nil);
        let uninitialized = env.get(&name("a")).unwrap_err();
        assert_eq!(uninitialized.message, "Accessing uninitialized variable 'a'.");
        let undefined = env.get(&name("b")).unwrap_err();
        assert_eq!(undefined.message, "Undefined variable 'b'.");
    }

    #[test]
    fn assign_initializes() {
        let env = Environment::new();
        env.define("a", false, Value::Nil);
        env.assign(&name("a"), Value::Number(2.0)).unwrap();
        assert_eq!(number(&env, "a"), 2.0);
        assert!(env.assign(&name("missing"), Value::Nil).is_err());
    }

    #[test]
    fn children_share_parent_frames() {
        let global = Environment::new();
        global.define("count", true, Value::Number(0.0));
        let left = global.new_child();
        let right = global.new_child();
        left.assign(&name("count"), Value::Number(5.0)).unwrap();
        assert_eq!(number(&right, "count"), 5.0);
        assert_eq!(left.depth(), 2);
    }

    #[test]
    fn shadowing_resolves_innermost() {
        let global = Environment::new();
        global.define("a", true, Value::Number(1.0));
        let inner = global.new_child();
        inner.define("a", true, Value::Number(2.0));
        assert_eq!(number(&inner, "a"), 2.0);
        assert_eq!(number(&global, "a"), 1.0);
    }

    #[test]
    fn distance_indexed_access() {
        let global = Environment::new();
        global.define("a", true, Value::Number(1.0));
        let inner = global.new_child().new_child();
        inner.assign_at(2, &name("a"), Value::Number(9.0)).unwrap();
        match inner.get_at(2, &name("a")) {
            Ok(Value::Number(x)) => assert_eq!(x, 9.0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(inner.get_at(0, &name("a")).is_err());
        assert!(inner.get_at(5, &name("a")).is_err());
    }
}
