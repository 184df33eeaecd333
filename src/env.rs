// ABOUTME: Immutable linked environment used by the direct (native-recursion) interpreter

use crate::error::ProgramError;
use crate::value::Value;
use std::rc::Rc;

/// An association chain binding names to values, either empty or one frame
/// deep plus a shared parent. Cloning an `Env` is O(1): it only bumps an `Rc`.
#[derive(Debug, Clone)]
pub enum Env {
    Empty,
    Extended(Rc<Frame>),
}

#[derive(Debug)]
pub struct Frame {
    name: Rc<str>,
    value: Value,
    parent: Env,
}

impl Env {
    pub fn empty() -> Env {
        Env::Empty
    }

    /// Binds `name` to `value` in a new scope whose parent is `self`.
    pub fn extend(&self, name: Rc<str>, value: Value) -> Env {
        Env::Extended(Rc::new(Frame {
            name,
            value,
            parent: self.clone(),
        }))
    }

    /// Walks the chain for the most recently bound occurrence of `name`.
    pub fn lookup(&self, name: &str) -> Result<Value, ProgramError> {
        match self {
            Env::Empty => Err(ProgramError::FreeVariable(name.to_string())),
            Env::Extended(frame) => {
                if &*frame.name == name {
                    Ok(frame.value.clone())
                } else {
                    frame.parent.lookup(name)
                }
            }
        }
    }

    /// Structural equality, position-by-position down the chain.
    pub fn equals(&self, other: &Env) -> bool {
        match (self, other) {
            (Env::Empty, Env::Empty) => true,
            (Env::Extended(a), Env::Extended(b)) => {
                a.name == b.name && a.value.equals(&b.value) && a.parent.equals(&b.parent)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_free_variable_fails() {
        let env = Env::empty();
        assert!(matches!(
            env.lookup("x"),
            Err(ProgramError::FreeVariable(ref n)) if n == "x"
        ));
    }

    #[test]
    fn shadowing_prefers_innermost_binding() {
        let env = Env::empty()
            .extend(Rc::from("x"), Value::Num(1))
            .extend(Rc::from("x"), Value::Num(2));
        assert!(env.lookup("x").unwrap().equals(&Value::Num(2)));
    }

    #[test]
    fn parent_lookup_walks_the_chain() {
        let env = Env::empty()
            .extend(Rc::from("a"), Value::Num(1))
            .extend(Rc::from("b"), Value::Num(2));
        assert!(env.lookup("a").unwrap().equals(&Value::Num(1)));
        assert!(env.lookup("b").unwrap().equals(&Value::Num(2)));
    }

    #[test]
    fn equals_compares_chains_position_by_position() {
        let a = Env::empty().extend(Rc::from("x"), Value::Num(1));
        let b = Env::empty().extend(Rc::from("x"), Value::Num(1));
        let c = Env::empty().extend(Rc::from("x"), Value::Num(2));
        assert!(a.equals(&b));
        assert!(!a.equals(&c));
        assert!(!a.equals(&Env::empty()));
    }
}
