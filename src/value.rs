// ABOUTME: Runtime values produced by the direct (native-recursion) interpreter

use crate::env::Env;
use crate::error::ProgramError;
use crate::expr::Expr;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Num(i32),
    Bool(bool),
    Fun {
        formal: Rc<str>,
        body: Rc<Expr>,
        env: Env,
    },
}

impl Value {
    /// Structurally equal iff same variant and equal payloads; closures
    /// compare by formal name, body structure, and captured-environment structure.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (
                Value::Fun {
                    formal: f1,
                    body: b1,
                    env: e1,
                },
                Value::Fun {
                    formal: f2,
                    body: b2,
                    env: e2,
                },
            ) => f1 == f2 && b1.equals(b2) && e1.equals(e2),
            _ => false,
        }
    }

    pub fn add_to(&self, other: &Value) -> Result<Value, ProgramError> {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a.wrapping_add(*b))),
            (Value::Num(_), other) => Err(ProgramError::NotANumber(other.to_string())),
            (other, _) => Err(ProgramError::NotANumber(other.to_string())),
        }
    }

    pub fn mult_with(&self, other: &Value) -> Result<Value, ProgramError> {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => Ok(Value::Num(a.wrapping_mul(*b))),
            (Value::Num(_), other) => Err(ProgramError::NotANumber(other.to_string())),
            (other, _) => Err(ProgramError::NotANumber(other.to_string())),
        }
    }

    pub fn is_true(&self) -> Result<bool, ProgramError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ProgramError::NotABoolean(other.to_string())),
        }
    }

    /// Extends the closure's captured environment with `formal -> arg` and
    /// interprets the body there.
    pub fn call(&self, arg: Value) -> Result<Value, ProgramError> {
        match self {
            Value::Fun { formal, body, env } => {
                let call_env = env.extend(formal.clone(), arg);
                body.interp(&call_env)
            }
            other => Err(ProgramError::NotAFunction(other.to_string())),
        }
    }

    /// Embeds a value back into an expression, for inlining constants during
    /// optimization. Closures never arise from a variable-free subtree, so
    /// the optimizer never calls this on a `Fun` value, but the conversion is
    /// total regardless.
    pub fn to_expr(&self) -> Rc<Expr> {
        match self {
            Value::Num(n) => Rc::new(Expr::Num(*n)),
            Value::Bool(b) => Rc::new(Expr::Bool(*b)),
            Value::Fun { formal, body, .. } => Rc::new(Expr::Fun(formal.clone(), body.clone())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{}", if *b { "_true" } else { "_false" }),
            Value::Fun { .. } => write!(f, "[FUNCTION]"),
        }
    }
}
