// ABOUTME: Heap-backed value operations used by the CEK stepping machine, plus
// ABOUTME: reification of a heap value into a plain `Value` at the end of a run.

use crate::env::Env;
use crate::error::ProgramError;
use crate::heap::{Heap, HeapObj, ValRef};
use crate::value::Value;

pub fn equals(heap: &Heap, a: ValRef, b: ValRef) -> bool {
    match (heap.val(a), heap.val(b)) {
        (HeapObj::ValNum(x), HeapObj::ValNum(y)) => x == y,
        (HeapObj::ValBool(x), HeapObj::ValBool(y)) => x == y,
        (
            HeapObj::ValFun {
                formal: f1,
                body: b1,
                captured_env: e1,
            },
            HeapObj::ValFun {
                formal: f2,
                body: b2,
                captured_env: e2,
            },
        ) => f1 == f2 && b1.equals(b2) && crate::gc_env::equals(heap, *e1, *e2),
        _ => false,
    }
}

pub fn add_to(heap: &Heap, a: ValRef, b: ValRef) -> Result<Value, ProgramError> {
    match (heap.val(a), heap.val(b)) {
        (HeapObj::ValNum(x), HeapObj::ValNum(y)) => Ok(Value::Num(x.wrapping_add(*y))),
        (HeapObj::ValNum(_), other) => Err(ProgramError::NotANumber(reify(heap, other).to_string())),
        (other, _) => Err(ProgramError::NotANumber(reify(heap, other).to_string())),
    }
}

pub fn mult_with(heap: &Heap, a: ValRef, b: ValRef) -> Result<Value, ProgramError> {
    match (heap.val(a), heap.val(b)) {
        (HeapObj::ValNum(x), HeapObj::ValNum(y)) => Ok(Value::Num(x.wrapping_mul(*y))),
        (HeapObj::ValNum(_), other) => Err(ProgramError::NotANumber(reify(heap, other).to_string())),
        (other, _) => Err(ProgramError::NotANumber(reify(heap, other).to_string())),
    }
}

pub fn is_true(heap: &Heap, v: ValRef) -> Result<bool, ProgramError> {
    match heap.val(v) {
        HeapObj::ValBool(b) => Ok(*b),
        other => Err(ProgramError::NotABoolean(reify(heap, other).to_string())),
    }
}

/// Converts a heap-resident value (and, for a closure, its captured
/// environment chain) into the plain `Rc`-based `Value`/`Env` representation,
/// for returning a final result out of the stepping machine.
pub fn reify(heap: &Heap, obj: &HeapObj) -> Value {
    match obj {
        HeapObj::ValNum(n) => Value::Num(*n),
        HeapObj::ValBool(b) => Value::Bool(*b),
        HeapObj::ValFun {
            formal,
            body,
            captured_env,
        } => Value::Fun {
            formal: formal.clone(),
            body: body.clone(),
            env: reify_env(heap, *captured_env),
        },
        other => unreachable!("ValRef pointed at a non-value object: {other:?}"),
    }
}

pub fn reify_ref(heap: &Heap, v: ValRef) -> Value {
    reify(heap, heap.val(v))
}

fn reify_env(heap: &Heap, env: crate::heap::EnvRef) -> Env {
    match heap.env(env) {
        HeapObj::EnvEmpty => Env::empty(),
        HeapObj::EnvExtended {
            name,
            value,
            parent,
        } => reify_env(heap, *parent).extend(name.clone(), reify_ref(heap, *value)),
        other => unreachable!("EnvRef pointed at a non-env object: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equals_compares_numbers() {
        let mut heap = Heap::new(64);
        let a = heap.alloc_val(HeapObj::ValNum(3));
        let b = heap.alloc_val(HeapObj::ValNum(3));
        let c = heap.alloc_val(HeapObj::ValNum(4));
        assert!(equals(&heap, a, b));
        assert!(!equals(&heap, a, c));
    }

    #[test]
    fn add_to_wraps_on_overflow() {
        let mut heap = Heap::new(64);
        let a = heap.alloc_val(HeapObj::ValNum(i32::MAX));
        let b = heap.alloc_val(HeapObj::ValNum(1));
        assert!(add_to(&heap, a, b).unwrap().equals(&Value::Num(i32::MIN)));
    }

    #[test]
    fn reify_rebuilds_a_plain_value() {
        let mut heap = Heap::new(64);
        let n = heap.alloc_val(HeapObj::ValNum(5));
        assert!(reify_ref(&heap, n).equals(&Value::Num(5)));
    }
}
