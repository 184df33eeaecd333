// ABOUTME: Heap-backed environment operations used by the CEK stepping machine

use crate::error::ProgramError;
use crate::heap::{EnvRef, Heap, HeapObj, ValRef};

/// Binds `name` to `value` in a new scope whose parent is `env`.
pub fn extend(heap: &mut Heap, env: EnvRef, name: std::rc::Rc<str>, value: ValRef) -> EnvRef {
    heap.alloc_env(HeapObj::EnvExtended {
        name,
        value,
        parent: env,
    })
}

/// Walks the chain for the most recently bound occurrence of `name`.
pub fn lookup(heap: &Heap, env: EnvRef, name: &str) -> Result<ValRef, ProgramError> {
    match heap.env(env) {
        HeapObj::EnvEmpty => Err(ProgramError::FreeVariable(name.to_string())),
        HeapObj::EnvExtended {
            name: bound,
            value,
            parent,
        } => {
            if &**bound == name {
                Ok(*value)
            } else {
                lookup(heap, *parent, name)
            }
        }
        other => unreachable!("EnvRef pointed at a non-env object: {other:?}"),
    }
}

/// Structural equality, position-by-position down the chain.
pub fn equals(heap: &Heap, a: EnvRef, b: EnvRef) -> bool {
    match (heap.env(a), heap.env(b)) {
        (HeapObj::EnvEmpty, HeapObj::EnvEmpty) => true,
        (
            HeapObj::EnvExtended {
                name: n1,
                value: v1,
                parent: p1,
            },
            HeapObj::EnvExtended {
                name: n2,
                value: v2,
                parent: p2,
            },
        ) => n1 == n2 && crate::gc_value::equals(heap, *v1, *v2) && equals(heap, *p1, *p2),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_free_variable_fails() {
        let mut heap = Heap::new(64);
        let empty = heap.alloc_env(HeapObj::EnvEmpty);
        assert!(lookup(&heap, empty, "x").is_err());
    }

    #[test]
    fn shadowing_prefers_innermost_binding() {
        let mut heap = Heap::new(64);
        let empty = heap.alloc_env(HeapObj::EnvEmpty);
        let one = heap.alloc_val(HeapObj::ValNum(1));
        let two = heap.alloc_val(HeapObj::ValNum(2));
        let inner = extend(&mut heap, empty, std::rc::Rc::from("x"), one);
        let outer = extend(&mut heap, inner, std::rc::Rc::from("x"), two);
        let found = lookup(&heap, outer, "x").unwrap();
        assert!(matches!(heap.val(found), HeapObj::ValNum(2)));
    }
}
