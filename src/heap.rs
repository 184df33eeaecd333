// ABOUTME: Semi-space copying garbage collector: the arena, forwarding, and the Cheney scan

use crate::config::SAFETY_MARGIN;
use crate::expr::Expr;
use std::rc::Rc;

/// A handle into the heap's current `to_space`. Stable only until the next
/// collection; the owner (the stepping machine) is responsible for never
/// holding one across a safepoint outside of its registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvRef(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValRef(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContRef(usize);

/// Every kind of object the stepping machine allocates, unified into one
/// heap so a single semi-space collector reclaims all of them. Expressions
/// are deliberately absent (§9 of SPEC_FULL.md): they are immutable, finite,
/// `Rc`-shared program text, not objects the machine creates at runtime.
#[derive(Debug, Clone)]
pub enum HeapObj {
    EnvEmpty,
    EnvExtended {
        name: Rc<str>,
        value: ValRef,
        parent: EnvRef,
    },

    ValNum(i32),
    ValBool(bool),
    ValFun {
        formal: Rc<str>,
        body: Rc<Expr>,
        captured_env: EnvRef,
    },

    ContDone,
    ContRightThenAdd {
        rhs: Rc<Expr>,
        env: EnvRef,
        rest: ContRef,
    },
    ContAdd {
        lhs: ValRef,
        rest: ContRef,
    },
    ContRightThenMult {
        rhs: Rc<Expr>,
        env: EnvRef,
        rest: ContRef,
    },
    ContMult {
        lhs: ValRef,
        rest: ContRef,
    },
    ContRightThenComp {
        rhs: Rc<Expr>,
        env: EnvRef,
        rest: ContRef,
    },
    ContComp {
        lhs: ValRef,
        rest: ContRef,
    },
    ContArgThenCall {
        arg: Rc<Expr>,
        env: EnvRef,
        rest: ContRef,
    },
    ContCall {
        callee: ValRef,
        rest: ContRef,
    },
    ContIfBranch {
        then_expr: Rc<Expr>,
        else_expr: Rc<Expr>,
        env: EnvRef,
        rest: ContRef,
    },
    ContLetBody {
        name: Rc<str>,
        body: Rc<Expr>,
        env: EnvRef,
        rest: ContRef,
    },
}

/// A Cheney-style semi-space arena. Objects are addressed by index rather
/// than by byte offset (§9, "object-granularity copying"): `to_space` is the
/// live arena being bump-allocated into, `from_space` holds the previous
/// generation during a collection, and `forwarded` is `from_space`'s
/// forwarding-pointer table.
pub struct Heap {
    to_space: Vec<HeapObj>,
    from_space: Vec<HeapObj>,
    forwarded: Vec<Option<usize>>,
    capacity: usize,
}

impl Heap {
    pub fn new(capacity: usize) -> Heap {
        Heap {
            to_space: Vec::with_capacity(capacity),
            from_space: Vec::new(),
            forwarded: Vec::new(),
            capacity,
        }
    }

    fn alloc(&mut self, obj: HeapObj) -> usize {
        let idx = self.to_space.len();
        self.to_space.push(obj);
        idx
    }

    pub fn alloc_env(&mut self, obj: HeapObj) -> EnvRef {
        EnvRef(self.alloc(obj))
    }

    pub fn alloc_val(&mut self, obj: HeapObj) -> ValRef {
        ValRef(self.alloc(obj))
    }

    pub fn alloc_cont(&mut self, obj: HeapObj) -> ContRef {
        ContRef(self.alloc(obj))
    }

    pub fn env(&self, r: EnvRef) -> &HeapObj {
        &self.to_space[r.0]
    }

    pub fn val(&self, r: ValRef) -> &HeapObj {
        &self.to_space[r.0]
    }

    pub fn cont(&self, r: ContRef) -> &HeapObj {
        &self.to_space[r.0]
    }

    /// Whether `to_space` has come within `SAFETY_MARGIN` of `capacity`.
    /// Checked both to decide whether a safepoint should collect at all, and
    /// afterward to decide whether collection (and, failing that, growth)
    /// actually bought back enough room — the latter use is what lets a
    /// safepoint detect genuine exhaustion instead of an allocator-local flag
    /// that a fresh `begin_collect` would only ever wipe clean.
    pub fn needs_collect(&self) -> bool {
        self.to_space.len() + SAFETY_MARGIN >= self.capacity
    }

    pub fn grow(&mut self) {
        self.capacity *= 2;
    }

    pub fn object_count(&self) -> usize {
        self.to_space.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Swaps the spaces and resets the allocation cursor and forwarding
    /// table. The caller must forward every root (§4.5) before calling
    /// [`Heap::scan`].
    pub fn begin_collect(&mut self) {
        std::mem::swap(&mut self.to_space, &mut self.from_space);
        self.forwarded = vec![None; self.from_space.len()];
        self.to_space.clear();
    }

    fn forward(&mut self, idx: usize) -> usize {
        if let Some(existing) = self.forwarded[idx] {
            return existing;
        }
        let obj = self.from_space[idx].clone();
        let new_idx = self.to_space.len();
        self.to_space.push(obj);
        self.forwarded[idx] = Some(new_idx);
        new_idx
    }

    pub fn forward_env(&mut self, r: EnvRef) -> EnvRef {
        EnvRef(self.forward(r.0))
    }

    pub fn forward_val(&mut self, r: ValRef) -> ValRef {
        ValRef(self.forward(r.0))
    }

    pub fn forward_cont(&mut self, r: ContRef) -> ContRef {
        ContRef(self.forward(r.0))
    }

    /// Walks `to_space` linearly from the start, tracing each object's
    /// handle fields. `to_space` grows as objects are copied in during the
    /// walk, so the loop bound is re-read on every iteration.
    pub fn scan(&mut self) {
        let mut offset = 0;
        while offset < self.to_space.len() {
            let obj = std::mem::replace(&mut self.to_space[offset], HeapObj::EnvEmpty);
            self.to_space[offset] = self.trace(obj);
            offset += 1;
        }
    }

    fn trace(&mut self, obj: HeapObj) -> HeapObj {
        match obj {
            HeapObj::EnvEmpty => HeapObj::EnvEmpty,
            HeapObj::EnvExtended {
                name,
                value,
                parent,
            } => HeapObj::EnvExtended {
                name,
                value: self.forward_val(value),
                parent: self.forward_env(parent),
            },

            HeapObj::ValNum(n) => HeapObj::ValNum(n),
            HeapObj::ValBool(b) => HeapObj::ValBool(b),
            HeapObj::ValFun {
                formal,
                body,
                captured_env,
            } => HeapObj::ValFun {
                formal,
                body,
                captured_env: self.forward_env(captured_env),
            },

            HeapObj::ContDone => HeapObj::ContDone,
            HeapObj::ContRightThenAdd { rhs, env, rest } => HeapObj::ContRightThenAdd {
                rhs,
                env: self.forward_env(env),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContAdd { lhs, rest } => HeapObj::ContAdd {
                lhs: self.forward_val(lhs),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContRightThenMult { rhs, env, rest } => HeapObj::ContRightThenMult {
                rhs,
                env: self.forward_env(env),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContMult { lhs, rest } => HeapObj::ContMult {
                lhs: self.forward_val(lhs),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContRightThenComp { rhs, env, rest } => HeapObj::ContRightThenComp {
                rhs,
                env: self.forward_env(env),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContComp { lhs, rest } => HeapObj::ContComp {
                lhs: self.forward_val(lhs),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContArgThenCall { arg, env, rest } => HeapObj::ContArgThenCall {
                arg,
                env: self.forward_env(env),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContCall { callee, rest } => HeapObj::ContCall {
                callee: self.forward_val(callee),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContIfBranch {
                then_expr,
                else_expr,
                env,
                rest,
            } => HeapObj::ContIfBranch {
                then_expr,
                else_expr,
                env: self.forward_env(env),
                rest: self.forward_cont(rest),
            },
            HeapObj::ContLetBody {
                name,
                body,
                env,
                rest,
            } => HeapObj::ContLetBody {
                name,
                body,
                env: self.forward_env(env),
                rest: self.forward_cont(rest),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_bumps_the_cursor() {
        let mut heap = Heap::new(64);
        let a = heap.alloc_val(HeapObj::ValNum(1));
        let b = heap.alloc_val(HeapObj::ValNum(2));
        assert!(matches!(heap.val(a), HeapObj::ValNum(1)));
        assert!(matches!(heap.val(b), HeapObj::ValNum(2)));
    }

    #[test]
    fn collection_preserves_reachable_objects_and_updates_roots() {
        let mut heap = Heap::new(64);
        let empty = heap.alloc_env(HeapObj::EnvEmpty);
        let num = heap.alloc_val(HeapObj::ValNum(7));
        let mut env = heap.alloc_env(HeapObj::EnvExtended {
            name: Rc::from("x"),
            value: num,
            parent: empty,
        });
        // Allocate some garbage that nothing roots.
        heap.alloc_val(HeapObj::ValNum(999));

        heap.begin_collect();
        env = heap.forward_env(env);
        heap.scan();

        assert_eq!(heap.object_count(), 3); // empty, num, env — garbage dropped
        match heap.env(env) {
            HeapObj::EnvExtended { name, value, .. } => {
                assert_eq!(&**name, "x");
                assert!(matches!(heap.val(*value), HeapObj::ValNum(7)));
            }
            other => panic!("expected EnvExtended, got {other:?}"),
        }
    }

    #[test]
    fn needs_collect_respects_safety_margin() {
        let mut heap = Heap::new(2 * SAFETY_MARGIN);
        assert!(!heap.needs_collect());
        for i in 0..SAFETY_MARGIN {
            heap.alloc_val(HeapObj::ValNum(i as i32));
        }
        assert!(heap.needs_collect());
    }
}
