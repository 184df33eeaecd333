// ABOUTME: The expression AST: structural equality, substitution, the constant-folding
// ABOUTME: optimizer, the direct native-recursion interpreter, and CEK stepping.

use crate::env::Env;
use crate::error::ProgramError;
use crate::heap::HeapObj;
use crate::step::Machine;
use crate::value::Value;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Expr {
    Num(i32),
    Bool(bool),
    Var(Rc<str>),
    Add(Rc<Expr>, Rc<Expr>),
    Mult(Rc<Expr>, Rc<Expr>),
    Comp(Rc<Expr>, Rc<Expr>),
    If(Rc<Expr>, Rc<Expr>, Rc<Expr>),
    Let(Rc<str>, Rc<Expr>, Rc<Expr>),
    Fun(Rc<str>, Rc<Expr>),
    Call(Rc<Expr>, Rc<Expr>),
}

impl Expr {
    /// Structural equality. Different variants always compare unequal.
    pub fn equals(&self, other: &Expr) -> bool {
        use Expr::*;
        match (self, other) {
            (Num(a), Num(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Var(a), Var(b)) => a == b,
            (Add(l1, r1), Add(l2, r2)) => l1.equals(l2) && r1.equals(r2),
            (Mult(l1, r1), Mult(l2, r2)) => l1.equals(l2) && r1.equals(r2),
            (Comp(l1, r1), Comp(l2, r2)) => l1.equals(l2) && r1.equals(r2),
            (If(c1, t1, e1), If(c2, t2, e2)) => c1.equals(c2) && t1.equals(t2) && e1.equals(e2),
            (Let(n1, r1, b1), Let(n2, r2, b2)) => n1 == n2 && r1.equals(r2) && b1.equals(b2),
            (Fun(f1, b1), Fun(f2, b2)) => f1 == f2 && b1.equals(b2),
            (Call(c1, a1), Call(c2, a2)) => c1.equals(c2) && a1.equals(a2),
            _ => false,
        }
    }

    /// Direct interpreter: recurses on the native stack.
    pub fn interp(&self, env: &Env) -> Result<Value, ProgramError> {
        match self {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Var(name) => env.lookup(name),
            Expr::Add(lhs, rhs) => lhs.interp(env)?.add_to(&rhs.interp(env)?),
            Expr::Mult(lhs, rhs) => lhs.interp(env)?.mult_with(&rhs.interp(env)?),
            Expr::Comp(lhs, rhs) => {
                let l = lhs.interp(env)?;
                let r = rhs.interp(env)?;
                Ok(Value::Bool(l.equals(&r)))
            }
            Expr::If(test, then_branch, else_branch) => {
                if test.interp(env)?.is_true()? {
                    then_branch.interp(env)
                } else {
                    else_branch.interp(env)
                }
            }
            Expr::Let(name, rhs, body) => {
                let rhs_val = rhs.interp(env)?;
                body.interp(&env.extend(name.clone(), rhs_val))
            }
            Expr::Fun(formal, body) => Ok(Value::Fun {
                formal: formal.clone(),
                body: body.clone(),
                env: env.clone(),
            }),
            Expr::Call(callee, argument) => {
                let callee_val = callee.interp(env)?;
                let arg_val = argument.interp(env)?;
                callee_val.call(arg_val)
            }
        }
    }

    /// Substitutes `value` for every occurrence of `name`, stopping at a
    /// binder that shadows `name`. Always returns a fresh node.
    pub fn subst(&self, name: &str, value: &Value) -> Rc<Expr> {
        match self {
            Expr::Num(_) | Expr::Bool(_) => Rc::new(self.clone()),
            Expr::Var(v) => {
                if &**v == name {
                    value.to_expr()
                } else {
                    Rc::new(self.clone())
                }
            }
            Expr::Add(l, r) => Rc::new(Expr::Add(l.subst(name, value), r.subst(name, value))),
            Expr::Mult(l, r) => Rc::new(Expr::Mult(l.subst(name, value), r.subst(name, value))),
            Expr::Comp(l, r) => Rc::new(Expr::Comp(l.subst(name, value), r.subst(name, value))),
            Expr::If(c, t, e) => Rc::new(Expr::If(
                c.subst(name, value),
                t.subst(name, value),
                e.subst(name, value),
            )),
            Expr::Let(bound, rhs, body) => {
                let new_rhs = rhs.subst(name, value);
                let new_body = if &**bound == name {
                    body.clone()
                } else {
                    body.subst(name, value)
                };
                Rc::new(Expr::Let(bound.clone(), new_rhs, new_body))
            }
            Expr::Fun(formal, body) => {
                let new_body = if &**formal == name {
                    body.clone()
                } else {
                    body.subst(name, value)
                };
                Rc::new(Expr::Fun(formal.clone(), new_body))
            }
            Expr::Call(callee, arg) => Rc::new(Expr::Call(
                callee.subst(name, value),
                arg.subst(name, value),
            )),
        }
    }

    /// Whether any `Var` node occurs anywhere in this subtree, ignoring
    /// binding structure. A direct syntactic scan (§9), not entangled with
    /// `optimize`.
    pub fn contains_var(&self) -> bool {
        match self {
            Expr::Num(_) | Expr::Bool(_) => false,
            Expr::Var(_) => true,
            Expr::Add(l, r) | Expr::Mult(l, r) | Expr::Comp(l, r) | Expr::Call(l, r) => {
                l.contains_var() || r.contains_var()
            }
            Expr::If(c, t, e) => c.contains_var() || t.contains_var() || e.contains_var(),
            Expr::Let(_, rhs, body) => rhs.contains_var() || body.contains_var(),
            Expr::Fun(_, body) => body.contains_var(),
        }
    }

    /// Constant-folding AST-to-AST optimizer.
    pub fn optimize(&self) -> Rc<Expr> {
        match self {
            Expr::Num(_) | Expr::Bool(_) | Expr::Var(_) => Rc::new(self.clone()),

            Expr::Add(l, r) => fold_numeric(l, r, Expr::Add, |a, b| a.add_to(b)),
            Expr::Mult(l, r) => fold_numeric(l, r, Expr::Mult, |a, b| a.mult_with(b)),

            Expr::Comp(l, r) => {
                let ol = l.optimize();
                let or = r.optimize();
                if !ol.contains_var() && !or.contains_var() {
                    let lv = ol.interp(&Env::empty()).expect("variable-free subtree");
                    let rv = or.interp(&Env::empty()).expect("variable-free subtree");
                    Rc::new(Expr::Bool(lv.equals(&rv)))
                } else {
                    Rc::new(Expr::Comp(ol, or))
                }
            }

            Expr::If(test, then_branch, else_branch) => {
                let otest = test.optimize();
                if !otest.contains_var() {
                    let tv = otest
                        .interp(&Env::empty())
                        .expect("variable-free subtree")
                        .is_true()
                        .expect("If test must be boolean");
                    if tv {
                        then_branch.optimize()
                    } else {
                        else_branch.optimize()
                    }
                } else {
                    Rc::new(Expr::If(otest, then_branch.optimize(), else_branch.optimize()))
                }
            }

            Expr::Let(name, rhs, body) => {
                let orhs = rhs.optimize();
                if !orhs.contains_var() {
                    let rhs_val = orhs.interp(&Env::empty()).expect("variable-free subtree");
                    body.subst(name, &rhs_val).optimize()
                } else {
                    Rc::new(Expr::Let(name.clone(), orhs, body.optimize()))
                }
            }

            Expr::Fun(formal, body) => Rc::new(Expr::Fun(formal.clone(), body.optimize())),
            Expr::Call(callee, arg) => {
                Rc::new(Expr::Call(callee.optimize(), arg.optimize()))
            }
        }
    }

    /// Stepping counterpart of `interp`: mutates the machine's registers
    /// instead of recursing on the native stack.
    pub fn step_interp(&self, m: &mut Machine) -> Result<(), ProgramError> {
        match self {
            Expr::Num(n) => {
                m.val = m.heap.alloc_val(HeapObj::ValNum(*n));
                m.enter_continue();
            }
            Expr::Bool(b) => {
                m.val = m.heap.alloc_val(HeapObj::ValBool(*b));
                m.enter_continue();
            }
            Expr::Fun(formal, body) => {
                let captured_env = m.env;
                m.val = m.heap.alloc_val(HeapObj::ValFun {
                    formal: formal.clone(),
                    body: body.clone(),
                    captured_env,
                });
                m.enter_continue();
            }
            Expr::Var(name) => {
                m.val = crate::gc_env::lookup(&m.heap, m.env, name)?;
                m.enter_continue();
            }
            Expr::Add(lhs, rhs) => {
                let rest = m.cont;
                let env = m.env;
                m.cont = m.heap.alloc_cont(HeapObj::ContRightThenAdd {
                    rhs: rhs.clone(),
                    env,
                    rest,
                });
                m.enter_interp(lhs.clone(), env);
            }
            Expr::Mult(lhs, rhs) => {
                let rest = m.cont;
                let env = m.env;
                m.cont = m.heap.alloc_cont(HeapObj::ContRightThenMult {
                    rhs: rhs.clone(),
                    env,
                    rest,
                });
                m.enter_interp(lhs.clone(), env);
            }
            Expr::Comp(lhs, rhs) => {
                let rest = m.cont;
                let env = m.env;
                m.cont = m.heap.alloc_cont(HeapObj::ContRightThenComp {
                    rhs: rhs.clone(),
                    env,
                    rest,
                });
                m.enter_interp(lhs.clone(), env);
            }
            Expr::Call(callee, argument) => {
                let rest = m.cont;
                let env = m.env;
                m.cont = m.heap.alloc_cont(HeapObj::ContArgThenCall {
                    arg: argument.clone(),
                    env,
                    rest,
                });
                m.enter_interp(callee.clone(), env);
            }
            Expr::If(test, then_branch, else_branch) => {
                let rest = m.cont;
                let env = m.env;
                m.cont = m.heap.alloc_cont(HeapObj::ContIfBranch {
                    then_expr: then_branch.clone(),
                    else_expr: else_branch.clone(),
                    env,
                    rest,
                });
                m.enter_interp(test.clone(), env);
            }
            Expr::Let(name, rhs, body) => {
                let rest = m.cont;
                let env = m.env;
                m.cont = m.heap.alloc_cont(HeapObj::ContLetBody {
                    name: name.clone(),
                    body: body.clone(),
                    env,
                    rest,
                });
                m.enter_interp(rhs.clone(), env);
            }
        }
        Ok(())
    }
}

fn fold_numeric(
    l: &Rc<Expr>,
    r: &Rc<Expr>,
    rebuild: fn(Rc<Expr>, Rc<Expr>) -> Expr,
    combine: fn(&Value, &Value) -> Result<Value, ProgramError>,
) -> Rc<Expr> {
    let ol = l.optimize();
    let or = r.optimize();
    if !ol.contains_var() && !or.contains_var() {
        let lv = ol.interp(&Env::empty()).expect("variable-free subtree");
        let rv = or.interp(&Env::empty()).expect("variable-free subtree");
        combine(&lv, &rv).expect("variable-free subtree").to_expr()
    } else {
        Rc::new(rebuild(ol, or))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i32) -> Rc<Expr> {
        Rc::new(Expr::Num(n))
    }

    fn var(name: &str) -> Rc<Expr> {
        Rc::new(Expr::Var(Rc::from(name)))
    }

    #[test]
    fn equals_distinguishes_variants_and_payloads() {
        assert!(num(1).equals(&num(1)));
        assert!(!num(1).equals(&num(2)));
        assert!(!num(1).equals(&Expr::Bool(true)));
    }

    #[test]
    fn interp_add_and_mult() {
        let e = Expr::Add(num(2), Rc::new(Expr::Mult(num(3), num(4))));
        assert!(e.interp(&Env::empty()).unwrap().equals(&Value::Num(14)));
    }

    #[test]
    fn interp_let_shadows_in_body_only() {
        // _let x = 5 _in _let y = x _in y + y
        let e = Expr::Let(
            Rc::from("x"),
            num(5),
            Rc::new(Expr::Let(
                Rc::from("y"),
                var("x"),
                Rc::new(Expr::Add(var("y"), var("y"))),
            )),
        );
        assert!(e.interp(&Env::empty()).unwrap().equals(&Value::Num(10)));
    }

    #[test]
    fn interp_free_variable_fails() {
        assert!(var("z").interp(&Env::empty()).is_err());
    }

    #[test]
    fn subst_stops_at_shadowing_fun_binder() {
        // (_fun (x) x).subst("x", 9) must leave the body untouched.
        let f = Expr::Fun(Rc::from("x"), var("x"));
        let substituted = f.subst("x", &Value::Num(9));
        assert!(substituted.equals(&f));
    }

    #[test]
    fn subst_rewrites_let_rhs_but_not_shadowed_body() {
        // (_let x = x _in x).subst("x", 9) -> _let x = 9 _in x
        let e = Expr::Let(Rc::from("x"), var("x"), var("x"));
        let substituted = e.subst("x", &Value::Num(9));
        let expected = Expr::Let(Rc::from("x"), num(9), var("x"));
        assert!(substituted.equals(&expected));
    }

    #[test]
    fn contains_var_is_a_syntactic_scan() {
        assert!(!num(1).contains_var());
        assert!(var("x").contains_var());
        assert!(Expr::Add(num(1), var("x")).contains_var());
        assert!(!Expr::Add(num(1), num(2)).contains_var());
    }

    #[test]
    fn optimize_folds_closed_arithmetic() {
        let e = Expr::Add(num(2), Rc::new(Expr::Mult(num(3), num(4))));
        let optimized = e.optimize();
        assert!(optimized.equals(&num(14)));
    }

    #[test]
    fn optimize_folds_if_on_closed_test() {
        let e = Expr::If(
            Rc::new(Expr::Comp(num(5), num(3))),
            num(2),
            num(89),
        );
        assert!(e.optimize().equals(&num(89)));
    }

    #[test]
    fn optimize_substitutes_closed_let_and_leaves_open_subtrees() {
        // _let x = 5 _in _let y = z + 2 _in x + y + (2 * 3)
        let e = Expr::Let(
            Rc::from("x"),
            num(5),
            Rc::new(Expr::Let(
                Rc::from("y"),
                Rc::new(Expr::Add(var("z"), num(2))),
                Rc::new(Expr::Add(
                    Rc::new(Expr::Add(var("x"), var("y"))),
                    Rc::new(Expr::Mult(num(2), num(3))),
                )),
            )),
        );
        // 5 + y + 6, structurally Add(Add(5, y), 6) after folding the constant tail
        let expected = Expr::Let(
            Rc::from("y"),
            Rc::new(Expr::Add(var("z"), num(2))),
            Rc::new(Expr::Add(Rc::new(Expr::Add(num(5), var("y"))), num(6))),
        );
        assert!(e.optimize().equals(&expected));
    }
}
