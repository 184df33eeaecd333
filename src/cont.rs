// ABOUTME: Continuation dispatch: resumes the stepping machine with a value
// ABOUTME: against whatever frame is on top of the continuation stack.

use crate::error::ProgramError;
use crate::gc_env;
use crate::gc_value;
use crate::heap::HeapObj;
use crate::step::Machine;

/// Pops the top continuation frame and resumes the machine with `m.val`.
/// `m.cont == m.cont_done` must already have been ruled out by the caller.
pub fn step_continue(m: &mut Machine) -> Result<(), ProgramError> {
    let frame = m.heap.cont(m.cont).clone();
    match frame {
        HeapObj::ContDone => unreachable!("the driver loop handles ContDone directly"),

        HeapObj::ContRightThenAdd { rhs, env, rest } => {
            let lhs = m.val;
            m.cont = m.heap.alloc_cont(HeapObj::ContAdd { lhs, rest });
            m.enter_interp(rhs, env);
        }
        HeapObj::ContAdd { lhs, rest } => {
            let result = gc_value::add_to(&m.heap, lhs, m.val)?;
            m.val = alloc_numeric(m, result);
            m.cont = rest;
            m.enter_continue();
        }

        HeapObj::ContRightThenMult { rhs, env, rest } => {
            let lhs = m.val;
            m.cont = m.heap.alloc_cont(HeapObj::ContMult { lhs, rest });
            m.enter_interp(rhs, env);
        }
        HeapObj::ContMult { lhs, rest } => {
            let result = gc_value::mult_with(&m.heap, lhs, m.val)?;
            m.val = alloc_numeric(m, result);
            m.cont = rest;
            m.enter_continue();
        }

        HeapObj::ContRightThenComp { rhs, env, rest } => {
            let lhs = m.val;
            m.cont = m.heap.alloc_cont(HeapObj::ContComp { lhs, rest });
            m.enter_interp(rhs, env);
        }
        HeapObj::ContComp { lhs, rest } => {
            let equal = gc_value::equals(&m.heap, lhs, m.val);
            m.val = m.heap.alloc_val(HeapObj::ValBool(equal));
            m.cont = rest;
            m.enter_continue();
        }

        HeapObj::ContArgThenCall { arg, env, rest } => {
            let callee = m.val;
            m.cont = m.heap.alloc_cont(HeapObj::ContCall { callee, rest });
            m.enter_interp(arg, env);
        }
        HeapObj::ContCall { callee, rest } => {
            let arg = m.val;
            match m.heap.val(callee).clone() {
                HeapObj::ValFun {
                    formal,
                    body,
                    captured_env,
                } => {
                    let call_env = gc_env::extend(&mut m.heap, captured_env, formal, arg);
                    m.cont = rest;
                    m.enter_interp(body, call_env);
                }
                other => {
                    return Err(ProgramError::NotAFunction(
                        gc_value::reify(&m.heap, &other).to_string(),
                    ))
                }
            }
        }

        HeapObj::ContIfBranch {
            then_expr,
            else_expr,
            env,
            rest,
        } => {
            let test = gc_value::is_true(&m.heap, m.val)?;
            m.cont = rest;
            if test {
                m.enter_interp(then_expr, env);
            } else {
                m.enter_interp(else_expr, env);
            }
        }

        HeapObj::ContLetBody {
            name,
            body,
            env,
            rest,
        } => {
            let rhs_val = m.val;
            let call_env = gc_env::extend(&mut m.heap, env, name, rhs_val);
            m.cont = rest;
            m.enter_interp(body, call_env);
        }

        other @ (HeapObj::EnvEmpty
        | HeapObj::EnvExtended { .. }
        | HeapObj::ValNum(_)
        | HeapObj::ValBool(_)
        | HeapObj::ValFun { .. }) => {
            unreachable!("ContRef pointed at a non-continuation object: {other:?}")
        }
    }
    Ok(())
}

/// `add_to`/`mult_with` only ever produce a plain number, never a closure.
fn alloc_numeric(m: &mut Machine, value: crate::value::Value) -> crate::heap::ValRef {
    match value {
        crate::value::Value::Num(n) => m.heap.alloc_val(HeapObj::ValNum(n)),
        other => unreachable!("arithmetic produced a non-number: {other:?}"),
    }
}
