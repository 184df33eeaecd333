// ABOUTME: Recursive-descent parser built from nom combinators in the teacher's style

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, char, digit1, multispace0},
    combinator::{map, map_res, opt, recognize},
    sequence::delimited,
    IResult, Parser,
};
use std::rc::Rc;

use crate::error::ProgramError;
use crate::expr::Expr;

fn ws(input: &str) -> IResult<&str, ()> {
    map(multispace0, |_| ()).parse(input)
}

fn token<'a, O>(
    mut inner: impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>> {
    move |input: &'a str| {
        let (input, _) = ws(input)?;
        inner.parse(input)
    }
}

/// `digit1` bounds the character class, not the magnitude, so a literal with
/// too many digits for `i32` is syntactically valid and must fail to parse
/// rather than panic (`map_res` turns the overflow into an ordinary parse
/// error that the caller can backtrack from or report).
fn parse_number(input: &str) -> IResult<&str, Expr> {
    token(map_res(recognize((opt(char('-')), digit1)), |s: &str| {
        s.parse::<i32>().map(Expr::Num)
    }))
    .parse(input)
}

/// `'_' alpha+` — the keyword family (`_true`, `_let`, `_fun`, ...), not to be
/// confused with a bare variable, which never starts with `_`.
fn keyword<'a>(kw: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    token(tag(kw))
}

fn parse_var_name(input: &str) -> IResult<&str, Rc<str>> {
    token(map(alpha1, Rc::from)).parse(input)
}

fn parse_var(input: &str) -> IResult<&str, Expr> {
    map(parse_var_name, Expr::Var).parse(input)
}

fn parse_true(input: &str) -> IResult<&str, Expr> {
    map(keyword("_true"), |_| Expr::Bool(true)).parse(input)
}

fn parse_false(input: &str) -> IResult<&str, Expr> {
    map(keyword("_false"), |_| Expr::Bool(false)).parse(input)
}

fn parse_paren(input: &str) -> IResult<&str, Expr> {
    delimited(token(char('(')), parse_expr, token(char(')'))).parse(input)
}

fn parse_let(input: &str) -> IResult<&str, Expr> {
    let (input, _) = keyword("_let").parse(input)?;
    let (input, name) = parse_var_name(input)?;
    let (input, _) = token(char('=')).parse(input)?;
    let (input, rhs) = parse_expr(input)?;
    let (input, _) = keyword("_in").parse(input)?;
    let (input, body) = parse_expr(input)?;
    Ok((input, Expr::Let(name, Rc::new(rhs), Rc::new(body))))
}

fn parse_if(input: &str) -> IResult<&str, Expr> {
    let (input, _) = keyword("_if").parse(input)?;
    let (input, test) = parse_expr(input)?;
    let (input, _) = keyword("_then").parse(input)?;
    let (input, then_branch) = parse_expr(input)?;
    let (input, _) = keyword("_else").parse(input)?;
    let (input, else_branch) = parse_expr(input)?;
    Ok((
        input,
        Expr::If(Rc::new(test), Rc::new(then_branch), Rc::new(else_branch)),
    ))
}

fn parse_fun(input: &str) -> IResult<&str, Expr> {
    let (input, _) = keyword("_fun").parse(input)?;
    let (input, _) = token(char('(')).parse(input)?;
    let (input, formal) = parse_var_name(input)?;
    let (input, _) = token(char(')')).parse(input)?;
    let (input, body) = parse_expr(input)?;
    Ok((input, Expr::Fun(formal, Rc::new(body))))
}

/// `inner ::= number | '(' expr ')' | var | '_true' | '_false' | let | if | fun`
fn parse_inner(input: &str) -> IResult<&str, Expr> {
    alt((
        parse_let,
        parse_if,
        parse_fun,
        parse_true,
        parse_false,
        parse_number,
        parse_paren,
        parse_var,
    ))
    .parse(input)
}

/// `multi ::= inner ('(' expr ')')*` — left-associative call chain.
fn parse_multi(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut callee) = parse_inner(input)?;
    loop {
        match parse_paren(input) {
            Ok((rest, argument)) => {
                callee = Expr::Call(Rc::new(callee), Rc::new(argument));
                input = rest;
            }
            Err(_) => break,
        }
    }
    Ok((input, callee))
}

/// `addend ::= multi ('*' addend)?` — right-associative.
fn parse_addend(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = parse_multi(input)?;
    match token(char('*')).parse(input) {
        Ok((input, _)) => {
            let (input, rhs) = parse_addend(input)?;
            Ok((input, Expr::Mult(Rc::new(lhs), Rc::new(rhs))))
        }
        Err(_) => Ok((input, lhs)),
    }
}

/// `comparg ::= addend ('+' comparg)?` — right-associative.
fn parse_comparg(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = parse_addend(input)?;
    match token(char('+')).parse(input) {
        Ok((input, _)) => {
            let (input, rhs) = parse_comparg(input)?;
            Ok((input, Expr::Add(Rc::new(lhs), Rc::new(rhs))))
        }
        Err(_) => Ok((input, lhs)),
    }
}

/// `expr ::= comparg ('==' expr)?`
fn parse_expr(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = parse_comparg(input)?;
    match token(tag("==")).parse(input) {
        Ok((input, _)) => {
            let (input, rhs) = parse_expr(input)?;
            Ok((input, Expr::Comp(Rc::new(lhs), Rc::new(rhs))))
        }
        Err(_) => Ok((input, lhs)),
    }
}

/// Parses a whole program: one top-level expression, with no non-whitespace
/// input left over.
pub fn parse(input: &str) -> Result<Rc<Expr>, ProgramError> {
    match parse_expr(input) {
        Ok((rest, expr)) => {
            let (rest, _) = ws(rest).unwrap_or((rest, ()));
            if !rest.is_empty() {
                Err(ProgramError::Parse(format!(
                    "unexpected trailing input: '{rest}'"
                )))
            } else {
                Ok(Rc::new(expr))
            }
        }
        Err(e) => Err(ProgramError::Parse(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(input: &str) -> Rc<Expr> {
        parse(input).unwrap_or_else(|e| panic!("failed to parse {input:?}: {e}"))
    }

    #[test]
    fn parses_arithmetic_with_right_associative_precedence() {
        // 2 + 3 * 4 == Add(2, Mult(3, 4))
        let e = ok("2 + 3 * 4");
        let expected = Expr::Add(
            Rc::new(Expr::Num(2)),
            Rc::new(Expr::Mult(Rc::new(Expr::Num(3)), Rc::new(Expr::Num(4)))),
        );
        assert!(e.equals(&expected));
    }

    #[test]
    fn parses_negative_numbers() {
        assert!(ok("-5").equals(&Expr::Num(-5)));
    }

    #[test]
    fn oversized_number_literal_is_a_parse_error_not_a_panic() {
        assert!(parse("99999999999").is_err());
    }

    #[test]
    fn parses_let_if_fun_and_call() {
        let e = ok("_let x = 5 _in _if x == 5 _then _true _else _false");
        assert!(matches!(*e, Expr::Let(..)));

        let call = ok("(_fun (x) x + 1)(41)");
        assert!(matches!(*call, Expr::Call(..)));
    }

    #[test]
    fn left_associative_call_chain() {
        // f(1)(2) == Call(Call(f, 1), 2)
        let e = ok("f(1)(2)");
        let expected = Expr::Call(
            Rc::new(Expr::Call(
                Rc::new(Expr::Var(Rc::from("f"))),
                Rc::new(Expr::Num(1)),
            )),
            Rc::new(Expr::Num(2)),
        );
        assert!(e.equals(&expected));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("1 + 1 )").is_err());
    }

    #[test]
    fn parenthesized_subexpressions_group() {
        // (2 + 3) * 4 == Mult(Add(2,3), 4)
        let e = ok("(2 + 3) * 4");
        let expected = Expr::Mult(
            Rc::new(Expr::Add(Rc::new(Expr::Num(2)), Rc::new(Expr::Num(3)))),
            Rc::new(Expr::Num(4)),
        );
        assert!(e.equals(&expected));
    }
}
