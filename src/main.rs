mod config;
mod cont;
mod env;
mod error;
mod expr;
mod gc_env;
mod gc_value;
mod heap;
mod parser;
mod step;
mod value;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// A small expression interpreter: integers, booleans, closures, conditionals.
#[derive(Parser, Debug)]
#[command(name = "expr-interp")]
#[command(version = config::VERSION)]
#[command(about = config::CLI_ABOUT)]
struct CliArgs {
    /// Parse and optimize the input, printing the resulting expression instead of evaluating it
    #[arg(long = "opt")]
    opt: bool,

    /// Evaluate via the stepping (CEK) machine instead of the direct recursive interpreter
    #[arg(long = "step")]
    step: bool,

    /// Read the program from a file instead of standard input
    #[arg(long = "script", value_name = "PATH")]
    script: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("warn"),
        ))
        .init();

    let args = CliArgs::parse();

    let source = match &args.script {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read script file {}: {e}", path.display()))?,
        None => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    match run(&source, &args) {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn run(source: &str, args: &CliArgs) -> Result<String, error::ProgramError> {
    let ast = tracing::info_span!("parse").in_scope(|| parser::parse(source))?;
    info!(script = args.script.is_some(), "parsed program");

    if args.opt {
        let optimized = tracing::info_span!("optimize").in_scope(|| ast.optimize());
        return Ok(render(&optimized));
    }

    let value = if args.script.is_some() || args.step {
        tracing::info_span!("interpret", mode = "step").in_scope(|| step::interp_by_steps(ast))?
    } else {
        tracing::info_span!("interpret", mode = "direct").in_scope(|| ast.interp(&env::Env::empty()))?
    };
    Ok(value.to_string())
}

/// Renders an expression back into source text consistent with the parser's
/// grammar (§6): reparsing must reproduce a structurally equal AST.
fn render(e: &expr::Expr) -> String {
    match e {
        expr::Expr::Num(n) => n.to_string(),
        expr::Expr::Bool(true) => "_true".to_string(),
        expr::Expr::Bool(false) => "_false".to_string(),
        expr::Expr::Var(name) => name.to_string(),
        expr::Expr::Add(l, r) => format!("({} + {})", render(l), render(r)),
        expr::Expr::Mult(l, r) => format!("({} * {})", render(l), render(r)),
        expr::Expr::Comp(l, r) => format!("({} == {})", render(l), render(r)),
        expr::Expr::If(c, t, e) => {
            format!("_if {} _then {} _else {}", render(c), render(t), render(e))
        }
        expr::Expr::Let(name, rhs, body) => {
            format!("_let {name} = {} _in {}", render(rhs), render(body))
        }
        expr::Expr::Fun(formal, body) => format!("_fun ({formal}) {}", render(body)),
        expr::Expr::Call(callee, arg) => format!("{}({})", render(callee), render(arg)),
    }
}
