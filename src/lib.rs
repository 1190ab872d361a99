use std::cell::RefCell;
use std::rc::Rc;

pub mod ast;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod stdlib;
pub mod types;

pub use environment::Context;
pub use error::{Error, ParseError, RuntimeError, ScanError};
pub use evaluator::{call_value, evaluate};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::Parser;
pub use stdlib::make_global_env;
pub use types::{mk_native_fn, Function, GetSet, Table, TableKey, Value};

use stdlib::format_args;

/// Scans, parses and evaluates a source string against an existing context.
pub fn run(source: &str, ctx: &mut Context) -> Result<Value, Error> {
    let tokens = tokenize(source)?;
    let program = Parser::new(tokens).parse()?;
    Ok(evaluate(&program, ctx)?)
}

/// Runs a source string in a fresh environment with `print` redirected into
/// a vector, one entry per call. Used by tests and embedders that want the
/// output instead of stdout.
pub fn run_to_vec_string(source: &str) -> Result<Vec<String>, Error> {
    let env = make_global_env();
    let output = Rc::new(RefCell::new(Vec::<String>::new()));
    let sink = output.clone();

    env.set(
        "print",
        mk_native_fn(move |_ctx, args, _owner| {
            sink.borrow_mut().push(format_args(&args));
            Ok(Value::Null)
        }),
    );

    let mut ctx = Context::new(env);
    run(source, &mut ctx)?;

    let collected = output.borrow().clone();
    Ok(collected)
}
