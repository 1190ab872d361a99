use std::fs;
use std::io::{self, Write};
use std::rc::Rc;

use crate::environment::Context;
use crate::error::RuntimeError;
use crate::evaluator::evaluate;
use crate::lexer::tokenize;
use crate::parser::Parser;
use crate::types::{mk_native_fn, GetSet, Table, Value};

/// Renders call arguments the way `print` shows them, space separated.
pub fn format_args(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the global frame every run starts from: the library functions and
/// the `debug` introspection table.
pub fn make_global_env() -> Rc<Table> {
    let env = Rc::new(Table::new());

    env.set(
        "print",
        mk_native_fn(|_ctx, args, _owner| {
            println!("{}", format_args(&args));
            Ok(Value::Null)
        }),
    );

    env.set(
        "input",
        mk_native_fn(|_ctx, args, _owner| {
            if let Some(prompt) = args.first() {
                print!("{prompt}");
                if io::stdout().flush().is_err() {
                    return Ok(Value::Null);
                }
            }
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(_) => Ok(Value::Str(line.trim_end_matches(['\r', '\n']).to_string())),
                Err(_) => Ok(Value::Null),
            }
        }),
    );

    env.set(
        "error",
        mk_native_fn(|_ctx, args, _owner| {
            Err(RuntimeError::new(
                args.first().map(|v| v.to_string()).unwrap_or_default(),
            ))
        }),
    );

    env.set(
        "type",
        mk_native_fn(|_ctx, args, _owner| {
            let value = args.first().cloned().unwrap_or(Value::Null);
            Ok(Value::Str(value.kind().to_string()))
        }),
    );

    env.set(
        "num",
        mk_native_fn(|_ctx, args, _owner| {
            Ok(match args.first() {
                Some(Value::Number(n)) => Value::Number(*n),
                Some(Value::Str(s)) => match s.trim().parse::<f64>() {
                    Ok(n) => Value::Number(n),
                    Err(_) => Value::Null,
                },
                _ => Value::Null,
            })
        }),
    );

    env.set(
        "readfile",
        mk_native_fn(|_ctx, args, _owner| {
            let Some(Value::Str(path)) = args.first() else {
                return Ok(Value::Null);
            };
            Ok(match fs::read_to_string(path) {
                Ok(content) => Value::Str(content),
                Err(_) => Value::Null,
            })
        }),
    );

    env.set("runstring", mk_native_fn(runstring));

    env.set(
        "getset",
        mk_native_fn(|_ctx, args, _owner| {
            let getter = args.first().cloned().unwrap_or(Value::Null);
            let setter = args.get(1).cloned().unwrap_or(Value::Null);
            Ok(Value::GetSet(Rc::new(GetSet { getter, setter })))
        }),
    );

    env.set("debug", Value::Table(make_debug_table()));

    env
}

/// Runs a source string in its own context. The nested run starts from a
/// copy of the caller's globals and merges its globals back afterwards;
/// any failure of the nested run, at any stage, reads as null.
fn runstring(ctx: &mut Context, args: Vec<Value>, _owner: Value) -> Result<Value, RuntimeError> {
    let Some(Value::Str(source)) = args.first() else {
        return Ok(Value::Null);
    };

    let nested_env = Rc::new(Table::new());
    for (key, value) in ctx.global().entries() {
        nested_env.set(key, value);
    }

    let Ok(tokens) = tokenize(source) else {
        return Ok(Value::Null);
    };
    let Ok(program) = Parser::new(tokens).parse() else {
        return Ok(Value::Null);
    };

    let mut nested_ctx = Context::new(nested_env.clone());
    let Ok(value) = evaluate(&program, &mut nested_ctx) else {
        return Ok(Value::Null);
    };

    for (key, value) in nested_env.entries() {
        ctx.global().set(key, value);
    }
    Ok(value)
}

/// The `debug` table: scope-stack introspection hooks for scripts. `ctx`
/// reads a frame, `ctxpush`/`ctxpop` manipulate the stack, `ctxfunc`
/// installs a persistent frame on a closure.
fn make_debug_table() -> Rc<Table> {
    let debug = Rc::new(Table::new());

    debug.set(
        "ctx",
        mk_native_fn(|ctx, args, _owner| {
            let index = match args.first() {
                Some(Value::Number(n)) => *n as usize,
                _ => ctx.depth() - 1,
            };
            Ok(match ctx.by_index(index) {
                Some(frame) => Value::Table(frame.clone()),
                None => Value::Null,
            })
        }),
    );

    debug.set(
        "ctxpush",
        mk_native_fn(|ctx, args, _owner| {
            let frame = match args.into_iter().next() {
                Some(Value::Table(t)) => Some(t),
                _ => None,
            };
            ctx.push(frame);
            Ok(Value::Null)
        }),
    );

    debug.set(
        "ctxpop",
        mk_native_fn(|ctx, _args, _owner| {
            ctx.pop();
            Ok(Value::Null)
        }),
    );

    debug.set(
        "ctxfunc",
        mk_native_fn(|_ctx, args, _owner| {
            let (Some(Value::Function(function)), Some(Value::Table(frame))) =
                (args.first(), args.get(1))
            else {
                return Err(RuntimeError::new(
                    "ctxfunc expects a function and a table",
                ));
            };
            *function.set_ctx.borrow_mut() = Some(frame.clone());
            Ok(Value::Function(function.clone()))
        }),
    );

    debug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::call_value;
    use std::cell::RefCell;

    fn env_call(name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let env = make_global_env();
        let callee = env.get(name);
        let mut ctx = Context::new(env);
        call_value(&mut ctx, &callee, args)
    }

    #[test]
    fn type_names_every_kind() {
        let cases = [
            (Value::Null, "null"),
            (Value::Bool(true), "boolean"),
            (Value::Number(1.0), "number"),
            (Value::Str("s".to_string()), "string"),
            (Value::Table(Rc::new(Table::new())), "table"),
            (Value::Array(Rc::new(RefCell::new(Vec::new()))), "array"),
        ];
        for (value, expected) in cases {
            let result = env_call("type", vec![value]).unwrap();
            assert!(result.is_equal(&Value::Str(expected.to_string())));
        }
    }

    #[test]
    fn num_parses_strings_and_passes_numbers() {
        assert!(env_call("num", vec![Value::Str("3.5".to_string())])
            .unwrap()
            .is_equal(&Value::Number(3.5)));
        assert!(env_call("num", vec![Value::Number(2.0)])
            .unwrap()
            .is_equal(&Value::Number(2.0)));
        assert!(matches!(
            env_call("num", vec![Value::Str("abc".to_string())]).unwrap(),
            Value::Null
        ));
        assert!(matches!(env_call("num", vec![]).unwrap(), Value::Null));
    }

    #[test]
    fn error_raises_with_its_argument() {
        let err = env_call("error", vec![Value::Str("boom".to_string())]).expect_err("must fail");
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn readfile_on_a_missing_path_is_null() {
        assert!(matches!(
            env_call("readfile", vec![Value::Str("/no/such/file".to_string())]).unwrap(),
            Value::Null
        ));
    }

    #[test]
    fn getset_pairs_up_its_arguments() {
        let pair = env_call("getset", vec![Value::Null, Value::Null]).unwrap();
        assert!(matches!(pair, Value::GetSet(_)));
    }

    #[test]
    fn runstring_merges_globals_and_yields_null_on_error() {
        let env = make_global_env();
        let runner = env.get("runstring");
        let mut ctx = Context::new(env);

        let value = call_value(
            &mut ctx,
            &runner,
            vec![Value::Str("shared = 11; return shared;".to_string())],
        )
        .unwrap();
        assert!(value.is_equal(&Value::Number(11.0)));
        assert!(ctx.get_global_var("shared").is_equal(&Value::Number(11.0)));

        // A nested failure of any stage reads as null and merges nothing.
        let value = call_value(
            &mut ctx,
            &runner,
            vec![Value::Str("broken = ;".to_string())],
        )
        .unwrap();
        assert!(matches!(value, Value::Null));
        assert!(matches!(ctx.get_global_var("broken"), Value::Null));
    }

    #[test]
    fn debug_ctx_exposes_the_scope_stack() {
        let env = make_global_env();
        let debug = env.get("debug");
        let Value::Table(debug) = debug else {
            panic!("expected the debug table");
        };
        let ctx_fn = debug.get("ctx");
        let push_fn = debug.get("ctxpush");
        let pop_fn = debug.get("ctxpop");

        let mut ctx = Context::new(env.clone());
        let frame = call_value(&mut ctx, &ctx_fn, vec![]).unwrap();
        let Value::Table(frame) = frame else {
            panic!("expected a frame table");
        };
        assert!(Rc::ptr_eq(&frame, &env));

        call_value(&mut ctx, &push_fn, vec![]).unwrap();
        assert_eq!(ctx.depth(), 2);
        call_value(&mut ctx, &pop_fn, vec![]).unwrap();
        call_value(&mut ctx, &pop_fn, vec![]).unwrap();
        assert_eq!(ctx.depth(), 1);
    }
}
