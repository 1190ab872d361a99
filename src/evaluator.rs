use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{BinaryOp, Literal, Node};
use crate::environment::Context;
use crate::error::RuntimeError;
use crate::types::{builtin_method, Function, Table, TableKey, Value};

/// What a node evaluation produced: either a plain value or a return signal
/// travelling up to the nearest function container.
pub enum Flow {
    Value(Value),
    Return(Value),
}

impl Flow {
    fn into_value(self) -> Value {
        match self {
            Flow::Value(v) | Flow::Return(v) => v,
        }
    }
}

type EvalFlow = Result<Flow, RuntimeError>;

/// Evaluates a parsed program against a context. The public entry point;
/// any return signal escaping the root is unwrapped into its value.
pub fn evaluate(node: &Node, ctx: &mut Context) -> Result<Value, RuntimeError> {
    Ok(eval(node, ctx)?.into_value())
}

/// Evaluates a node in expression position, where a return signal cannot
/// occur by construction.
fn eval_value(node: &Node, ctx: &mut Context) -> Result<Value, RuntimeError> {
    Ok(eval(node, ctx)?.into_value())
}

fn eval(node: &Node, ctx: &mut Context) -> EvalFlow {
    match node {
        Node::Literal(literal) => Ok(Flow::Value(match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::Str(s) => Value::Str(s.clone()),
        })),

        Node::Variable { name, global } => Ok(Flow::Value(if *global {
            ctx.get_global_var(name)
        } else {
            ctx.get_var(name)
        })),

        Node::Binary { left, right, op } => Ok(Flow::Value(eval_binary(left, right, *op, ctx)?)),

        Node::Not(expr) => Ok(Flow::Value(Value::Bool(!eval_value(expr, ctx)?.truthy()))),

        Node::Negate(expr) => match eval_value(expr, ctx)? {
            Value::Number(n) => Ok(Flow::Value(Value::Number(-n))),
            _ => Err(RuntimeError::new("Tried negating a non number value")),
        },

        Node::Copy(expr) => Ok(Flow::Value(eval_value(expr, ctx)?.deep_copy())),

        Node::TableGet { value, name } => {
            let receiver = eval_value(value, ctx)?;
            Ok(Flow::Value(member_get(ctx, &receiver, name)?))
        }

        Node::TableGetExpr { value, key } => {
            let receiver = eval_value(value, ctx)?;
            let key = eval_value(key, ctx)?;
            Ok(Flow::Value(index_get(ctx, &receiver, &key)?))
        }

        Node::TableSet { target, name, value } => {
            let receiver = eval_value(target, ctx)?;
            let Value::Table(table) = &receiver else {
                return Err(RuntimeError::new(
                    "Tried assigning a property to a non table value",
                ));
            };
            let new_value = eval_value(value, ctx)?;
            slot_set(ctx, table, TableKey::from(name.as_str()), new_value.clone())?;
            Ok(Flow::Value(new_value))
        }

        Node::TableSetExpr { target, key, value } => {
            let receiver = eval_value(target, ctx)?;
            let key = eval_value(key, ctx)?;
            let new_value = eval_value(value, ctx)?;
            match &receiver {
                Value::Table(table) => {
                    slot_set(ctx, table, TableKey::from(&key), new_value.clone())?;
                }
                Value::Array(array) => {
                    let index = array_index(&key, array.borrow().len())?;
                    array.borrow_mut()[index] = new_value.clone();
                }
                _ => {
                    return Err(RuntimeError::new(
                        "Tried assigning a property to a non table value",
                    ))
                }
            }
            Ok(Flow::Value(new_value))
        }

        Node::TableLiteral(pairs) => {
            let table = Rc::new(Table::new());
            for (key, value) in pairs {
                let key = eval_value(key, ctx)?;
                let value = eval_value(value, ctx)?;
                table.set(TableKey::from(&key), value);
            }
            Ok(Flow::Value(Value::Table(table)))
        }

        Node::ArrayLiteral(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(eval_value(element, ctx)?);
            }
            Ok(Flow::Value(Value::Array(Rc::new(RefCell::new(values)))))
        }

        Node::Block(statements) => {
            let mut last = Value::Null;
            for statement in statements {
                match eval(statement, ctx)? {
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Value(v) => last = v,
                }
            }
            Ok(Flow::Value(last))
        }

        // Catches the return signal. The top-level container runs in the
        // frame it was given; a `pass` container gets a frame of its own.
        Node::FuncContainer { body, top_level } => {
            if !top_level {
                ctx.push(None);
            }
            let result = eval(body, ctx);
            if !top_level {
                ctx.pop();
            }
            Ok(Flow::Value(result?.into_value()))
        }

        Node::ScopeContainer(body) => {
            ctx.push(None);
            let result = eval(body, ctx);
            ctx.pop();
            result
        }

        Node::FuncDef { name, params, body } => {
            ctx.set_var(
                name,
                Value::Function(Rc::new(Function::new(params.clone(), Rc::clone(body)))),
            );
            Ok(Flow::Value(Value::Null))
        }

        // A fresh closure on every evaluation, so two runs over the same
        // literal never share binding state.
        Node::FuncLiteral { params, body } => Ok(Flow::Value(Value::Function(Rc::new(
            Function::new(params.clone(), Rc::clone(body)),
        )))),

        // Arguments evaluate left to right before the callee resolves.
        Node::Call { callee, args } => {
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(eval_value(arg, ctx)?);
            }
            let callee = eval_value(callee, ctx)?;
            Ok(Flow::Value(call_value(ctx, &callee, arg_values)?))
        }

        Node::Return(expr) => {
            let value = match expr {
                Some(expr) => eval_value(expr, ctx)?,
                None => Value::Null,
            };
            Ok(Flow::Return(value))
        }

        Node::Assign { name, global, value } => {
            let new_value = eval_value(value, ctx)?;
            let current = if *global {
                ctx.get_global_var(name)
            } else {
                ctx.get_var(name)
            };
            // A table holding a callable __assign__ slot intercepts the
            // assignment instead of being replaced.
            if let Value::Table(table) = &current {
                let hook = table.get("__assign__");
                if hook.is_callable() {
                    if let Value::Function(f) = &hook {
                        *f.self_ref.borrow_mut() = current.clone();
                    }
                    call_value(ctx, &hook, vec![new_value.clone()])?;
                    return Ok(Flow::Value(new_value));
                }
            }
            ctx.assign_var(name, new_value.clone(), *global);
            Ok(Flow::Value(new_value))
        }

        Node::IncDec { name, dec, prefix } => {
            let Value::Number(n) = ctx.local().get(name.as_str()) else {
                return Err(RuntimeError::new(if *dec {
                    "Tried decrementing a non number value"
                } else {
                    "Tried incrementing a non number value"
                }));
            };
            let updated = if *dec { n - 1.0 } else { n + 1.0 };
            ctx.set_var(name, Value::Number(updated));
            Ok(Flow::Value(Value::Number(if *prefix { updated } else { n })))
        }

        // Declaring an existing global again must not wipe its value.
        Node::GlobalDecl(name) => {
            if !ctx.global().exists(name.as_str()) {
                ctx.set_global_var(name, Value::Null);
            }
            Ok(Flow::Value(Value::Null))
        }

        Node::If { cond, body } => {
            if eval_value(cond, ctx)?.truthy() {
                return eval(body, ctx);
            }
            Ok(Flow::Value(Value::Null))
        }

        Node::While { cond, body } => {
            while eval_value(cond, ctx)?.truthy() {
                if let Flow::Return(v) = eval(body, ctx)? {
                    return Ok(Flow::Return(v));
                }
            }
            Ok(Flow::Value(Value::Null))
        }

        Node::For { var, start, end, body } => {
            let Value::Number(start) = eval_value(start, ctx)? else {
                return Err(RuntimeError::new(
                    "The start value of a for loop must be a number",
                ));
            };
            let Value::Number(end) = eval_value(end, ctx)? else {
                return Err(RuntimeError::new(
                    "The end value of a for loop must be a number",
                ));
            };

            let mut i = start;
            while i < end {
                ctx.set_var(var, Value::Number(i));
                if let Flow::Return(v) = eval(body, ctx)? {
                    return Ok(Flow::Return(v));
                }
                i += 1.0;
            }
            // The loop variable is left at the end value.
            ctx.set_var(var, Value::Number(i));
            Ok(Flow::Value(Value::Null))
        }

        Node::Foreach { var, array, body } => {
            let Value::Array(array) = eval_value(array, ctx)? else {
                return Err(RuntimeError::new("Tried iterating over a non array value"));
            };
            // Snapshot, so the body may mutate the array without skewing
            // the iteration.
            let items: Vec<Value> = array.borrow().clone();
            for item in items {
                ctx.set_var(var, item);
                if let Flow::Return(v) = eval(body, ctx)? {
                    return Ok(Flow::Return(v));
                }
            }
            Ok(Flow::Value(Value::Null))
        }

        Node::Pass { name, body } => {
            let value = eval(body, ctx)?.into_value();
            ctx.assign_var(name, value, false);
            Ok(Flow::Value(Value::Null))
        }
    }
}

/// Invokes a callable with the closure call contract: the frame is the
/// persistent set_ctx table when one is installed, otherwise fresh; `this`
/// and `__args__` are bound before the parameters.
pub fn call_value(
    ctx: &mut Context,
    callee: &Value,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    match callee {
        Value::Function(function) => {
            let frame = function
                .set_ctx
                .borrow()
                .clone()
                .unwrap_or_else(|| Rc::new(Table::new()));
            frame.set("this", function.self_ref.borrow().clone());
            frame.set(
                "__args__",
                Value::Array(Rc::new(RefCell::new(args.clone()))),
            );
            for (i, param) in function.params.iter().enumerate() {
                frame.set(param.as_str(), args.get(i).cloned().unwrap_or(Value::Null));
            }

            ctx.push(Some(frame));
            let result = eval(&function.body, ctx);
            ctx.pop();

            match result? {
                Flow::Return(v) => Ok(v),
                Flow::Value(_) => Ok(Value::Null),
            }
        }
        Value::NativeFn(native) => (native.call)(ctx, args, native.owner.clone()),
        _ => Err(RuntimeError::new("Tried calling a non callable value.")),
    }
}

/// Fixed-name member access (`.` and `->`). Getset slots run their getter,
/// stored closures get the table bound as their transient self, strings and
/// arrays expose built-in methods, and everything else reads as null.
fn member_get(ctx: &mut Context, receiver: &Value, name: &str) -> Result<Value, RuntimeError> {
    match receiver {
        Value::Table(table) => slot_get(ctx, receiver, table.get(name)),
        Value::Str(_) | Value::Array(_) => {
            Ok(builtin_method(receiver, name).unwrap_or(Value::Null))
        }
        _ => Ok(Value::Null),
    }
}

/// Computed indexing. Tables accept any key and behave like fixed-name
/// access; arrays require a numeric in-bounds index; strings and arrays
/// reached with a string key fall back to their built-in methods.
fn index_get(ctx: &mut Context, receiver: &Value, key: &Value) -> Result<Value, RuntimeError> {
    match receiver {
        Value::Table(table) => slot_get(ctx, receiver, table.get(TableKey::from(key))),
        Value::Array(array) => match key {
            Value::Str(name) => Ok(builtin_method(receiver, name).unwrap_or(Value::Null)),
            _ => {
                let index = array_index(key, array.borrow().len())?;
                Ok(array.borrow()[index].clone())
            }
        },
        Value::Str(_) => match key {
            Value::Str(name) => Ok(builtin_method(receiver, name).unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        },
        _ => Ok(Value::Null),
    }
}

/// Resolves a value into a usable array index. Only non-negative whole
/// numbers qualify; anything else would alias a slot it does not name.
fn array_index(key: &Value, len: usize) -> Result<usize, RuntimeError> {
    let Value::Number(n) = key else {
        return Err(RuntimeError::new("The index of an array must be a number"));
    };
    if *n < 0.0 || n.fract() != 0.0 {
        return Err(RuntimeError::new(format!(
            "The index of an array must be a non negative whole number, got {n}"
        )));
    }
    let index = *n as usize;
    if index >= len {
        return Err(RuntimeError::new(format!(
            "Index out of bounds: {index} is greater than the array size {len}"
        )));
    }
    Ok(index)
}

fn slot_get(ctx: &mut Context, receiver: &Value, stored: Value) -> Result<Value, RuntimeError> {
    match stored {
        Value::GetSet(getset) => {
            if getset.getter.is_callable() {
                if let Value::Function(f) = &getset.getter {
                    *f.self_ref.borrow_mut() = receiver.clone();
                }
                call_value(ctx, &getset.getter, Vec::new())
            } else {
                Ok(Value::Null)
            }
        }
        Value::Function(f) => {
            *f.self_ref.borrow_mut() = receiver.clone();
            Ok(Value::Function(f))
        }
        other => Ok(other),
    }
}

/// Writes a table slot, letting an existing getset pair intercept the
/// write. A pair without a setter swallows the write entirely.
fn slot_set(
    ctx: &mut Context,
    table: &Rc<Table>,
    key: TableKey,
    value: Value,
) -> Result<Value, RuntimeError> {
    if let Value::GetSet(getset) = table.get(key.clone()) {
        if getset.setter.is_callable() {
            if let Value::Function(f) = &getset.setter {
                *f.self_ref.borrow_mut() = Value::Table(table.clone());
            }
            call_value(ctx, &getset.setter, vec![value])?;
        }
        return Ok(Value::Null);
    }
    table.set(key, value);
    Ok(Value::Null)
}

fn eval_binary(
    left: &Node,
    right: &Node,
    op: BinaryOp,
    ctx: &mut Context,
) -> Result<Value, RuntimeError> {
    // and/or short-circuit and always yield a boolean.
    match op {
        BinaryOp::And => {
            if !eval_value(left, ctx)?.truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(eval_value(right, ctx)?.truthy()));
        }
        BinaryOp::Or => {
            if eval_value(left, ctx)?.truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(eval_value(right, ctx)?.truthy()));
        }
        _ => {}
    }

    let left = eval_value(left, ctx)?;
    let right = eval_value(right, ctx)?;

    match op {
        BinaryOp::EqualEqual => return Ok(Value::Bool(left.is_equal(&right))),
        BinaryOp::BangEqual => return Ok(Value::Bool(!left.is_equal(&right))),
        _ => {}
    }

    if op == BinaryOp::Plus {
        return match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Str(a), Value::Number(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Number(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(type_error(op, &left, &right)),
        };
    }

    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        return Err(type_error(op, &left, &right));
    };

    Ok(match op {
        BinaryOp::Minus => Value::Number(a - b),
        BinaryOp::Star => Value::Number(a * b),
        // IEEE division; dividing by zero yields an infinity, not an error.
        BinaryOp::Slash => Value::Number(a / b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEqual => Value::Bool(a >= b),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEqual => Value::Bool(a <= b),
        BinaryOp::Plus
        | BinaryOp::EqualEqual
        | BinaryOp::BangEqual
        | BinaryOp::And
        | BinaryOp::Or => unreachable!("handled above"),
    })
}

fn type_error(op: BinaryOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::new(format!(
        "Unsupported operands for '{}': {} and {}",
        op.symbol(),
        left.kind(),
        right.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;
    use crate::types::GetSet;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> Result<Value, RuntimeError> {
        let tokens = tokenize(source).expect("scan failed");
        let program = Parser::new(tokens).parse().expect("parse failed");
        let mut ctx = Context::new(Rc::new(Table::new()));
        evaluate(&program, &mut ctx)
    }

    fn run_number(source: &str) -> f64 {
        match run(source).expect("runtime error") {
            Value::Number(n) => n,
            other => panic!("expected a number, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(run_number("return 1 + 2 * 3;"), 7.0);
        assert_eq!(run_number("return (1 + 2) * 3;"), 9.0);
    }

    #[test]
    fn division_by_zero_is_infinite() {
        assert_eq!(run_number("return 1 / 0;"), f64::INFINITY);
    }

    #[test]
    fn string_concatenation_mixes_numbers() {
        let value = run("return \"n=\" + 2;").expect("runtime error");
        assert!(value.is_equal(&Value::Str("n=2".to_string())));
    }

    #[test]
    fn undeclared_reads_are_null() {
        assert!(matches!(run("return nothing;").unwrap(), Value::Null));
    }

    #[test]
    fn functions_return_null_without_return() {
        assert!(matches!(
            run("func f() { 1 + 1; } return f();").unwrap(),
            Value::Null
        ));
    }

    #[test]
    fn function_arguments_bind_positionally() {
        assert_eq!(
            run_number("func add(a, b) { return a + b; } return add(2, 3);"),
            5.0
        );
        // Missing arguments read as null.
        assert!(matches!(
            run("func id(a) { return a; } return id();").unwrap(),
            Value::Null
        ));
    }

    #[test]
    fn args_array_collects_every_argument() {
        assert_eq!(
            run_number("func count() { return __args__.size(); } return count(1, 2, 3);"),
            3.0
        );
    }

    #[test]
    fn calling_a_number_is_an_error() {
        let err = run("x = 5; x();").expect_err("should fail");
        assert_eq!(err.message, "Tried calling a non callable value.");
    }

    #[test]
    fn member_call_binds_this() {
        assert_eq!(
            run_number(
                "obj = { \"v\": 41, \"get\": func() { return this.v + 1; } };\n\
                 return obj.get();"
            ),
            42.0
        );
    }

    #[test]
    fn for_loop_leaves_the_end_value() {
        assert_eq!(run_number("s = 0; for (i, 0, 3) { s = s + i; } return s;"), 3.0);
        assert_eq!(run_number("for (i, 0, 3) { } return i;"), 3.0);
    }

    #[test]
    fn foreach_requires_an_array() {
        let err = run("foreach (x : { \"a\": 1 }) { }").expect_err("should fail");
        assert_eq!(err.message, "Tried iterating over a non array value");
        assert_eq!(run_number("s = 0; foreach (x : [1, 2, 3]) { s = s + x; } return s;"), 6.0);
    }

    #[test]
    fn while_respects_truthiness() {
        assert_eq!(run_number("n = 0; while (n < 4) { n = n + 1; } return n;"), 4.0);
    }

    #[test]
    fn global_declaration_survives_function_frames() {
        assert_eq!(
            run_number(
                "global g;\n\
                 g = 0;\n\
                 func bump() { global g; g = g + 1; }\n\
                 bump(); bump();\n\
                 return g;"
            ),
            2.0
        );
    }

    #[test]
    fn dollar_reads_and_writes_the_global_frame() {
        assert_eq!(
            run_number("x = 1; func f() { $x = 5; return $x; } return f();"),
            5.0
        );
    }

    #[test]
    fn new_copies_tables_structurally() {
        assert_eq!(
            run_number(
                "a = { \"inner\": { \"n\": 1 } };\n\
                 b = new a;\n\
                 b.inner.n = 9;\n\
                 return a.inner.n;"
            ),
            1.0
        );
    }

    #[test]
    fn tables_compare_by_identity_values_by_content() {
        let value = run("a = {}; b = {}; return a == b;").unwrap();
        assert!(value.is_equal(&Value::Bool(false)));
        let value = run("a = {}; b = a; return a == b;").unwrap();
        assert!(value.is_equal(&Value::Bool(true)));
        let value = run("return \"x\" == \"x\";").unwrap();
        assert!(value.is_equal(&Value::Bool(true)));
    }

    #[test]
    fn array_indexing_is_bounds_checked() {
        assert_eq!(run_number("a = [10, 20]; return a[1];"), 20.0);
        let err = run("a = [10, 20]; return a[2];").expect_err("should fail");
        assert_eq!(
            err.message,
            "Index out of bounds: 2 is greater than the array size 2"
        );
        let err = run("a = [1]; return a[true];").expect_err("should fail");
        assert_eq!(err.message, "The index of an array must be a number");
    }

    #[test]
    fn negative_and_fractional_indices_are_rejected() {
        let err = run("a = [10, 20]; return a[-1];").expect_err("should fail");
        assert_eq!(
            err.message,
            "The index of an array must be a non negative whole number, got -1"
        );
        // A negative write must not land on slot 0.
        let err = run("a = [10, 20]; a[-1] = 99;").expect_err("should fail");
        assert_eq!(
            err.message,
            "The index of an array must be a non negative whole number, got -1"
        );
        let err = run("a = [10, 20]; return a[0.9];").expect_err("should fail");
        assert_eq!(
            err.message,
            "The index of an array must be a non negative whole number, got 0.9"
        );
        let err = run("a = [1, 2]; a.pop(-1);").expect_err("should fail");
        assert_eq!(err.message, "pop expects a non negative whole number, got -1");
        let err = run("return \"hello\".sub(-1);").expect_err("should fail");
        assert_eq!(err.message, "sub expects a non negative whole number, got -1");
    }

    #[test]
    fn string_methods_work_through_members() {
        assert_eq!(run_number("return \"hello\".size();"), 5.0);
        let value = run("return \"hello\".sub(1, 3);").unwrap();
        assert!(value.is_equal(&Value::Str("el".to_string())));
        let value = run("return \"hello\".match(\"ell\");").unwrap();
        assert!(value.is_equal(&Value::Bool(true)));
        let value = run("return \"aba\".replace(\"a\", \"c\");").unwrap();
        assert!(value.is_equal(&Value::Str("cbc".to_string())));
    }

    #[test]
    fn array_methods_mutate_in_place() {
        assert_eq!(run_number("a = []; a.add(7); a.add(8); return a[0] + a.size();"), 9.0);
        assert_eq!(run_number("a = [1, 2, 3]; a.pop(0); return a[0];"), 2.0);
        let err = run("a = []; a.pop(0);").expect_err("should fail");
        assert_eq!(
            err.message,
            "Index out of bounds: 0 is greater than the array size 0"
        );
        assert_eq!(run_number("a = [1, 2]; a.clear(); return a.size();"), 0.0);
    }

    #[test]
    fn increments_are_local_and_numeric_only() {
        assert_eq!(run_number("i = 1; i++; return i;"), 2.0);
        assert_eq!(run_number("i = 1; return ++i;"), 2.0);
        assert_eq!(run_number("i = 1; return i++;"), 1.0);
        let err = run("s = \"x\"; s++;").expect_err("should fail");
        assert_eq!(err.message, "Tried incrementing a non number value");
        let err = run("d--;").expect_err("should fail");
        assert_eq!(err.message, "Tried decrementing a non number value");
    }

    #[test]
    fn bare_scope_pushes_a_frame() {
        assert!(matches!(
            run("x = 1; { x = 2; y = 3; } return y;").unwrap(),
            Value::Null
        ));
        // An outer name already visible falls through the local frame.
        assert_eq!(run_number("x = 1; { r = x; } return x;"), 1.0);
    }

    #[test]
    fn pass_assigns_the_block_return() {
        assert_eq!(run_number("pass v { return 2 + 3; }; return v;"), 5.0);
        assert!(matches!(run("pass v { 1; }; return v;").unwrap(), Value::Null));
    }

    #[test]
    fn function_literals_produce_fresh_closures() {
        assert_eq!(
            run_number(
                "func make() { return func(n) { return n * 2; }; }\n\
                 f = make(); g = make();\n\
                 same = f == g;\n\
                 if (same) { return 0; }\n\
                 return f(21);"
            ),
            42.0
        );
    }

    #[test]
    fn assignment_to_non_assignable_lhs_is_discarded() {
        assert_eq!(run_number("x = 3; x + 1 = 99; return x;"), 3.0);
    }

    #[test]
    fn and_or_short_circuit_to_booleans() {
        let value = run("return false and missing();").unwrap();
        assert!(value.is_equal(&Value::Bool(false)));
        let value = run("return true or missing();").unwrap();
        assert!(value.is_equal(&Value::Bool(true)));
        let value = run("return 1 and 2;").unwrap();
        assert!(value.is_equal(&Value::Bool(true)));
    }

    #[test]
    fn getset_slots_intercept_reads_and_writes() {
        let mut ctx = Context::new(Rc::new(Table::new()));
        let table = Rc::new(Table::new());
        table.set("backing", Value::Number(1.0));
        let tokens = tokenize("return func() { return this.backing; };").unwrap();
        let getter_prog = Parser::new(tokens).parse().unwrap();
        let getter = evaluate(&getter_prog, &mut ctx).unwrap();
        table.set(
            "prop",
            Value::GetSet(Rc::new(GetSet {
                getter,
                setter: Value::Null,
            })),
        );

        let receiver = Value::Table(table.clone());
        let read = member_get(&mut ctx, &receiver, "prop").unwrap();
        assert!(read.is_equal(&Value::Number(1.0)));

        // No setter: the write is swallowed and the slot keeps the pair.
        slot_set(&mut ctx, &table, TableKey::from("prop"), Value::Number(9.0)).unwrap();
        let read = member_get(&mut ctx, &receiver, "prop").unwrap();
        assert!(read.is_equal(&Value::Number(1.0)));
    }

    #[test]
    fn assign_hook_intercepts_variable_assignment() {
        assert_eq!(
            run_number(
                "box = { \"held\": 0 };\n\
                 box.__assign__ = func(v) { this.held = v; };\n\
                 box = 7;\n\
                 return box.held;"
            ),
            7.0
        );
    }

    #[test]
    fn table_keys_may_be_any_primitive() {
        assert_eq!(run_number("t = {}; t[1.5] = 10; t[true] = 20; return t[1.5] + t[true];"), 30.0);
    }

    #[test]
    fn return_unwinds_through_loops_and_scopes() {
        assert_eq!(
            run_number(
                "func find(items, wanted) {\n\
                     foreach (item : items) {\n\
                         if (item == wanted) { return item; }\n\
                     }\n\
                     return -1;\n\
                 }\n\
                 return find([4, 5, 6], 5);"
            ),
            5.0
        );
    }
}
