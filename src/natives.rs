use crate::callable::{Callable, NativeFunction};
use crate::environment::Environment;
use crate::interpreter::{Interpreter, RuntimeError};
use crate::token::Token;
use crate::value::Value;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const NATIVES: &[NativeFunction] = &[
    NativeFunction { name: "clock", arity: 0, call: clock },
    NativeFunction { name: "print", arity: 1, call: print },
    NativeFunction { name: "println", arity: 1, call: println },
    NativeFunction { name: "random", arity: 2, call: random },
    NativeFunction { name: "assert", arity: 1, call: assert },
    NativeFunction { name: "substr", arity: 3, call: substr },
    NativeFunction { name: "length", arity: 1, call: length },
    NativeFunction { name: "nextLine", arity: 0, call: next_line },
    NativeFunction { name: "nextInt", arity: 0, call: next_int },
    NativeFunction { name: "nextDouble", arity: 0, call: next_double },
];

pub fn define_globals(globals: &Environment) {
    for native in NATIVES {
        globals.define(native.name, true, Value::Callable(Callable::Native(*native)));
    }
}

fn string_arg<'v>(args: &'v [Value], index: usize, function: &str, paren: &Token) -> Result<&'v str, RuntimeError> {
    match &args[index] {
        Value::String(x) => Ok(x.as_str()),
        other => Err(wrong_type("string", index, function, other, paren)),
    }
}

fn number_arg(args: &[Value], index: usize, function: &str, paren: &Token) -> Result<f64, RuntimeError> {
    match &args[index] {
        Value::Number(x) => Ok(*x),
        other => Err(wrong_type("number", index, function, other, paren)),
    }
}

fn wrong_type(expected: &str, index: usize, function: &str, got: &Value, paren: &Token) -> RuntimeError {
    RuntimeError::new(
        paren,
        format!(
            "Expected {} as argument {} to {}, got {}.",
            expected,
            index + 1,
            function,
            got.type_name()
        ),
    )
}

fn clock(_: &mut Interpreter, _: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| RuntimeError::new(paren, format!("Clock is before the epoch: {}", e)))?;
    Ok(Value::Number(now.as_secs_f64()))
}

fn print(interpreter: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    interpreter.write_output(&args[0].to_string(), paren)?;
    Ok(Value::Nil)
}

fn println(interpreter: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    interpreter.write_output(&format!("{}\n", args[0]), paren)?;
    Ok(Value::Nil)
}

fn random(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let low = number_arg(args, 0, "random", paren)?;
    let high = number_arg(args, 1, "random", paren)?;
    let mut rng = rand::thread_rng();
    Ok(Value::Number(low + rng.gen::<f64>() * (high - low)))
}

fn assert(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    if args[0].is_truthy() {
        Ok(Value::Nil)
    } else {
        Err(RuntimeError::new(paren, "Assertion failed"))
    }
}

// Indices count characters, end exclusive.
fn substr(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let string = string_arg(args, 0, "substr", paren)?;
    let start = number_arg(args, 1, "substr", paren)?;
    let end = number_arg(args, 2, "substr", paren)?;
    let length = string.chars().count();
    if start < 0.0 || end < start || end > length as f64 || start.fract() != 0.0 || end.fract() != 0.0 {
        return Err(RuntimeError::new(
            paren,
            format!(
                "substr range [{}, {}) is out of bounds for length {}.",
                start, end, length
            ),
        ));
    }
    let (start, end) = (start as usize, end as usize);
    Ok(Value::String(string.chars().skip(start).take(end - start).collect()))
}

fn length(_: &mut Interpreter, args: &[Value], paren: &Token) -> Result<Value, RuntimeError> {
    let string = string_arg(args, 0, "length", paren)?;
    Ok(Value::Number(string.chars().count() as f64))
}

fn next_line(interpreter: &mut Interpreter, _: &[Value], _: &Token) -> Result<Value, RuntimeError> {
    Ok(interpreter.read_line().map_or(Value::Nil, Value::String))
}

fn next_int(interpreter: &mut Interpreter, _: &[Value], _: &Token) -> Result<Value, RuntimeError> {
    Ok(interpreter
        .read_line()
        .and_then(|line| line.trim().parse::<i64>().ok())
        .map_or(Value::Nil, |x| Value::Number(x as f64)))
}

fn next_double(interpreter: &mut Interpreter, _: &[Value], _: &Token) -> Result<Value, RuntimeError> {
    Ok(interpreter
        .read_line()
        .and_then(|line| line.trim().parse::<f64>().ok())
        .map_or(Value::Nil, Value::Number))
}
