//! Expression evaluation.
//!
//! Coercion rules:
//!
//! - `==`/`!=` compare numerically when both sides are numbers (booleans count
//!   as 0/1) and by text when both are strings (choices by label). A number
//!   never equals a string: `1 == '1'` is false.
//! - Ordering operators need two numbers or two strings.
//! - Arithmetic and bitwise operators coerce booleans and integer-looking
//!   strings to integers. Only `+ - * /` accept decimals.
//! - Logical operators use [`Value::is_truthy`].

use std::cmp::Ordering;

use super::{BinaryOp, Expr, UnaryOp};
use crate::{
    env::Environment,
    error::{EvalError, EvalResult},
    value::{Number, Value},
};

/// Evaluate `expr` against `env`.
pub fn evaluate(expr: &Expr, env: &Environment) -> EvalResult<Value> {
    match expr {
        Expr::Literal(lit) => Ok(lit.to_value()),
        Expr::Var(name) => lookup(env, name),
        Expr::Negation(name) => Ok(Value::Bool(!lookup(env, name)?.is_truthy())),
        Expr::SetMembership { name, values } => {
            let value = lookup(env, name)?;
            Ok(Value::Bool(
                values.iter().any(|lit| loose_eq(&value, &lit.to_value())),
            ))
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, env)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                UnaryOp::Neg => match to_number(&value, "-")? {
                    Number::Int(i) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| overflow("-")),
                    Number::Float(f) => Ok(Value::Float(-f)),
                },
            }
        }
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                if !evaluate(left, env)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(evaluate(right, env)?.is_truthy()))
            }
            BinaryOp::Or => {
                if evaluate(left, env)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(evaluate(right, env)?.is_truthy()))
            }
            _ => {
                let l = evaluate(left, env)?;
                let r = evaluate(right, env)?;
                binary(*op, &l, &r)
            }
        },
    }
}

/// Evaluate `expr` and reduce the result to a boolean.
pub fn evaluate_condition(expr: &Expr, env: &Environment) -> EvalResult<bool> {
    evaluate(expr, env).map(|v| v.is_truthy())
}

fn lookup(env: &Environment, name: &str) -> EvalResult<Value> {
    env.lookup(name)
        .map(|v| v.into_owned())
        .ok_or_else(|| EvalError::UnknownReference {
            name: name.to_string(),
        })
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> EvalResult<Value> {
    let sym = op.symbol();
    let value = match op {
        BinaryOp::And => Value::Bool(l.is_truthy() && r.is_truthy()),
        BinaryOp::Or => Value::Bool(l.is_truthy() || r.is_truthy()),
        BinaryOp::Xor => Value::Bool(l.is_truthy() != r.is_truthy()),
        BinaryOp::Eq => Value::Bool(loose_eq(l, r)),
        BinaryOp::Ne => Value::Bool(!loose_eq(l, r)),
        BinaryOp::Gt => Value::Bool(order(l, r, sym)? == Ordering::Greater),
        BinaryOp::Ge => Value::Bool(order(l, r, sym)? != Ordering::Less),
        BinaryOp::Lt => Value::Bool(order(l, r, sym)? == Ordering::Less),
        BinaryOp::Le => Value::Bool(order(l, r, sym)? != Ordering::Greater),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            arithmetic(op, to_number(l, sym)?, to_number(r, sym)?)?
        }
        BinaryOp::Rem => {
            let (a, b) = (to_integer(l, sym)?, to_integer(r, sym)?);
            if b == 0 {
                return Err(EvalError::DivisionByZero { op: sym.into() });
            }
            Value::Int(a.checked_rem(b).ok_or_else(|| overflow(sym))?)
        }
        BinaryOp::Pow => {
            let (base, exp) = (to_integer(l, sym)?, to_integer(r, sym)?);
            let exp = u32::try_from(exp).map_err(|_| overflow(sym))?;
            Value::Int(base.checked_pow(exp).ok_or_else(|| overflow(sym))?)
        }
        BinaryOp::BitAnd => Value::Int(to_integer(l, sym)? & to_integer(r, sym)?),
        BinaryOp::BitOr => Value::Int(to_integer(l, sym)? | to_integer(r, sym)?),
        BinaryOp::BitXor => Value::Int(to_integer(l, sym)? ^ to_integer(r, sym)?),
        BinaryOp::Shl | BinaryOp::Shr => {
            let value = to_integer(l, sym)?;
            let shift = u32::try_from(to_integer(r, sym)?).map_err(|_| overflow(sym))?;
            let shifted = if op == BinaryOp::Shl {
                value.checked_shl(shift)
            } else {
                value.checked_shr(shift)
            };
            Value::Int(shifted.ok_or_else(|| overflow(sym))?)
        }
    };
    Ok(value)
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> EvalResult<Value> {
    let sym = op.symbol();
    if let (Number::Int(a), Number::Int(b)) = (a, b) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            _ => {
                if b == 0 {
                    return Err(EvalError::DivisionByZero { op: sym.into() });
                }
                a.checked_div(b)
            }
        };
        return result.map(Value::Int).ok_or_else(|| overflow(sym));
    }

    let (a, b) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero { op: sym.into() });
            }
            a / b
        }
    };
    Ok(Value::Float(result))
}

/// Equality shared by `==`, `!=` and set membership.
pub(crate) fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l.as_number(), r.as_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        (None, None) => l.as_text() == r.as_text(),
        _ => false,
    }
}

fn order(l: &Value, r: &Value, op: &str) -> EvalResult<Ordering> {
    match (l.as_number(), r.as_number()) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(a.cmp(&b)),
        (Some(a), Some(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .ok_or_else(|| mismatch(op, "comparable numbers", l, r)),
        (None, None) => Ok(l.as_text().cmp(&r.as_text())),
        _ => Err(mismatch(op, "two numbers or two strings", l, r)),
    }
}

fn to_number(value: &Value, op: &str) -> EvalResult<Number> {
    if let Some(n) = value.as_number() {
        return Ok(n);
    }
    parse_integer(value, op).map(Number::Int)
}

fn to_integer(value: &Value, op: &str) -> EvalResult<i64> {
    match value.as_number() {
        Some(Number::Int(i)) => Ok(i),
        Some(Number::Float(_)) => Err(EvalError::TypeMismatch {
            op: op.into(),
            expected: "integer".into(),
            actual: format!("float {}", value.as_text()),
        }),
        None => parse_integer(value, op),
    }
}

fn parse_integer(value: &Value, op: &str) -> EvalResult<i64> {
    let text = value.as_text();
    text.trim().parse::<i64>().map_err(|_| EvalError::TypeMismatch {
        op: op.into(),
        expected: "integer".into(),
        actual: format!("{} {}", value.type_name(), value),
    })
}

fn mismatch(op: &str, expected: &str, l: &Value, r: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.into(),
        expected: expected.into(),
        actual: format!("{} and {}", l.type_name(), r.type_name()),
    }
}

fn overflow(op: &str) -> EvalError {
    EvalError::Overflow { op: op.into() }
}
