//! Expression language for computed properties and derived values
//!
//! Config sources are declarative, so anything that has to be computed from
//! other attributes is written as a small expression:
//!
//! ```text
//! int(TODAYS_TEMP_FEATURE) + int(AVERAGE_TEMP_FEATURE)
//! not TODAYS_TEMP_FEATURE and BATCH_SIZE >= 128
//! ```
//!
//! There are no statements or assignments: only literals, names, operators and
//! a handful of builtin calls.
//!
//! Precedence, lowest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / %`, unary `-`, then calls / literals / names / parentheses.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, multispace0, satisfy},
    combinator::{all_consuming, map, not, opt, recognize, value, verify},
    error::ErrorKind,
    multi::{many0, many0_count, separated_list0, separated_list1},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use serde_json::{Number, Value};
use std::cmp::Ordering;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dotted name: the first segment is an attribute, the rest index into objects
    Name(Vec<String>),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// An expression together with the text it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        match all_consuming(ws(|i| expr(i, 0)))(source) {
            Ok((_, ast)) if tree_depth(&ast) > MAX_TREE_DEPTH => Err(Error::expression(format!(
                "expression is nested more than {} levels deep",
                MAX_TREE_DEPTH
            ))),
            Ok((_, ast)) => Ok(Self { source: source.to_string(), ast }),
            Err(nom::Err::Failure(e)) if e.code == ErrorKind::TooLarge => {
                Err(Error::expression(format!(
                    "expression nests more than {} levels or chains more than {} operands",
                    MAX_NESTING, MAX_OPERANDS
                )))
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let offset = source.len() - e.input.len();
                Err(Error::expression(format!(
                    "cannot parse `{}` at column {}",
                    source,
                    offset + 1
                )))
            }
            Err(nom::Err::Incomplete(_)) => {
                Err(Error::expression(format!("incomplete expression `{}`", source)))
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluate, resolving the first segment of every name through `lookup`.
    pub fn evaluate<F>(&self, lookup: F) -> Result<Value>
    where
        F: Fn(&str) -> Result<Value>,
    {
        eval(&self.ast, &lookup)
    }
}

/// Depth of the evaluation tree, counted without recursing.
fn tree_depth(root: &Expr) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(root, 1)];
    while let Some((node, depth)) = stack.pop() {
        deepest = deepest.max(depth);
        match node {
            Expr::Literal(_) | Expr::Name(_) => {}
            Expr::List(items) | Expr::Call(_, items) => {
                stack.extend(items.iter().map(|item| (item, depth + 1)))
            }
            Expr::Unary(_, inner) => stack.push((inner, depth + 1)),
            Expr::Binary(_, lhs, rhs) => {
                stack.push((lhs, depth + 1));
                stack.push((rhs, depth + 1));
            }
        }
    }
    deepest
}

// =============================================================================
// PARSER
// =============================================================================

/// Parentheses, lists, calls and prefix operators nested inside each other.
const MAX_NESTING: usize = 64;
/// Operands in one chain of same-precedence binary operators.
const MAX_OPERANDS: usize = 256;
/// Evaluation recurses once per tree level.
const MAX_TREE_DEPTH: usize = 512;

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| terminated(tag(kw), not(satisfy(|c: char| c.is_alphanumeric() || c == '_')))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(alt((alpha1, tag("_"))), many0_count(alt((alphanumeric1, tag("_"))))))(input)
}

fn is_reserved(word: &str) -> bool {
    matches!(word, "and" | "or" | "not")
}

fn too_deep(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge))
}

fn nesting(input: &str, depth: usize) -> IResult<&str, ()> {
    if depth > MAX_NESTING {
        return Err(too_deep(input));
    }
    Ok((input, ()))
}

fn fold(input: &str, first: Expr, rest: Vec<(BinaryOp, Expr)>) -> IResult<&str, Expr> {
    if rest.len() >= MAX_OPERANDS {
        return Err(too_deep(input));
    }
    let folded = rest
        .into_iter()
        .fold(first, |lhs, (op, rhs)| Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
    Ok((input, folded))
}

fn expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, ()) = nesting(input, depth)?;
    or_expr(input, depth)
}

fn or_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input, depth)?;
    let (input, rest) = many0(map(preceded(ws(keyword("or")), |i| and_expr(i, depth)), |e| {
        (BinaryOp::Or, e)
    }))(input)?;
    fold(input, first, rest)
}

fn and_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input, depth)?;
    let (input, rest) = many0(map(preceded(ws(keyword("and")), |i| not_expr(i, depth)), |e| {
        (BinaryOp::And, e)
    }))(input)?;
    fold(input, first, rest)
}

fn not_expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, ()) = nesting(input, depth)?;
    alt((
        map(preceded(ws(keyword("not")), |i| not_expr(i, depth + 1)), |e| {
            Expr::Unary(UnaryOp::Not, Box::new(e))
        }),
        |i| comparison(i, depth),
    ))(input)
}

fn comparison(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, lhs) = sum(input, depth)?;
    let (input, tail) = opt(pair(
        ws(alt((
            value(BinaryOp::Eq, tag("==")),
            value(BinaryOp::Ne, tag("!=")),
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Lt, tag("<")),
            value(BinaryOp::Gt, tag(">")),
        ))),
        |i| sum(i, depth),
    ))(input)?;
    Ok(match tail {
        Some((op, rhs)) => (input, Expr::Binary(op, Box::new(lhs), Box::new(rhs))),
        None => (input, lhs),
    })
}

fn sum(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = term(input, depth)?;
    let (input, rest) = many0(pair(
        ws(alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-'))))),
        |i| term(i, depth),
    ))(input)?;
    fold(input, first, rest)
}

fn term(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) = many0(pair(
        ws(alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
            value(BinaryOp::Mod, char('%')),
        ))),
        |i| unary(i, depth),
    ))(input)?;
    fold(input, first, rest)
}

fn unary(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, ()) = nesting(input, depth)?;
    alt((
        map(preceded(ws(char('-')), |i| unary(i, depth + 1)), |e| {
            Expr::Unary(UnaryOp::Neg, Box::new(e))
        }),
        ws(|i| primary(i, depth)),
    ))(input)
}

fn primary(input: &str, depth: usize) -> IResult<&str, Expr> {
    alt((
        number,
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        |i| list(i, depth + 1),
        delimited(char('('), ws(|i| expr(i, depth + 1)), char(')')),
        |i| call(i, depth + 1),
        constant,
        name,
    ))(input)
}

fn number(input: &str) -> IResult<&str, Expr> {
    // Unary minus is its own operator; a signed literal here would swallow `a -1`.
    let (rest, text) = preceded(not(satisfy(|c| c == '+' || c == '-')), recognize_float)(input)?;
    let is_float = text.contains(['.', 'e', 'E']);
    let literal = if is_float {
        text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
    } else {
        text.parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number))
    };
    match literal {
        Some(v) => Ok((rest, Expr::Literal(v))),
        None => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))),
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    fn escape(input: &str) -> IResult<&str, &str> {
        alt((
            value("\\", char('\\')),
            value("\"", char('"')),
            value("'", char('\'')),
            value("\n", char('n')),
            value("\t", char('t')),
        ))(input)
    }

    alt((
        delimited(
            char('"'),
            map(opt(escaped_transform(is_not("\\\""), '\\', escape)), Option::unwrap_or_default),
            char('"'),
        ),
        delimited(
            char('\''),
            map(opt(escaped_transform(is_not("\\'"), '\\', escape)), Option::unwrap_or_default),
            char('\''),
        ),
    ))(input)
}

fn list(input: &str, depth: usize) -> IResult<&str, Expr> {
    map(
        delimited(
            char('['),
            terminated(separated_list0(char(','), ws(|i| expr(i, depth))), multispace0),
            char(']'),
        ),
        Expr::List,
    )(input)
}

fn call(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, func) = terminated(identifier, multispace0)(input)?;
    let (input, args) = delimited(
        char('('),
        terminated(separated_list0(char(','), ws(|i| expr(i, depth))), multispace0),
        char(')'),
    )(input)?;
    Ok((input, Expr::Call(func.to_string(), args)))
}

fn constant(input: &str) -> IResult<&str, Expr> {
    alt((
        value(Expr::Literal(Value::Bool(true)), alt((keyword("true"), keyword("True")))),
        value(Expr::Literal(Value::Bool(false)), alt((keyword("false"), keyword("False")))),
        value(Expr::Literal(Value::Null), alt((keyword("null"), keyword("None")))),
    ))(input)
}

fn name(input: &str) -> IResult<&str, Expr> {
    map(
        separated_list1(char('.'), verify(identifier, |s: &str| !is_reserved(s))),
        |parts: Vec<&str>| Expr::Name(parts.into_iter().map(str::to_string).collect()),
    )(input)
}

// =============================================================================
// EVALUATION
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Number(n) => n.as_i64().map(Num::Int).or_else(|| n.as_f64().map(Num::Float)),
        _ => None,
    }
}

fn num_value(n: Num) -> Result<Value> {
    match n {
        Num::Int(i) => Ok(Value::from(i)),
        Num::Float(f) => Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| Error::expression(format!("{} is not a representable number", f))),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "table",
    }
}

pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn eval(expr: &Expr, lookup: &dyn Fn(&str) -> Result<Value>) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Name(path) => {
            let mut current = lookup(&path[0])?;
            for (depth, segment) in path.iter().enumerate().skip(1) {
                current = current.get(segment).cloned().ok_or_else(|| {
                    Error::expression(format!(
                        "`{}` has no field `{}`",
                        path[..depth].join("."),
                        segment
                    ))
                })?;
            }
            Ok(current)
        }
        Expr::List(items) => {
            items.iter().map(|e| eval(e, lookup)).collect::<Result<Vec<_>>>().map(Value::Array)
        }
        Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!truthy(&eval(inner, lookup)?))),
        Expr::Unary(UnaryOp::Neg, inner) => {
            let v = eval(inner, lookup)?;
            match as_num(&v) {
                Some(Num::Int(i)) => i
                    .checked_neg()
                    .map(Value::from)
                    .ok_or_else(|| Error::expression("integer overflow")),
                Some(Num::Float(f)) => num_value(Num::Float(-f)),
                None => Err(Error::expression(format!("cannot negate a {}", type_name(&v)))),
            }
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            let l = eval(lhs, lookup)?;
            if truthy(&l) {
                eval(rhs, lookup)
            } else {
                Ok(l)
            }
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let l = eval(lhs, lookup)?;
            if truthy(&l) {
                Ok(l)
            } else {
                eval(rhs, lookup)
            }
        }
        Expr::Binary(op, lhs, rhs) => binary(*op, eval(lhs, lookup)?, eval(rhs, lookup)?),
        Expr::Call(func, args) => {
            let args = args.iter().map(|e| eval(e, lookup)).collect::<Result<Vec<_>>>()?;
            call_builtin(func, args)
        }
    }
}

fn binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => return Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(&l, &r)?;
            let result = match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    if op == BinaryOp::Add {
        match (&l, &r) {
            (Value::String(a), Value::String(b)) => return Ok(Value::String(format!("{a}{b}"))),
            (Value::Array(a), Value::Array(b)) => {
                return Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => {}
        }
    }

    let (a, b) = match (as_num(&l), as_num(&r)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(Error::expression(format!(
                "unsupported operand types for {:?}: {} and {}",
                op,
                type_name(&l),
                type_name(&r)
            )))
        }
    };

    let overflow = || Error::expression("integer overflow");
    match (op, a, b) {
        (BinaryOp::Div, _, _) => {
            if b.as_f64() == 0.0 {
                return Err(Error::expression("division by zero"));
            }
            num_value(Num::Float(a.as_f64() / b.as_f64()))
        }
        (BinaryOp::Add, Num::Int(x), Num::Int(y)) => x.checked_add(y).map(Value::from).ok_or_else(overflow),
        (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => x.checked_sub(y).map(Value::from).ok_or_else(overflow),
        (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => x.checked_mul(y).map(Value::from).ok_or_else(overflow),
        (BinaryOp::Mod, Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(Error::expression("modulo by zero"));
            }
            // Result takes the sign of the divisor.
            let mut rem = x.checked_rem(y).ok_or_else(overflow)?;
            if rem != 0 && (rem < 0) != (y < 0) {
                rem += y;
            }
            Ok(Value::from(rem))
        }
        (op, a, b) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Mod => {
                    if y == 0.0 {
                        return Err(Error::expression("modulo by zero"));
                    }
                    let rem = x % y;
                    if rem != 0.0 && (rem < 0.0) != (y < 0.0) {
                        rem + y
                    } else {
                        rem
                    }
                }
                _ => unreachable!("comparison and logic operators handled above"),
            };
            num_value(Num::Float(result))
        }
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(_), Value::Number(_)) => {
            matches!(compare(l, r), Ok(Ordering::Equal))
        }
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value) -> Result<Ordering> {
    match (l, r) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => match (as_num(l), as_num(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
            (Some(a), Some(b)) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .ok_or_else(|| Error::expression("numbers are not comparable")),
            _ => Err(Error::expression(format!(
                "cannot compare {} with {}",
                type_name(l),
                type_name(r)
            ))),
        },
    }
}

fn call_builtin(func: &str, args: Vec<Value>) -> Result<Value> {
    let single = |args: Vec<Value>| -> Result<Value> {
        let mut args = args;
        if args.len() != 1 {
            return Err(Error::expression(format!(
                "{}() takes exactly one argument ({} given)",
                func,
                args.len()
            )));
        }
        Ok(args.remove(0))
    };

    match func {
        "int" => {
            let v = single(args)?;
            match (&v, as_num(&v)) {
                (_, Some(Num::Int(i))) => Ok(Value::from(i)),
                (_, Some(Num::Float(f))) if f.is_finite() => {
                    let truncated = f.trunc();
                    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
                    if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                        Ok(Value::from(truncated as i64))
                    } else {
                        Err(Error::expression(format!("int() result out of range: {}", f)))
                    }
                }
                (Value::String(s), _) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| Error::expression(format!("invalid literal for int(): `{}`", s))),
                _ => Err(Error::expression(format!("int() cannot convert a {}", type_name(&v)))),
            }
        }
        "float" => {
            let v = single(args)?;
            match (&v, as_num(&v)) {
                (_, Some(n)) => num_value(Num::Float(n.as_f64())),
                (Value::String(s), _) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| Error::expression(format!("invalid literal for float(): `{}`", s)))
                    .and_then(|f| num_value(Num::Float(f))),
                _ => Err(Error::expression(format!("float() cannot convert a {}", type_name(&v)))),
            }
        }
        "bool" => Ok(Value::Bool(truthy(&single(args)?))),
        "str" => Ok(Value::String(match single(args)? {
            Value::String(s) => s,
            other => other.to_string(),
        })),
        "len" => {
            let v = single(args)?;
            let len = match &v {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                _ => return Err(Error::expression(format!("{} has no len()", type_name(&v)))),
            };
            Ok(Value::from(len))
        }
        "min" | "max" => {
            let candidates = match args.as_slice() {
                [Value::Array(items)] => items.clone(),
                _ => args,
            };
            let mut iter = candidates.into_iter();
            let mut best = iter
                .next()
                .ok_or_else(|| Error::expression(format!("{}() of an empty sequence", func)))?;
            for candidate in iter {
                let ord = compare(&candidate, &best)?;
                let better = if func == "min" { ord == Ordering::Less } else { ord == Ordering::Greater };
                if better {
                    best = candidate;
                }
            }
            Ok(best)
        }
        other => Err(Error::expression(format!("unknown function `{}`", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_with(src: &str, vars: Value) -> Result<Value> {
        let expr = Expression::parse(src)?;
        expr.evaluate(|name| {
            vars.get(name)
                .cloned()
                .ok_or_else(|| Error::expression(format!("unknown name {}", name)))
        })
    }

    #[test]
    fn test_name_reference() {
        let v = eval_with("TODAYS_TEMP_FEATURE", json!({"TODAYS_TEMP_FEATURE": false})).expect("eval");
        assert_eq!(v, json!(false));
    }

    #[test]
    fn test_bool_arithmetic_counts_features() {
        let v = eval_with("int(A) + int(B)", json!({"A": true, "B": false})).expect("eval");
        assert_eq!(v, json!(1));
        let v = eval_with("A + A", json!({"A": true})).expect("eval");
        assert_eq!(v, json!(2));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval_with("1 + 2 * 3", json!({})).expect("eval"), json!(7));
        assert_eq!(eval_with("(1 + 2) * 3", json!({})).expect("eval"), json!(9));
        assert_eq!(eval_with("2 - 1 - 1", json!({})).expect("eval"), json!(0));
        assert_eq!(eval_with("-2 * 3", json!({})).expect("eval"), json!(-6));
        assert_eq!(eval_with("not 1 == 2", json!({})).expect("eval"), json!(true));
    }

    #[test]
    fn test_division_is_float() {
        assert_eq!(eval_with("7 / 2", json!({})).expect("eval"), json!(3.5));
        assert_eq!(eval_with("-7 % 3", json!({})).expect("eval"), json!(2));
        assert!(eval_with("1 / 0", json!({})).is_err());
    }

    #[test]
    fn test_logic_returns_operands() {
        assert_eq!(eval_with("0 or 'x'", json!({})).expect("eval"), json!("x"));
        assert_eq!(eval_with("1 and 2", json!({})).expect("eval"), json!(2));
        assert_eq!(eval_with("false and missing", json!({})).expect("eval"), json!(false));
    }

    #[test]
    fn test_floats_and_comparisons() {
        let vars = json!({"LEARNING_RATE": 1e-4, "BATCH_SIZE": 64});
        assert_eq!(eval_with("LEARNING_RATE * 10", vars.clone()).expect("eval"), json!(1e-3));
        assert_eq!(eval_with("BATCH_SIZE >= 64", vars.clone()).expect("eval"), json!(true));
        assert_eq!(eval_with("BATCH_SIZE == 64.0", vars).expect("eval"), json!(true));
    }

    #[test]
    fn test_strings_lists_and_calls() {
        let vars = json!({"NAME": "run", "LAYERS": [64, 128, 32]});
        assert_eq!(eval_with("NAME + '-' + str(3)", vars.clone()).expect("eval"), json!("run-3"));
        assert_eq!(eval_with("len(LAYERS)", vars.clone()).expect("eval"), json!(3));
        assert_eq!(eval_with("max(LAYERS)", vars.clone()).expect("eval"), json!(128));
        assert_eq!(eval_with("min(4, 2, 9)", vars.clone()).expect("eval"), json!(2));
        assert_eq!(eval_with("[1, NAME]", vars).expect("eval"), json!([1, "run"]));
        assert_eq!(eval_with("\"a\\\"b\"", json!({})).expect("eval"), json!("a\"b"));
        assert_eq!(eval_with("''", json!({})).expect("eval"), json!(""));
    }

    #[test]
    fn test_dotted_names_index_tables() {
        let vars = json!({"OPTIMIZER": {"name": "adam", "betas": [0.9, 0.999]}});
        assert_eq!(eval_with("OPTIMIZER.name", vars.clone()).expect("eval"), json!("adam"));
        assert!(eval_with("OPTIMIZER.missing", vars).is_err());
    }

    #[test]
    fn test_keywords_are_not_names() {
        assert_eq!(eval_with("True", json!({})).expect("eval"), json!(true));
        assert_eq!(eval_with("None", json!({})).expect("eval"), json!(null));
        let v = eval_with("true_value", json!({"true_value": 3})).expect("eval");
        assert_eq!(v, json!(3));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Expression::parse("1 +").is_err());
        assert!(Expression::parse("(1").is_err());
        assert!(Expression::parse("").is_err());
        assert!(Expression::parse("a b").is_err());
    }

    #[test]
    fn test_int_out_of_range() {
        let err = eval_with("int(1e30)", json!({})).expect_err("too large");
        assert!(err.to_string().contains("out of range"));
        assert!(eval_with("int(-1e19)", json!({})).is_err());
        assert_eq!(eval_with("int(-2.9)", json!({})).expect("eval"), json!(-2));
        assert_eq!(eval_with("int(1e18)", json!({})).expect("eval"), json!(1_000_000_000_000_000_000i64));
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let parens = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        let err = Expression::parse(&parens).expect_err("too deep");
        assert!(matches!(err, Error::Expression(_)));

        assert!(Expression::parse(&format!("{}x", "not ".repeat(20_000))).is_err());
        assert!(Expression::parse(&format!("{}1", "-".repeat(20_000))).is_err());
        assert!(Expression::parse(&format!("{}1{}", "[".repeat(20_000), "]".repeat(20_000))).is_err());
        assert!(Expression::parse(&vec!["1"; 20_000].join(" + ")).is_err());

        let modest = format!("{}1{}", "(".repeat(32), ")".repeat(32));
        assert_eq!(Expression::parse(&modest).expect("parse").evaluate(|_| Ok(Value::Null)).expect("eval"), json!(1));
    }

    #[test]
    fn test_unknown_function() {
        let err = eval_with("sqrt(4)", json!({})).expect_err("unknown");
        assert!(err.to_string().contains("unknown function"));
    }
}
