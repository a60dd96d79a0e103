use anyhow::{anyhow, bail, Result};
use rand::Rng;
use std::cmp::Ordering;

use super::prototype::OperatorPrototype;
use super::registry::OperatorRegistry;
use super::traits::Arg;
use crate::engines::evaluation::diagnostics::{DiagnosticCollector, IssueCode};
use crate::engines::evaluation::type_inference::{TypeProvider, TypeRule};
use crate::engines::evaluation::{Expression, Scope};
use crate::types::{BaseType, GamlType, Value};

const ARITHMETIC: &str = "Arithmetic";
const LOGIC: &str = "Logical";
const COMPARISON: &str = "Comparison";
const CONTAINERS: &str = "Containers";
const TYPES: &str = "Casting";
const RANDOM: &str = "Random";

fn any_list() -> GamlType {
    GamlType::list(GamlType::no_type())
}

fn any_map() -> GamlType {
    GamlType::map(GamlType::no_type(), GamlType::no_type())
}

fn any_container() -> GamlType {
    GamlType::container(BaseType::Container, GamlType::no_type(), GamlType::no_type())
}

/// Name of the temporary bound to the current element by iterators.
pub const EACH: &str = "each";

// --- Arithmetic ---

fn negate(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    match args[0].value()? {
        Value::Int(i) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| anyhow!("integer overflow when negating {}", i)),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => bail!("cannot negate {}", other),
    }
}

fn abs(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    match args[0].value()? {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| anyhow!("integer overflow in abs({})", i)),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => bail!("abs expects a number, got {}", other),
    }
}

/// Int op int stays int; anything involving a float is computed in floats.
fn numeric(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => int_op(*x, *y)
            .map(Value::Int)
            .ok_or_else(|| anyhow!("integer overflow on {} and {}", x, y)),
        _ => Ok(Value::Float(float_op(a.as_float()?, b.as_float()?))),
    }
}

fn add(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    match (args[0].value()?, args[1].value()?) {
        (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, plain(b)))),
        (Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
        (Value::List(a), b) => {
            let mut items = a.clone();
            items.push(b.clone());
            Ok(Value::List(items))
        }
        (a, b) => numeric(a, b, i64::checked_add, |x, y| x + y),
    }
}

fn subtract(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    numeric(args[0].value()?, args[1].value()?, i64::checked_sub, |x, y| x - y)
}

fn multiply(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    numeric(args[0].value()?, args[1].value()?, i64::checked_mul, |x, y| x * y)
}

fn divide(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let divisor = args[1].value()?.as_float()?;
    if divisor == 0.0 {
        bail!("Division by zero");
    }
    Ok(Value::Float(args[0].value()?.as_float()? / divisor))
}

fn power(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let base = args[0].value()?.as_float()?;
    let exponent = args[1].value()?.as_float()?;
    Ok(Value::Float(base.powf(exponent)))
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// --- Logic ---

fn not(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    Ok(Value::Bool(!args[0].value()?.as_bool()?))
}

/// The right operand is only evaluated when the left one is true.
fn and(scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    if !args[0].value()?.as_bool()? {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(args[1].resolve(scope)?.as_bool()?))
}

fn or(scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    if args[0].value()?.as_bool()? {
        return Ok(Value::Bool(true));
    }
    Ok(Value::Bool(args[1].resolve(scope)?.as_bool()?))
}

// --- Comparison ---

fn compare(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => {
            let (x, y) = (a.as_float()?, b.as_float()?);
            x.partial_cmp(&y)
                .ok_or_else(|| anyhow!("cannot compare {} and {}", a, b))
        }
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            matches!(compare(a, b), Ok(Ordering::Equal))
        }
        _ => a == b,
    }
}

fn less(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let ordering = compare(args[0].value()?, args[1].value()?)?;
    Ok(Value::Bool(ordering == Ordering::Less))
}

fn greater(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let ordering = compare(args[0].value()?, args[1].value()?)?;
    Ok(Value::Bool(ordering == Ordering::Greater))
}

fn less_or_equal(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let ordering = compare(args[0].value()?, args[1].value()?)?;
    Ok(Value::Bool(ordering != Ordering::Greater))
}

fn greater_or_equal(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let ordering = compare(args[0].value()?, args[1].value()?)?;
    Ok(Value::Bool(ordering != Ordering::Less))
}

fn equal(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    Ok(Value::Bool(equals(args[0].value()?, args[1].value()?)))
}

fn not_equal(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    Ok(Value::Bool(!equals(args[0].value()?, args[1].value()?)))
}

/// Strictly between the two bounds.
fn between(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let value = args[0].value()?;
    let above = compare(value, args[1].value()?)? == Ordering::Greater;
    let below = compare(value, args[2].value()?)? == Ordering::Less;
    Ok(Value::Bool(above && below))
}

fn numeric_arguments(
    operator: &str,
    args: &[Expression],
    diagnostics: &mut dyn DiagnosticCollector,
) -> bool {
    for arg in args {
        let ty = arg.gaml_type();
        if !ty.is_numeric() && !ty.is_no_type() {
            diagnostics.error(
                &format!(
                    "{} expects numeric arguments, got {} of type {}",
                    operator,
                    arg.serialize(),
                    ty
                ),
                IssueCode::WrongType,
            );
            return false;
        }
    }
    true
}

// --- Containers ---

fn length(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let len = match args[0].value()? {
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        Value::String(s) => s.chars().count(),
        Value::Pair(..) => 2,
        Value::Nil => 0,
        other => bail!("{} has no length", other),
    };
    Ok(Value::Int(len as i64))
}

fn first(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    Ok(match args[0].value()? {
        Value::String(s) => s
            .chars()
            .next()
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Nil),
        other => other.as_list()?.into_iter().next().unwrap_or(Value::Nil),
    })
}

fn keys(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    Ok(match args[0].value()? {
        Value::Map(entries) => Value::List(entries.iter().map(|(k, _)| k.clone()).collect()),
        Value::List(items) => Value::List((0..items.len() as i64).map(Value::Int).collect()),
        Value::Pair(key, _) => Value::List(vec![(**key).clone()]),
        other => bail!("{} has no keys", other),
    })
}

fn values(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    Ok(Value::List(args[0].value()?.as_list()?))
}

fn pairs(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    match args[0].value()? {
        Value::Map(entries) => Ok(Value::List(
            entries
                .iter()
                .map(|(k, v)| Value::Pair(Box::new(k.clone()), Box::new(v.clone())))
                .collect(),
        )),
        other => bail!("pairs expects a map, got {}", other),
    }
}

fn sum(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    args[0]
        .value()?
        .as_list()?
        .iter()
        .try_fold(Value::Int(0), |total, item| {
            numeric(&total, item, i64::checked_add, |x, y| x + y)
        })
}

fn mean(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let items = args[0].value()?.as_list()?;
    if items.is_empty() {
        return Ok(Value::Float(0.0));
    }
    let total = items
        .iter()
        .map(Value::as_float)
        .sum::<Result<f64>>()?;
    Ok(Value::Float(total / items.len() as f64))
}

fn max(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    extreme(args[0].value()?, Ordering::Greater)
}

fn min(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    extreme(args[0].value()?, Ordering::Less)
}

fn extreme(container: &Value, wanted: Ordering) -> Result<Value> {
    let mut best: Option<Value> = None;
    for item in container.as_list()? {
        let replace = match &best {
            Some(current) => compare(&item, current)? == wanted,
            None => true,
        };
        if replace {
            best = Some(item);
        }
    }
    Ok(best.unwrap_or(Value::Nil))
}

fn contained_in(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let needle = args[0].value()?;
    let found = match args[1].value()? {
        Value::Map(entries) => entries.iter().any(|(k, _)| equals(k, needle)),
        Value::String(s) => s.contains(plain(needle).as_str()),
        other => other.as_list()?.iter().any(|item| equals(item, needle)),
    };
    Ok(Value::Bool(found))
}

fn make_pair(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    Ok(Value::Pair(
        Box::new(args[0].value()?.clone()),
        Box::new(args[1].value()?.clone()),
    ))
}

/// Evaluates `expr` with `each` bound to `item` in a fresh frame.
fn with_each(scope: &mut Scope, expr: &Expression, item: Value) -> Result<Value> {
    scope.push_frame();
    scope.set_temp(EACH, item);
    let result = expr.value(scope);
    scope.pop_frame();
    Ok(result?)
}

fn filter(scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let predicate = args[1].expression()?;
    let mut kept = Vec::new();
    for item in args[0].value()?.as_list()? {
        if with_each(scope, predicate, item.clone())?.as_bool()? {
            kept.push(item);
        }
    }
    Ok(Value::List(kept))
}

fn collect(scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let mapping = args[1].expression()?;
    let items = args[0].value()?.as_list()?;
    let mut collected = Vec::with_capacity(items.len());
    for item in items {
        collected.push(with_each(scope, mapping, item)?);
    }
    Ok(Value::List(collected))
}

// --- Fields ---

fn field_of(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let owner = args[0].value()?;
    let name = args[1].value()?;
    match owner {
        Value::Map(_) => Ok(owner.map_get(name).cloned().unwrap_or(Value::Nil)),
        Value::Pair(key, value) => match plain(name).as_str() {
            "key" => Ok((**key).clone()),
            "value" => Ok((**value).clone()),
            other => bail!("pairs have no field {}", other),
        },
        Value::Nil => bail!("cannot read the field {} of nil", plain(name)),
        other => bail!("{} has no field {}", other, plain(name)),
    }
}

fn pair_key(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    match args[0].value()? {
        Value::Pair(key, _) => Ok((**key).clone()),
        other => bail!("{} is not a pair", other),
    }
}

fn pair_value(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    match args[0].value()? {
        Value::Pair(_, value) => Ok((**value).clone()),
        other => bail!("{} is not a pair", other),
    }
}

// --- Casting ---

fn cast(_scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    match args[1].value()? {
        Value::Type(target) => args[0].value()?.cast(target),
        other => bail!("{} is not a type", other),
    }
}

// --- Random and time ---

fn rnd(scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    match args[0].value()? {
        Value::Int(max) if *max >= 0 => Ok(Value::Int(scope.rng().gen_range(0..=*max))),
        Value::Float(max) if max.is_finite() && *max >= 0.0 => {
            Ok(Value::Float(scope.rng().gen_range(0.0..=*max)))
        }
        other => bail!("rnd expects a positive number, got {}", other),
    }
}

/// True every `n` cycles, reading the `cycle` attribute of the scope.
fn every(scope: &mut Scope, args: &[Arg<'_>]) -> Result<Value> {
    let period = args[0].value()?.as_int()?;
    if period <= 0 {
        bail!("every expects a positive period, got {}", period);
    }
    let cycle = match scope.get_var("cycle") {
        Some(value) => value.as_int()?,
        None => 0,
    };
    Ok(Value::Bool(cycle % period == 0))
}

/// Registers the built-in operator library.
pub fn register_builtins(registry: &mut OperatorRegistry) {
    let same_as_first = TypeRule::new(TypeProvider::TypeAt(0));
    let widest = TypeRule::new(TypeProvider::WidestNumeric);
    let bool_rule = TypeRule::fixed(BaseType::Bool);

    let prototypes = vec![
        // Arithmetic
        OperatorPrototype::builder("-", negate)
            .signature(vec![GamlType::float()])
            .returns(GamlType::float())
            .type_rule(same_as_first)
            .category(ARITHMETIC)
            .doc("Opposite of the operand.")
            .build(),
        OperatorPrototype::builder("abs", abs)
            .signature(vec![GamlType::float()])
            .returns(GamlType::float())
            .type_rule(same_as_first)
            .category(ARITHMETIC)
            .doc("Absolute value of the operand.")
            .build(),
        OperatorPrototype::builder("+", add)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::float())
            .type_rule(widest)
            .category(ARITHMETIC)
            .doc("Sum of two numbers. Also concatenates strings and lists.")
            .build(),
        OperatorPrototype::builder("-", subtract)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::float())
            .type_rule(widest)
            .category(ARITHMETIC)
            .build(),
        OperatorPrototype::builder("*", multiply)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::float())
            .type_rule(widest)
            .category(ARITHMETIC)
            .build(),
        OperatorPrototype::builder("/", divide)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::float())
            .category(ARITHMETIC)
            .doc("Division, always computed in floats.")
            .build(),
        OperatorPrototype::builder("^", power)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::float())
            .category(ARITHMETIC)
            .build(),
        // Logic
        OperatorPrototype::builder("!", not)
            .signature(vec![GamlType::bool()])
            .returns(GamlType::bool())
            .category(LOGIC)
            .build(),
        OperatorPrototype::builder("and", and)
            .signature(vec![GamlType::bool(), GamlType::bool()])
            .lazy(1)
            .returns(GamlType::bool())
            .category(LOGIC)
            .doc("Conjunction. The right operand is evaluated only if the left one is true.")
            .build(),
        OperatorPrototype::builder("or", or)
            .signature(vec![GamlType::bool(), GamlType::bool()])
            .lazy(1)
            .returns(GamlType::bool())
            .category(LOGIC)
            .build(),
        // Comparison
        OperatorPrototype::builder("<", less)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::bool())
            .type_rule(bool_rule)
            .category(COMPARISON)
            .build(),
        OperatorPrototype::builder(">", greater)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::bool())
            .category(COMPARISON)
            .build(),
        OperatorPrototype::builder("<=", less_or_equal)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::bool())
            .category(COMPARISON)
            .build(),
        OperatorPrototype::builder(">=", greater_or_equal)
            .signature(vec![GamlType::float(), GamlType::float()])
            .returns(GamlType::bool())
            .category(COMPARISON)
            .build(),
        OperatorPrototype::builder("=", equal)
            .signature(vec![GamlType::no_type(), GamlType::no_type()])
            .returns(GamlType::bool())
            .category(COMPARISON)
            .build(),
        OperatorPrototype::builder("!=", not_equal)
            .signature(vec![GamlType::no_type(), GamlType::no_type()])
            .returns(GamlType::bool())
            .category(COMPARISON)
            .build(),
        OperatorPrototype::builder("between", between)
            .signature(vec![GamlType::float(), GamlType::float(), GamlType::float()])
            .returns(GamlType::bool())
            .validator(numeric_arguments)
            .category(COMPARISON)
            .doc("True if the first operand is strictly between the two others.")
            .build(),
        // Containers
        OperatorPrototype::builder("length", length)
            .signature(vec![any_container()])
            .returns(GamlType::int())
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("first", first)
            .signature(vec![any_container()])
            .returns(GamlType::no_type())
            .type_rule(TypeRule::new(TypeProvider::ContentTypeAt(0)))
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("keys", keys)
            .signature(vec![any_map()])
            .returns(any_list())
            .content_type_rule(TypeRule::new(TypeProvider::KeyTypeAt(0)))
            .category(CONTAINERS)
            .doc("Keys of a map, or indices of a list.")
            .build(),
        OperatorPrototype::builder("values", values)
            .signature(vec![any_map()])
            .returns(any_list())
            .content_type_rule(TypeRule::new(TypeProvider::ContentTypeAt(0)))
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("pairs", pairs)
            .signature(vec![any_map()])
            .returns(any_list())
            .content_type_rule(TypeRule::fixed(BaseType::Pair))
            .category(CONTAINERS)
            .doc("Entries of a map as a list of key::value pairs.")
            .build(),
        OperatorPrototype::builder("sum", sum)
            .signature(vec![any_container()])
            .returns(GamlType::float())
            .type_rule(TypeRule::new(TypeProvider::ContentTypeAt(0)))
            .expected_content_types(vec![GamlType::int(), GamlType::float()])
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("mean", mean)
            .signature(vec![any_container()])
            .returns(GamlType::float())
            .type_rule(TypeRule::new(TypeProvider::ContentTypeAt(0)).float_if_int())
            .expected_content_types(vec![GamlType::int(), GamlType::float()])
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("max", max)
            .signature(vec![any_container()])
            .type_rule(TypeRule::new(TypeProvider::ContentTypeAt(0)))
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("min", min)
            .signature(vec![any_container()])
            .type_rule(TypeRule::new(TypeProvider::ContentTypeAt(0)))
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("in", contained_in)
            .signature(vec![GamlType::no_type(), any_container()])
            .returns(GamlType::bool())
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("::", make_pair)
            .signature(vec![GamlType::no_type(), GamlType::no_type()])
            .returns(GamlType::pair(GamlType::no_type(), GamlType::no_type()))
            .key_type_rule(TypeRule::new(TypeProvider::TypeAt(0)))
            .content_type_rule(TypeRule::new(TypeProvider::TypeAt(1)))
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("where", filter)
            .signature(vec![any_container(), GamlType::bool()])
            .lazy(1)
            .returns(any_list())
            .type_rule(same_as_first)
            .category(CONTAINERS)
            .doc("Elements of the left operand for which the right one, evaluated with each, is true.")
            .build(),
        OperatorPrototype::builder("collect", collect)
            .signature(vec![any_container(), GamlType::no_type()])
            .lazy(1)
            .returns(any_list())
            .content_type_rule(TypeRule::new(TypeProvider::TypeAt(1)))
            .category(CONTAINERS)
            .build(),
        // Fields
        OperatorPrototype::builder(".", field_of)
            .signature(vec![GamlType::no_type(), GamlType::string()])
            .returns(GamlType::no_type())
            .field()
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("key", pair_key)
            .signature(vec![GamlType::pair(GamlType::no_type(), GamlType::no_type())])
            .type_rule(TypeRule::new(TypeProvider::KeyTypeAt(0)))
            .field()
            .category(CONTAINERS)
            .build(),
        OperatorPrototype::builder("value", pair_value)
            .signature(vec![GamlType::pair(GamlType::no_type(), GamlType::no_type())])
            .type_rule(TypeRule::new(TypeProvider::ContentTypeAt(0)))
            .field()
            .category(CONTAINERS)
            .build(),
        // Casting
        OperatorPrototype::builder("as", cast)
            .signature(vec![GamlType::no_type(), GamlType::type_literal()])
            .type_rule(TypeRule::new(TypeProvider::DenotedTypeAt(1)))
            .category(TYPES)
            .doc("Converts the left operand to the type given on the right.")
            .build(),
        // Random and time
        OperatorPrototype::builder("rnd", rnd)
            .signature(vec![GamlType::int()])
            .type_rule(same_as_first)
            .context_dependent()
            .category(RANDOM)
            .doc("Random number between 0 and the operand, inclusive.")
            .build(),
        OperatorPrototype::builder("every", every)
            .signature(vec![GamlType::int()])
            .returns(GamlType::bool())
            .context_dependent()
            .depends_on(&["cycle"])
            .category(RANDOM)
            .build(),
    ];

    for prototype in prototypes {
        registry.register(prototype);
    }
}
