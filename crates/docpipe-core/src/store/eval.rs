//! `$match` filter compilation and evaluation.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use super::document::{as_object_id, compare_values, get_path, values_equal};
use crate::error::Error;

/// A compiled match filter.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// All children match.
    And(Vec<Predicate>),
    /// At least one child matches.
    Or(Vec<Predicate>),
    /// No child matches.
    Nor(Vec<Predicate>),
    /// A test on the values at a field path.
    Field { path: String, test: FieldTest },
}

/// A test applied to the values found at one path.
#[derive(Debug, Clone)]
pub enum FieldTest {
    /// Every test passes.
    All(Vec<FieldTest>),
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(Regex),
    Not(Box<FieldTest>),
}

impl Predicate {
    /// Compile a filter document.
    pub fn compile(filter: &Value) -> Result<Self, Error> {
        let Value::Object(map) = filter else {
            return Err(Error::InvalidPipeline(format!(
                "match filter must be an object, got {}",
                filter
            )));
        };
        Self::compile_map(map)
    }

    fn compile_map(map: &Map<String, Value>) -> Result<Self, Error> {
        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            let clause = match key.as_str() {
                "$and" => Predicate::And(Self::compile_list(key, value)?),
                "$or" => Predicate::Or(Self::compile_list(key, value)?),
                "$nor" => Predicate::Nor(Self::compile_list(key, value)?),
                op if op.starts_with('$') => {
                    return Err(Error::InvalidPipeline(format!(
                        "unsupported top-level operator '{}'",
                        op
                    )))
                }
                path => Predicate::Field {
                    path: path.to_string(),
                    test: FieldTest::compile(value)?,
                },
            };
            clauses.push(clause);
        }

        if clauses.len() == 1 {
            if let Some(clause) = clauses.pop() {
                return Ok(clause);
            }
        }
        Ok(Predicate::And(clauses))
    }

    fn compile_list(op: &str, value: &Value) -> Result<Vec<Predicate>, Error> {
        let Value::Array(items) = value else {
            return Err(Error::InvalidPipeline(format!("{} requires an array", op)));
        };
        if items.is_empty() {
            return Err(Error::InvalidPipeline(format!(
                "{} requires a non-empty array",
                op
            )));
        }
        items.iter().map(Self::compile).collect()
    }

    /// Check if a document matches.
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        match self {
            Predicate::And(children) => children.iter().all(|c| c.matches(doc)),
            Predicate::Or(children) => children.iter().any(|c| c.matches(doc)),
            Predicate::Nor(children) => !children.iter().any(|c| c.matches(doc)),
            Predicate::Field { path, test } => test.test(&get_path(doc, path)),
        }
    }
}

/// Check if a value is an operator document like `{"$gt": 1}`.
fn is_operator_document(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            !map.is_empty()
                && as_object_id(value).is_none()
                && map.keys().all(|k| k.starts_with('$'))
        }
        _ => false,
    }
}

impl FieldTest {
    /// Compile the value side of a `{path: value}` clause.
    pub fn compile(value: &Value) -> Result<Self, Error> {
        if !is_operator_document(value) {
            return Ok(FieldTest::Eq(value.clone()));
        }
        let Value::Object(ops) = value else {
            return Ok(FieldTest::Eq(value.clone()));
        };

        let mut tests = Vec::with_capacity(ops.len());
        for (op, arg) in ops {
            let test = match op.as_str() {
                "$eq" => FieldTest::Eq(arg.clone()),
                "$ne" => FieldTest::Ne(arg.clone()),
                "$gt" => FieldTest::Gt(arg.clone()),
                "$gte" => FieldTest::Gte(arg.clone()),
                "$lt" => FieldTest::Lt(arg.clone()),
                "$lte" => FieldTest::Lte(arg.clone()),
                "$in" => FieldTest::In(Self::list_arg(op, arg)?),
                "$nin" => FieldTest::Nin(Self::list_arg(op, arg)?),
                "$exists" => FieldTest::Exists(truthy(arg)),
                "$regex" => {
                    let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                    FieldTest::Regex(compile_regex(arg, options)?)
                }
                "$options" => {
                    if !ops.contains_key("$regex") {
                        return Err(Error::InvalidPipeline(
                            "$options requires $regex".to_string(),
                        ));
                    }
                    continue;
                }
                "$not" => {
                    let inner = match arg {
                        Value::String(_) => FieldTest::Regex(compile_regex(arg, "")?),
                        _ if is_operator_document(arg) => FieldTest::compile(arg)?,
                        _ => {
                            return Err(Error::InvalidPipeline(
                                "$not requires an operator document or pattern".to_string(),
                            ))
                        }
                    };
                    FieldTest::Not(Box::new(inner))
                }
                other => {
                    return Err(Error::InvalidPipeline(format!(
                        "unsupported match operator '{}'",
                        other
                    )))
                }
            };
            tests.push(test);
        }

        if tests.len() == 1 {
            if let Some(test) = tests.pop() {
                return Ok(test);
            }
        }
        Ok(FieldTest::All(tests))
    }

    fn list_arg(op: &str, arg: &Value) -> Result<Vec<Value>, Error> {
        match arg {
            Value::Array(items) => Ok(items.clone()),
            _ => Err(Error::InvalidPipeline(format!("{} requires an array", op))),
        }
    }

    /// Apply the test to the values found at a path (empty when missing).
    pub fn test(&self, found: &[&Value]) -> bool {
        match self {
            FieldTest::All(tests) => tests.iter().all(|t| t.test(found)),
            FieldTest::Eq(expected) => eq_test(found, expected),
            FieldTest::Ne(expected) => !eq_test(found, expected),
            FieldTest::Gt(bound) => order_test(found, bound, Ordering::is_gt),
            FieldTest::Gte(bound) => order_test(found, bound, Ordering::is_ge),
            FieldTest::Lt(bound) => order_test(found, bound, Ordering::is_lt),
            FieldTest::Lte(bound) => order_test(found, bound, Ordering::is_le),
            FieldTest::In(set) => set.iter().any(|v| eq_test(found, v)),
            FieldTest::Nin(set) => !set.iter().any(|v| eq_test(found, v)),
            FieldTest::Exists(exists) => found.is_empty() != *exists,
            FieldTest::Regex(re) => {
                any_scalar(found, |v| v.as_str().map_or(false, |s| re.is_match(s)))
            }
            FieldTest::Not(inner) => !inner.test(found),
        }
    }
}

/// Equality with array membership. A missing path equals null.
fn eq_test(found: &[&Value], expected: &Value) -> bool {
    if found.is_empty() {
        return expected.is_null();
    }
    found.iter().any(|value| {
        values_equal(value, expected)
            || matches!(value, Value::Array(items) if items.iter().any(|i| values_equal(i, expected)))
    })
}

fn order_test(found: &[&Value], bound: &Value, accept: fn(Ordering) -> bool) -> bool {
    any_scalar(found, |v| compare_values(v, bound).map_or(false, accept))
}

/// Apply `pred` to each found value, and to each element of found arrays.
fn any_scalar(found: &[&Value], pred: impl Fn(&Value) -> bool) -> bool {
    found.iter().any(|value| match value {
        Value::Array(items) => items.iter().any(&pred),
        other => pred(other),
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        _ => true,
    }
}

fn compile_regex(pattern: &Value, options: &str) -> Result<Regex, Error> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| Error::InvalidPipeline("$regex requires a string pattern".to_string()))?;

    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(Error::InvalidPipeline(format!(
                    "unsupported regex option '{}'",
                    other
                )))
            }
        };
    }
    builder
        .build()
        .map_err(|e| Error::InvalidPipeline(format!("invalid regex '{}': {}", pattern, e)))
}
