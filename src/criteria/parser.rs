//! Criteria parser
//!
//! Accepted shapes:
//!
//! ```json
//! { "category": "fruits" }                       // equality
//! { "tags": ["a", "b"] }                         // same as $in
//! { "tags": { "$all": ["a", "b"] } }
//! { "age": { ">=": 18, "$lt": 65 } }             // operators combine with AND
//! { "$or": [ {...}, {...} ] }
//! { "$and": [ {...} ], "other": 1 }              // siblings combine with AND
//! { "$not": { ... } }
//! { "name": { "$regex": "^a", "$options": "i" } }
//! { "name": { "$not": { "$in": ["x"] } } }
//! ```

use serde_json::{Map, Value};

use crate::index::json_type_name;

use super::ast::{CmpOp, Criteria, Pattern, Predicate};
use super::errors::{CriteriaError, CriteriaResult};

/// Parses caller JSON into a criteria tree
pub fn parse(value: &Value) -> CriteriaResult<Criteria> {
    parse_node(value, "$")
}

fn parse_node(value: &Value, path: &str) -> CriteriaResult<Criteria> {
    let map = value.as_object().ok_or_else(|| CriteriaError::NotAnObject {
        path: path.to_string(),
        found: json_type_name(value),
    })?;

    let mut clauses = Vec::with_capacity(map.len());
    for (key, operand) in map {
        let child = format!("{}.{}", path, key);
        match key.as_str() {
            "$and" => clauses.push(Criteria::And(parse_branches(operand, &child, key)?)),
            "$or" => clauses.push(Criteria::Or(parse_branches(operand, &child, key)?)),
            "$not" => clauses.push(Criteria::Not(Box::new(parse_node(operand, &child)?))),
            op if op.starts_with('$') => {
                return Err(CriteriaError::UnknownOperator {
                    path: path.to_string(),
                    op: op.to_string(),
                })
            }
            field => clauses.extend(parse_field(field, operand, &child)?),
        }
    }

    Ok(match clauses.len() {
        1 => clauses.pop().unwrap_or_default(),
        _ => Criteria::And(clauses),
    })
}

fn parse_branches(operand: &Value, path: &str, op: &str) -> CriteriaResult<Vec<Criteria>> {
    let items = operand
        .as_array()
        .ok_or_else(|| CriteriaError::operand(path, op, "expected an array of criteria"))?;
    if items.is_empty() {
        return Err(CriteriaError::operand(path, op, "must not be empty"));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_node(item, &format!("{}[{}]", path, i)))
        .collect()
}

fn parse_field(field: &str, operand: &Value, path: &str) -> CriteriaResult<Vec<Criteria>> {
    let predicates = match operand {
        Value::Array(items) => vec![Predicate::In(items.clone())],
        Value::Object(map) if is_operator_map(map) => parse_operators(field, map, path)?,
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => {
            return Err(CriteriaError::MixedOperators {
                field: field.to_string(),
            })
        }
        other => vec![Predicate::Eq(other.clone())],
    };
    Ok(predicates
        .into_iter()
        .map(|predicate| Criteria::field(field, predicate))
        .collect())
}

fn is_operator_map(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| is_operator_key(k))
}

fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || matches!(key, ">" | ">=" | "<" | "<=" | "!=")
}

fn parse_operators(
    field: &str,
    map: &Map<String, Value>,
    path: &str,
) -> CriteriaResult<Vec<Predicate>> {
    let mut predicates = Vec::with_capacity(map.len());
    for (op, operand) in map {
        let predicate = match op.as_str() {
            // consumed together with $regex
            "$options" => {
                if !map.contains_key("$regex") {
                    return Err(CriteriaError::operand(path, op, "requires $regex"));
                }
                continue;
            }
            "$regex" => {
                let options = match map.get("$options") {
                    None => "",
                    Some(Value::String(s)) => s.as_str(),
                    Some(_) => return Err(CriteriaError::operand(path, "$options", "expected a string")),
                };
                Predicate::Regex(parse_pattern(operand, options, path)?)
            }
            "$not" => Predicate::Not(Box::new(parse_negated(field, operand, path)?)),
            _ => parse_operator(op, operand, path)?,
        };
        predicates.push(predicate);
    }
    Ok(predicates)
}

fn parse_operator(op: &str, operand: &Value, path: &str) -> CriteriaResult<Predicate> {
    Ok(match op {
        "$eq" => Predicate::Eq(operand.clone()),
        "$ne" | "!=" => Predicate::Cmp(CmpOp::Ne, operand.clone()),
        "$gt" | ">" => Predicate::Cmp(CmpOp::Gt, scalar(op, operand, path)?),
        "$gte" | ">=" => Predicate::Cmp(CmpOp::Gte, scalar(op, operand, path)?),
        "$lt" | "<" => Predicate::Cmp(CmpOp::Lt, scalar(op, operand, path)?),
        "$lte" | "<=" => Predicate::Cmp(CmpOp::Lte, scalar(op, operand, path)?),
        "$in" => Predicate::In(list(op, operand, path)?),
        "$nin" => Predicate::Nin(list(op, operand, path)?),
        "$all" => Predicate::All(list(op, operand, path)?),
        "$contains" => Predicate::Contains(operand.clone()),
        "$size" => Predicate::Size(
            operand
                .as_u64()
                .ok_or_else(|| CriteriaError::operand(path, op, "expected a non-negative integer"))?
                as usize,
        ),
        "$exists" => Predicate::Exists(
            operand
                .as_bool()
                .ok_or_else(|| CriteriaError::operand(path, op, "expected a boolean"))?,
        ),
        other => {
            return Err(CriteriaError::UnknownOperator {
                path: path.to_string(),
                op: other.to_string(),
            })
        }
    })
}

/// `{"$not": ...}` inside a field: one operator, or a plain value meaning
/// "not equal" (an array meaning "not any of")
fn parse_negated(field: &str, operand: &Value, path: &str) -> CriteriaResult<Predicate> {
    match operand {
        Value::Object(map) if is_operator_map(map) => {
            let mut predicates = parse_operators(field, map, path)?;
            if predicates.len() != 1 {
                return Err(CriteriaError::operand(
                    path,
                    "$not",
                    "expected exactly one operator",
                ));
            }
            Ok(predicates.remove(0))
        }
        Value::Array(items) => Ok(Predicate::In(items.clone())),
        other => Ok(Predicate::Eq(other.clone())),
    }
}

fn parse_pattern(operand: &Value, options: &str, path: &str) -> CriteriaResult<Pattern> {
    let source = operand
        .as_str()
        .ok_or_else(|| CriteriaError::operand(path, "$regex", "expected a string"))?;
    Pattern::new(source, options)
}

fn scalar(op: &str, operand: &Value, path: &str) -> CriteriaResult<Value> {
    match operand {
        Value::Number(_) | Value::String(_) => Ok(operand.clone()),
        other => Err(CriteriaError::operand(
            path,
            op,
            format!("expected a number or string, got {}", json_type_name(other)),
        )),
    }
}

fn list(op: &str, operand: &Value, path: &str) -> CriteriaResult<Vec<Value>> {
    operand
        .as_array()
        .cloned()
        .ok_or_else(|| CriteriaError::operand(path, op, "expected an array"))
}
