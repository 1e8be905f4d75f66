//! Filter, projection and sort evaluation over plain documents.

use std::cmp::Ordering;

use docmap_codec::{Document, Value};

use crate::error::{StoreError, StoreResult};

/// Returns true if `doc` satisfies `filter`.
pub(crate) fn matches(doc: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter.iter() {
        let ok = match key {
            "$and" => clauses(condition)?
                .iter()
                .try_fold(true, |acc, c| Ok::<_, StoreError>(acc && matches(doc, c)?))?,
            "$or" => {
                let mut any = false;
                for clause in clauses(condition)? {
                    if matches(doc, clause)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for clause in clauses(condition)? {
                    if matches(doc, clause)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(StoreError::invalid_query(format!(
                    "unknown top-level operator {op}"
                )))
            }
            path => field_matches(&resolve(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses(condition: &Value) -> StoreResult<Vec<&Document>> {
    let items = condition
        .as_array()
        .ok_or_else(|| StoreError::invalid_query("logical operators take an array"))?;
    items
        .iter()
        .map(|item| {
            item.as_document()
                .ok_or_else(|| StoreError::invalid_query("logical clauses must be documents"))
        })
        .collect()
}

fn is_operator_document(value: &Value) -> bool {
    match value {
        Value::Document(d) => !d.is_empty() && d.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(candidates: &[&Value], condition: &Value) -> StoreResult<bool> {
    if !is_operator_document(condition) {
        return Ok(equals_any(candidates, condition));
    }
    let Value::Document(ops) = condition else {
        return Ok(false);
    };
    for (op, operand) in ops.iter() {
        let ok = match op {
            "$eq" => equals_any(candidates, operand),
            "$ne" => !equals_any(candidates, operand),
            "$gt" => compares(candidates, operand, |o| o == Ordering::Greater),
            "$gte" => compares(candidates, operand, |o| o != Ordering::Less),
            "$lt" => compares(candidates, operand, |o| o == Ordering::Less),
            "$lte" => compares(candidates, operand, |o| o != Ordering::Greater),
            "$in" => in_list(candidates, operand)?,
            "$nin" => !in_list(candidates, operand)?,
            "$options" => true,
            "$regex" => return Err(StoreError::Unsupported("$regex".to_string())),
            other => {
                return Err(StoreError::invalid_query(format!("unknown operator {other}")))
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals_any(candidates: &[&Value], operand: &Value) -> bool {
    if candidates.is_empty() {
        return operand.is_null();
    }
    candidates.iter().any(|c| {
        values_equal(c, operand)
            || matches!(c, Value::Array(items) if items.iter().any(|i| values_equal(i, operand)))
    })
}

fn compares(candidates: &[&Value], operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    candidates.iter().any(|c| match c {
        Value::Array(items) => items
            .iter()
            .any(|i| bracket_cmp(i, operand).is_some_and(&accept)),
        other => bracket_cmp(other, operand).is_some_and(&accept),
    })
}

fn in_list(candidates: &[&Value], operand: &Value) -> StoreResult<bool> {
    let list = operand
        .as_array()
        .ok_or_else(|| StoreError::invalid_query("$in/$nin take an array"))?;
    Ok(list.iter().any(|v| equals_any(candidates, v)))
}

/// Collects every value reachable at `path`, descending through arrays
/// of sub-documents.
pub(crate) fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = doc.get(first) {
            collect(value, rest, &mut out);
        }
    }
    out
}

fn collect<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((first, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Document(d) => {
            if let Some(next) = d.get(first) {
                collect(next, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                if matches!(item, Value::Document(_)) {
                    collect(item, segments, out);
                }
            }
        }
        _ => {}
    }
}

/// Equality with numeric comparison across integer and float.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            a.as_f64() == b.as_f64()
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Document(x), Value::Document(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((lk, lv), (rk, rv))| lk == rk && values_equal(lv, rv))
        }
        _ => a == b,
    }
}

/// Ordering between values of the same type bracket; `None` across
/// brackets.
fn bracket_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if rank(a) != rank(b) {
        return None;
    }
    Some(total_cmp(a, b))
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Integer(_) | Value::Float(_) => 1,
        Value::Text(_) => 2,
        Value::Document(_) => 3,
        Value::Array(_) => 4,
        Value::Bytes(_) => 5,
        Value::Id(_) => 6,
        Value::Bool(_) => 7,
        Value::DateTime(_) => 8,
    }
}

/// Total order used for sorting: type bracket first, then value.
pub(crate) fn total_cmp(a: &Value, b: &Value) -> Ordering {
    let by_rank = rank(a).cmp(&rank(b));
    if by_rank != Ordering::Equal {
        return by_rank;
    }
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) | (Value::DateTime(x), Value::DateTime(y)) => {
            x.cmp(y)
        }
        (Value::Integer(_) | Value::Float(_), _) => {
            let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::Id(x), Value::Id(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| total_cmp(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Document(x), Value::Document(y)) => x
            .values()
            .zip(y.values())
            .map(|(l, r)| total_cmp(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => Ordering::Equal,
    }
}

static NULL: Value = Value::Null;

/// Compares two documents under an ordered `{path: 1 | -1}` sort.
pub(crate) fn sort_cmp(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (path, direction) in sort.iter() {
        let left = resolve(a, path).first().copied().unwrap_or(&NULL);
        let right = resolve(b, path).first().copied().unwrap_or(&NULL);
        let mut ord = total_cmp(left, right);
        if direction.as_f64().is_some_and(|d| d < 0.0) {
            ord = ord.reverse();
        }
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => other.as_f64().is_some_and(|n| n != 0.0),
    }
}

/// Applies an inclusion or exclusion projection.
pub(crate) fn project(doc: &Document, projection: &Document, id_field: &str) -> StoreResult<Document> {
    let mut include = None;
    for (path, flag) in projection.iter() {
        if path == id_field {
            continue;
        }
        let wanted = truthy(flag);
        match include {
            None => include = Some(wanted),
            Some(mode) if mode != wanted => {
                return Err(StoreError::invalid_query(
                    "projection cannot mix inclusion and exclusion",
                ))
            }
            Some(_) => {}
        }
    }
    let keep_id = projection.get(id_field).map_or(true, truthy);

    if include.unwrap_or(false) {
        let mut out = Document::new();
        if keep_id {
            if let Some(id) = doc.get(id_field) {
                out.insert(id_field, id.clone());
            }
        }
        for (path, _) in projection.iter().filter(|(p, _)| *p != id_field) {
            if let Some(value) = doc.get_path(path) {
                out.set_path(path, value.clone());
            }
        }
        Ok(out)
    } else {
        let mut out = doc.clone();
        for (path, _) in projection.iter().filter(|(p, _)| *p != id_field) {
            out.remove_path(path);
        }
        if !keep_id {
            out.remove(id_field);
        }
        Ok(out)
    }
}
