use crate::workflow::context::ExecutionContext;
use crate::workflow::error::WorkflowError;
use serde_json::{Map, Value};

/// Replaces every `${...}` token in `text` with the stringified value it
/// refers to. A token is either `step_id.field[...]` against recorded step
/// outputs or a plain name against the external variable set. Unknown or
/// not-yet-produced references are errors, never empty substitutions.
pub fn resolve_text(text: &str, ctx: &ExecutionContext) -> Result<String, WorkflowError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated token; keep the literal text.
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let reference = &after[..end];
        let value = lookup_reference(reference, ctx)?;
        out.push_str(&stringify(&value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Resolves a parameter value. A string that is exactly one `${...}` token
/// yields the referenced value unchanged (so sequences and objects survive
/// for consumers like foreach); any other string goes through text
/// substitution; arrays and objects are resolved recursively on their string
/// leaves.
pub fn resolve_param_value(value: &Value, ctx: &ExecutionContext) -> Result<Value, WorkflowError> {
    if let Value::String(text) = value {
        if let Some(reference) = sole_reference(text) {
            return lookup_reference(reference, ctx);
        }
    }
    resolve_value(value, ctx)
}

/// Recursively resolves all string leaves of a parameter structure.
pub fn resolve_value(value: &Value, ctx: &ExecutionContext) -> Result<Value, WorkflowError> {
    match value {
        Value::String(text) => Ok(Value::String(resolve_text(text, ctx)?)),
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_value(item, ctx)?);
            }
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut resolved = Map::new();
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_value(item, ctx)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

pub(crate) fn lookup_reference(
    reference: &str,
    ctx: &ExecutionContext,
) -> Result<Value, WorkflowError> {
    let mut parts = reference.split('.');
    let head = parts.next().unwrap_or_default();
    let root = ctx
        .step_output(head)
        .or_else(|| ctx.variable(head))
        .ok_or_else(|| WorkflowError::UnresolvedReference {
            reference: reference.to_string(),
        })?;

    let mut current = root;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        }
        .ok_or_else(|| WorkflowError::UnresolvedReference {
            reference: reference.to_string(),
        })?;
    }
    Ok(current.clone())
}

fn sole_reference(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("${")?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains("${") || inner.contains('}') {
        return None;
    }
    Some(inner)
}

/// Canonical stringification: strings pass through, scalars use their JSON
/// rendering, nested objects and arrays serialize as JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        composite => serde_json::to_string(composite).unwrap_or_default(),
    }
}
