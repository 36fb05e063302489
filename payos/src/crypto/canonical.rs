//! Canonical string forms that payOS signatures are computed over.
//!
//! Two protocols coexist and must stay separate:
//!
//! - [`canonical_query`] deep-sorts an object and joins its top-level fields
//!   as `key=value` pairs. Used for body, header and webhook signatures.
//! - [`payment_request_message`] concatenates five fixed fields of a
//!   payment-link creation request, in a fixed order, without encoding.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Number, Value};

use super::SignatureOptions;

/// Characters left unescaped by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Fields covered by the payment-link creation signature, in signing order.
pub const PAYMENT_REQUEST_FIELDS: [&str; 5] =
    ["amount", "cancelUrl", "description", "orderCode", "returnUrl"];

/// Builds the `key=value&...` string signed for a JSON object.
///
/// Keys are sorted at every nesting level. Top-level values render as:
/// arrays and objects as compact JSON, `null` as the empty string, strings
/// raw, numbers in shortest form. Returns `None` if `data` is not an object.
#[must_use]
pub fn canonical_query(data: &Value, options: &SignatureOptions) -> Option<String> {
    let Value::Object(sorted) = sort_value(data, options.sort_arrays) else {
        return None;
    };
    let pairs: Vec<String> = sorted
        .iter()
        .map(|(key, value)| {
            let value = render_leaf(value);
            if options.encode_uri {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, URI_COMPONENT),
                    utf8_percent_encode(&value, URI_COMPONENT)
                )
            } else {
                format!("{key}={value}")
            }
        })
        .collect();
    Some(pairs.join("&"))
}

/// Builds the literal string signed for payment-link creation.
///
/// Only the five [`PAYMENT_REQUEST_FIELDS`] participate. Missing or `null`
/// fields render as the empty string. Returns `None` if `data` is not an
/// object.
#[must_use]
pub fn payment_request_message(data: &Value) -> Option<String> {
    let object = data.as_object()?;
    let field = |name: &str| object.get(name).map(render_leaf).unwrap_or_default();
    Some(format!(
        "amount={}&cancelUrl={}&description={}&orderCode={}&returnUrl={}",
        field("amount"),
        field("cancelUrl"),
        field("description"),
        field("orderCode"),
        field("returnUrl"),
    ))
}

/// Recursively sorts object keys, normalizing integral floats to integers.
fn sort_value(value: &Value, sort_arrays: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| (key.clone(), sort_value(value, sort_arrays)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => {
            let mut items: Vec<Value> = items
                .iter()
                .map(|item| sort_value(item, sort_arrays))
                .collect();
            if sort_arrays {
                items.sort_by_cached_key(render_leaf);
            }
            Value::Array(items)
        }
        Value::Number(number) => Value::Number(normalize_number(number)),
        other => other.clone(),
    }
}

/// Renders a value the way it appears on the right of `key=`.
fn render_leaf(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => normalize_number(n).to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// `1000.0` signs as `1000`, matching how the server prints numbers.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn normalize_number(number: &Number) -> Number {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if number.is_i64() || number.is_u64() {
        return number.clone();
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => Number::from(f as i64),
        _ => number.clone(),
    }
}
