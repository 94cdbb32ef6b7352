//! Extract the hit total from a `_search` response body.

use serde_json::Value;

use crate::core::errors::{HcmError, Result};

/// Parse `hits.total` out of a search response.
///
/// Accepts the legacy numeric form (`"total": 42`) and the object form newer
/// clusters return (`"total": {"value": 42, "relation": "eq"}`).
pub fn parse_hit_total(body: &str) -> Result<u64> {
    let json: Value = serde_json::from_str(body).map_err(|e| HcmError::MalformedResponse {
        details: format!("body is not JSON: {e}"),
    })?;

    let total = json
        .get("hits")
        .and_then(|hits| hits.get("total"))
        .ok_or_else(|| HcmError::MalformedResponse {
            details: "missing hits.total".to_string(),
        })?;

    let number = match total {
        Value::Object(obj) => obj.get("value").unwrap_or(&Value::Null),
        other => other,
    };

    number.as_u64().ok_or_else(|| HcmError::MalformedResponse {
        details: format!("hits.total is not a non-negative integer: {total}"),
    })
}
