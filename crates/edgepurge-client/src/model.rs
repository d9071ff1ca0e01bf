//! Typed views over parsed control-plane responses.
//!
//! Every type keeps the parsed tree in `raw` so callers can reach fields that
//! are not modelled here.

use serde::Serialize;
use serde_json::Value;

/// Result of `CreateInvalidation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationResult {
    /// Invalidation ID assigned by CloudFront.
    pub id: Option<String>,
    /// Invalidation status, usually `InProgress`.
    pub status: Option<String>,
    /// Creation time as returned by the API.
    pub create_time: Option<String>,
    /// Caller reference the invalidation was submitted with.
    pub caller_reference: String,
    /// The parsed response.
    pub raw: Value,
}

impl InvalidationResult {
    pub(crate) fn from_tree(raw: Value, caller_reference: &str) -> Self {
        Self {
            id: text(&raw, "Id"),
            status: text(&raw, "Status"),
            create_time: text(&raw, "CreateTime"),
            caller_reference: text(&raw["InvalidationBatch"], "CallerReference")
                .unwrap_or_else(|| caller_reference.to_owned()),
            raw,
        }
    }
}

/// One entry of `ListInvalidations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationSummary {
    /// Invalidation ID.
    pub id: String,
    /// Invalidation status.
    pub status: String,
    /// Creation time.
    pub create_time: Option<String>,
}

impl InvalidationSummary {
    pub(crate) fn list_from_tree(tree: &Value) -> Vec<Self> {
        list(&tree["Items"]["InvalidationSummary"])
            .filter_map(|item| {
                Some(Self {
                    id: text(item, "Id")?,
                    status: text(item, "Status").unwrap_or_default(),
                    create_time: text(item, "CreateTime"),
                })
            })
            .collect()
    }
}

/// Result of `GetInvalidation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationDetail {
    /// Invalidation ID.
    pub id: String,
    /// Invalidation status.
    pub status: Option<String>,
    /// Creation time.
    pub create_time: Option<String>,
    /// Invalidated paths.
    pub paths: Vec<String>,
    /// Caller reference of the submission.
    pub caller_reference: Option<String>,
    /// The parsed response.
    pub raw: Value,
}

impl InvalidationDetail {
    pub(crate) fn from_tree(raw: Value, id: &str) -> Self {
        let batch = &raw["InvalidationBatch"];
        Self {
            id: text(&raw, "Id").unwrap_or_else(|| id.to_owned()),
            status: text(&raw, "Status"),
            create_time: text(&raw, "CreateTime"),
            paths: list(&batch["Paths"]["Items"]["Path"])
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect(),
            caller_reference: text(batch, "CallerReference"),
            raw,
        }
    }
}

/// Result of `GetDistribution`, used as a validation probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionInfo {
    /// Distribution ID.
    pub id: String,
    /// Deployment status, e.g. `Deployed`.
    pub status: Option<String>,
    /// CloudFront domain name.
    pub domain_name: Option<String>,
    /// Whether the distribution is enabled.
    pub enabled: Option<bool>,
    /// The parsed response.
    pub raw: Value,
}

impl DistributionInfo {
    pub(crate) fn from_tree(raw: Value, id: &str) -> Self {
        Self {
            id: text(&raw, "Id").unwrap_or_else(|| id.to_owned()),
            status: text(&raw, "Status"),
            domain_name: text(&raw, "DomainName"),
            enabled: text(&raw["DistributionConfig"], "Enabled").map(|v| v == "true"),
            raw,
        }
    }
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// Iterate a node that is an array for repeated elements and a scalar or
/// object for a single one.
fn list(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Null => Box::new(std::iter::empty()),
        Value::String(s) if s.is_empty() => Box::new(std::iter::empty()),
        other => Box::new(std::iter::once(other)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_read_single_and_repeated_summaries() {
        let one = json!({"Items": {"InvalidationSummary": {"Id": "I1", "Status": "Completed"}}});
        assert_eq!(InvalidationSummary::list_from_tree(&one).len(), 1);

        let two = json!({"Items": {"InvalidationSummary": [
            {"Id": "I1", "Status": "Completed", "CreateTime": "2024-01-01T00:00:00Z"},
            {"Id": "I2", "Status": "InProgress"}
        ]}});
        let list = InvalidationSummary::list_from_tree(&two);
        assert_eq!(list[1].id, "I2");
        assert_eq!(list[0].create_time.as_deref(), Some("2024-01-01T00:00:00Z"));

        let empty = json!({"Quantity": "0", "Items": ""});
        assert!(InvalidationSummary::list_from_tree(&empty).is_empty());
    }

    #[test]
    fn test_should_fall_back_to_submitted_caller_reference() {
        let result = InvalidationResult::from_tree(json!({}), "ref-1");
        assert_eq!(result.id, None);
        assert_eq!(result.caller_reference, "ref-1");
    }
}
