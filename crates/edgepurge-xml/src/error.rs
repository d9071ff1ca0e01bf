//! XML error types and CloudFront error body extraction.

use std::io;

use serde_json::Value;

use crate::deserialize::parse_xml;

/// Errors that can occur during XML serialization or parsing.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// An I/O error during XML writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error from the underlying quick-xml library.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// The document is not well formed or uses unsupported constructs.
    #[error("malformed XML: {0}")]
    Malformed(String),
}

/// The `Code` and `Message` of a CloudFront error response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `NoSuchDistribution`.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
}

/// Extract the error code and message from an error response body.
///
/// Looks for the first `Code` and `Message` elements anywhere in the
/// document. A body that is not well-formed XML yields an empty [`ErrorBody`].
///
/// # Examples
///
/// ```
/// use edgepurge_xml::extract_error;
///
/// let body = "<ErrorResponse><Error><Code>Throttling</Code>\
///             <Message>Rate exceeded</Message></Error></ErrorResponse>";
/// let error = extract_error(body);
/// assert_eq!(error.code.as_deref(), Some("Throttling"));
/// assert_eq!(error.message.as_deref(), Some("Rate exceeded"));
/// ```
#[must_use]
pub fn extract_error(body: &str) -> ErrorBody {
    let Ok(tree) = parse_xml(body) else {
        return ErrorBody::default();
    };

    ErrorBody {
        code: find_text(&tree, "Code"),
        message: find_text(&tree, "Message"),
    }
}

fn find_text(value: &Value, key: &str) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get(key)
                && !text.is_empty()
            {
                return Some(text.clone());
            }
            map.values().find_map(|v| find_text(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_text(v, key)),
        _ => None,
    }
}
