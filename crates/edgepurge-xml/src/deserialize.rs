//! CloudFront response parsing into a generic key/value tree.
//!
//! Responses are parsed into a [`serde_json::Value`]:
//!
//! - the root element is unwrapped, so `<Invalidation><Id>X</Id></Invalidation>`
//!   becomes `{"Id": "X"}`,
//! - an element with child elements becomes an object,
//! - an element without child elements becomes its trimmed text,
//! - a child element name that occurs more than once becomes an array.
//!
//! Attributes are ignored. Only the five predefined entities and character
//! references are expanded; a DOCTYPE is skipped and never interpreted, and any
//! other entity reference makes the document malformed.

use quick_xml::Reader;
use quick_xml::events::{BytesRef, BytesStart, Event};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::XmlError;

/// Key under which [`parse_xml_or_raw`] stores a body it could not parse.
pub const RAW_RESPONSE_KEY: &str = "raw_response";

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Map::new(),
            text: String::new(),
        }
    }

    fn finish(self) -> (String, Value) {
        let value = if self.children.is_empty() {
            Value::String(self.text.trim().to_owned())
        } else {
            Value::Object(self.children)
        };
        (self.name, value)
    }
}

/// Parse an XML document into a [`Value`] tree.
///
/// # Examples
///
/// ```
/// use edgepurge_xml::parse_xml;
///
/// let tree = parse_xml("<Invalidation><Id>I1</Id><Status>InProgress</Status></Invalidation>").unwrap();
/// assert_eq!(tree["Id"], "I1");
/// assert_eq!(tree["Status"], "InProgress");
/// ```
///
/// # Errors
///
/// Returns `XmlError` if the document is not well formed, has no root element
/// or references an entity that is not predefined.
pub fn parse_xml(body: &str) -> Result<Value, XmlError> {
    let mut reader = Reader::from_str(body);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(XmlError::Malformed("multiple root elements".to_owned()));
                }
                stack.push(Frame::new(element_name(&e)?));
            }
            Event::Empty(e) => {
                let name = element_name(&e)?;
                attach(&mut stack, &mut root, name, Value::String(String::new()))?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| XmlError::Malformed("unbalanced end tag".to_owned()))?;
                let (name, value) = frame.finish();
                attach(&mut stack, &mut root, name, value)?;
            }
            Event::Text(e) => {
                let text = e
                    .decode()
                    .map_err(|err| XmlError::Malformed(err.to_string()))?;
                push_text(&mut stack, &text)?;
            }
            Event::CData(e) => {
                let raw = e.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&raw))?;
            }
            Event::GeneralRef(e) => {
                let resolved = resolve_reference(&e)?;
                push_text(&mut stack, &resolved)?;
            }
            Event::DocType(_) => debug!("skipping DOCTYPE declaration"),
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::Malformed(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| XmlError::Malformed("missing root element".to_owned()))
}

/// Parse an XML document, falling back to `{"raw_response": body}`.
///
/// # Examples
///
/// ```
/// use edgepurge_xml::parse_xml_or_raw;
///
/// let tree = parse_xml_or_raw("<html><body>oops");
/// assert_eq!(tree["raw_response"], "<html><body>oops");
/// ```
#[must_use]
pub fn parse_xml_or_raw(body: &str) -> Value {
    match parse_xml(body) {
        Ok(tree) => tree,
        Err(e) => {
            warn!(error = %e, "response body is not well-formed XML");
            let mut map = Map::new();
            map.insert(RAW_RESPONSE_KEY.to_owned(), Value::String(body.to_owned()));
            Value::Object(map)
        }
    }
}

fn element_name(e: &BytesStart<'_>) -> Result<String, XmlError> {
    let local = e.local_name();
    std::str::from_utf8(local.as_ref())
        .map(ToOwned::to_owned)
        .map_err(|err| XmlError::Malformed(err.to_string()))
}

fn push_text(stack: &mut [Frame], text: &str) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(frame) => {
            frame.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::Malformed(
            "text outside of the root element".to_owned(),
        )),
    }
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<Value>,
    name: String,
    value: Value,
) -> Result<(), XmlError> {
    let Some(parent) = stack.last_mut() else {
        if root.is_some() {
            return Err(XmlError::Malformed("multiple root elements".to_owned()));
        }
        *root = Some(value);
        return Ok(());
    };

    match parent.children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.children.insert(name, value);
        }
    }
    Ok(())
}

fn resolve_reference(e: &BytesRef<'_>) -> Result<String, XmlError> {
    if let Some(ch) = e
        .resolve_char_ref()
        .map_err(|err| XmlError::Malformed(err.to_string()))?
    {
        return Ok(ch.to_string());
    }

    let name = e
        .decode()
        .map_err(|err| XmlError::Malformed(err.to_string()))?;
    quick_xml::escape::resolve_predefined_entity(&name)
        .map(ToOwned::to_owned)
        .ok_or_else(|| XmlError::Malformed(format!("undefined entity &{name};")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_should_parse_invalidation_response() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
            <Invalidation xmlns="http://cloudfront.amazonaws.com/doc/2020-05-31/">
              <Id>I2J0I21PCUYOIK</Id>
              <Status>InProgress</Status>
              <CreateTime>2024-05-01T12:00:00.000Z</CreateTime>
              <InvalidationBatch>
                <Paths>
                  <Quantity>2</Quantity>
                  <Items><Path>/</Path><Path>/hello-world/*</Path></Items>
                </Paths>
                <CallerReference>edgepurge-1</CallerReference>
              </InvalidationBatch>
            </Invalidation>"#;

        let tree = parse_xml(body).unwrap();
        assert_eq!(tree["Id"], "I2J0I21PCUYOIK");
        assert_eq!(tree["Status"], "InProgress");
        assert_eq!(
            tree["InvalidationBatch"]["Paths"]["Items"]["Path"],
            json!(["/", "/hello-world/*"])
        );
        assert_eq!(tree["InvalidationBatch"]["CallerReference"], "edgepurge-1");
    }

    #[test]
    fn test_should_keep_single_child_as_scalar() {
        let tree = parse_xml("<List><Items><Path>/a</Path></Items></List>").unwrap();
        assert_eq!(tree["Items"]["Path"], "/a");
    }

    #[test]
    fn test_should_parse_empty_elements() {
        let tree = parse_xml("<List><Marker/><IsTruncated>false</IsTruncated></List>").unwrap();
        assert_eq!(tree["Marker"], "");
        assert_eq!(tree["IsTruncated"], "false");
    }

    #[test]
    fn test_should_expand_predefined_and_char_entities() {
        let tree = parse_xml("<R><Path>/a&amp;b&#47;c&#x2A;</Path></R>").unwrap();
        assert_eq!(tree["Path"], "/a&b/c*");
    }

    #[test]
    fn test_should_read_cdata() {
        let tree = parse_xml("<R><Message><![CDATA[a <b> c]]></Message></R>").unwrap();
        assert_eq!(tree["Message"], "a <b> c");
    }

    #[test]
    fn test_should_reject_custom_entities() {
        let body = r#"<?xml version="1.0"?>
            <!DOCTYPE R [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
            <R><Message>&xxe;</Message></R>"#;
        assert!(parse_xml(body).is_err());
    }

    #[test]
    fn test_should_reject_malformed_documents() {
        assert!(parse_xml("").is_err());
        assert!(parse_xml("not xml at all").is_err());
        assert!(parse_xml("<A><B></B>").is_err());
        assert!(parse_xml("<A></A><B></B>").is_err());
    }

    #[test]
    fn test_should_degrade_to_raw_response() {
        let tree = parse_xml_or_raw("<Error><Code>Oops");
        assert_eq!(tree, json!({ "raw_response": "<Error><Code>Oops" }));
    }
}
