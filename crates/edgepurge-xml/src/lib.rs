//! XML layer for the CloudFront control-plane API.
//!
//! CloudFront speaks RestXml. This crate covers the three pieces of that
//! protocol edgepurge needs:
//!
//! - [`invalidation_batch_to_xml`] builds the `CreateInvalidation` request body
//! - [`parse_xml`] turns a response body into a [`serde_json::Value`] tree, and
//!   [`parse_xml_or_raw`] degrades to `{"raw_response": body}` on bad input
//! - [`extract_error`] pulls `Code` and `Message` out of an error body
//!
//! # CloudFront XML conventions
//!
//! - Namespace: `http://cloudfront.amazonaws.com/doc/2020-05-31/`
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`
//! - Errors: `<ErrorResponse><Error><Code/><Message/></Error></ErrorResponse>`

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{RAW_RESPONSE_KEY, parse_xml, parse_xml_or_raw};
pub use error::{ErrorBody, XmlError, extract_error};
pub use serialize::{CLOUDFRONT_NAMESPACE, invalidation_batch_to_xml};
