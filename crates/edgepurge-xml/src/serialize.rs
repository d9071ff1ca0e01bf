//! CloudFront request body serialization.

use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::error::XmlError;

/// The CloudFront XML namespace for API version `2020-05-31`.
pub const CLOUDFRONT_NAMESPACE: &str = "http://cloudfront.amazonaws.com/doc/2020-05-31/";

/// Serialize a `CreateInvalidation` request body.
///
/// Paths are written in the given order and XML-escaped.
///
/// # Examples
///
/// ```
/// use edgepurge_xml::invalidation_batch_to_xml;
///
/// let xml = invalidation_batch_to_xml(&["/a&b".to_owned()], "ref-1").unwrap();
/// let xml = String::from_utf8(xml).unwrap();
/// assert!(xml.contains("<Quantity>1</Quantity>"));
/// assert!(xml.contains("<Path>/a&amp;b</Path>"));
/// ```
///
/// # Errors
///
/// Returns `XmlError` if writing the document fails.
pub fn invalidation_batch_to_xml(
    paths: &[String],
    caller_reference: &str,
) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(256 + paths.len() * 64);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element("InvalidationBatch")
        .with_attribute(("xmlns", CLOUDFRONT_NAMESPACE))
        .write_inner_content(|w| {
            w.create_element("Paths").write_inner_content(|w| {
                write_text_element(w, "Quantity", &paths.len().to_string())?;
                w.create_element("Items").write_inner_content(|w| {
                    for path in paths {
                        write_text_element(w, "Path", path)?;
                    }
                    Ok(())
                })?;
                Ok(())
            })?;
            write_text_element(w, "CallerReference", caller_reference)
        })?;

    Ok(buf)
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}
