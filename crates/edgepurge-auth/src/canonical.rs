//! SigV4 canonical request pieces.
//!
//! The signer hashes a canonical rendering of the request:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! where every canonical header line, the last one included, ends with `\n`.
//! Each component is normalized so that the signature is deterministic.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// The set of characters that must be percent-encoded.
///
/// Per RFC 3986, everything except unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`) is encoded.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the full canonical request string from already canonicalized parts.
///
/// # Examples
///
/// ```
/// use edgepurge_auth::canonical::build_canonical_request;
///
/// let canonical = build_canonical_request(
///     "GET",
///     "/test.txt",
///     "",
///     "host:examplebucket.s3.amazonaws.com\n",
///     "host",
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// );
/// assert!(canonical.starts_with("GET\n/test.txt\n\nhost:"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    canonical_uri: &str,
    canonical_query: &str,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    )
}

/// Split a request target into its path and (possibly empty) query string.
///
/// # Examples
///
/// ```
/// use edgepurge_auth::canonical::split_path_and_query;
///
/// assert_eq!(split_path_and_query("/a/b?x=1"), ("/a/b", "x=1"));
/// assert_eq!(split_path_and_query("/a/b"), ("/a/b", ""));
/// ```
#[must_use]
pub fn split_path_and_query(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

/// Percent-encode a request path segment by segment, keeping the slashes.
///
/// An empty path becomes `/`.
///
/// # Examples
///
/// ```
/// use edgepurge_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/2020-05-31/distribution/E1"), "/2020-05-31/distribution/E1");
/// assert_eq!(build_canonical_uri(""), "/");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| {
            // Decode first so an already percent-encoded path is not encoded twice.
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            uri_encode(&decoded)
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical query string.
///
/// Each key and value is decoded, re-encoded per RFC 3986 and the pairs are
/// sorted by key, then by value, in byte order.
///
/// # Examples
///
/// ```
/// use edgepurge_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// assert_eq!(build_canonical_query_string("Marker=a b"), "Marker=a%20b");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (k, v) = param.split_once('=').unwrap_or((param, ""));
            (encode_query_component(k), encode_query_component(v))
        })
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers block from a sorted, lower-cased header map.
///
/// Every line has the form `name:value\n`. Values are trimmed and runs of
/// whitespace are collapsed to a single space.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
///
/// use edgepurge_auth::canonical::build_canonical_headers;
///
/// let mut headers = BTreeMap::new();
/// headers.insert("x-amz-date".to_owned(), "20130524T000000Z".to_owned());
/// headers.insert("host".to_owned(), "  example.com ".to_owned());
/// assert_eq!(
///     build_canonical_headers(&headers),
///     "host:example.com\nx-amz-date:20130524T000000Z\n"
/// );
/// ```
#[must_use]
pub fn build_canonical_headers(headers: &BTreeMap<String, String>) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", collapse_whitespace(value.trim())))
        .collect()
}

/// Sorted, `;`-joined header names for the `SignedHeaders` component.
///
/// # Examples
///
/// ```
/// use edgepurge_auth::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["x-amz-date", "host"]),
///     "host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted: Vec<&str> = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Normalize header names to lowercase, merging duplicates with commas.
#[must_use]
pub fn normalize_headers<'a>(
    headers: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> BTreeMap<String, String> {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        header_map
            .entry(name.trim().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }
    header_map
}

fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

fn encode_query_component(raw: &str) -> String {
    uri_encode(&percent_decode_str(raw).decode_utf8_lossy())
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_keep_resource_paths_unchanged() {
        assert_eq!(
            build_canonical_uri("/2020-05-31/distribution/E2QWRUHAPOMQZL/invalidation"),
            "/2020-05-31/distribution/E2QWRUHAPOMQZL/invalidation"
        );
    }

    #[test]
    fn test_should_normalize_empty_path_to_slash() {
        assert_eq!(build_canonical_uri(""), "/");
        assert_eq!(build_canonical_uri("/"), "/");
    }

    #[test]
    fn test_should_encode_path_segments_once() {
        assert_eq!(build_canonical_uri("/inv id/a+b"), "/inv%20id/a%2Bb");
        assert_eq!(build_canonical_uri("/inv%20id"), build_canonical_uri("/inv id"));
    }

    #[test]
    fn test_should_sort_query_parameters() {
        assert_eq!(
            build_canonical_query_string("MaxItems=5&Marker=I1"),
            "Marker=I1&MaxItems=5"
        );
    }

    #[test]
    fn test_should_sort_by_byte_order() {
        // Uppercase sorts before lowercase in byte order.
        assert_eq!(
            build_canonical_query_string("marker=x&MaxItems=10"),
            "MaxItems=10&marker=x"
        );
    }

    #[test]
    fn test_should_sort_duplicate_query_keys_by_value() {
        assert_eq!(build_canonical_query_string("k=b&k=a"), "k=a&k=b");
    }

    #[test]
    fn test_should_encode_reserved_query_characters() {
        assert_eq!(
            build_canonical_query_string("path=/a/*&x=a:b"),
            "path=%2Fa%2F%2A&x=a%3Ab"
        );
    }

    #[test]
    fn test_should_not_double_encode_query() {
        assert_eq!(build_canonical_query_string("Marker=a%20b"), "Marker=a%20b");
    }

    #[test]
    fn test_should_keep_keys_without_values() {
        assert_eq!(build_canonical_query_string("flag&a=1"), "a=1&flag=");
    }

    #[test]
    fn test_should_collapse_whitespace_in_header_values() {
        let headers = normalize_headers([
            ("Host", "  cloudfront.amazonaws.com "),
            ("Content-Type", "text/xml;   charset=utf-8"),
        ]);
        assert_eq!(
            build_canonical_headers(&headers),
            "content-type:text/xml; charset=utf-8\nhost:cloudfront.amazonaws.com\n"
        );
    }

    #[test]
    fn test_should_lowercase_and_merge_duplicate_headers() {
        let headers = normalize_headers([("X-Dup", "1"), ("x-dup", "2"), ("Host", "h")]);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["x-dup"], "1,2");
    }

    #[test]
    fn test_should_build_canonical_request_matching_aws_example() {
        use sha2::{Digest, Sha256};

        // Published SigV4 vector for an S3 ranged GET.
        let headers = normalize_headers([
            ("host", "examplebucket.s3.amazonaws.com"),
            ("range", "bytes=0-9"),
            (
                "x-amz-content-sha256",
                "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            ),
            ("x-amz-date", "20130524T000000Z"),
        ]);
        let names: Vec<&str> = headers.keys().map(String::as_str).collect();

        let canonical = build_canonical_request(
            "GET",
            &build_canonical_uri("/test.txt"),
            &build_canonical_query_string(""),
            &build_canonical_headers(&headers),
            &build_signed_headers_string(&names),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        );

        let expected = "GET\n\
                        /test.txt\n\
                        \n\
                        host:examplebucket.s3.amazonaws.com\n\
                        range:bytes=0-9\n\
                        x-amz-content-sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855\n\
                        x-amz-date:20130524T000000Z\n\
                        \n\
                        host;range;x-amz-content-sha256;x-amz-date\n\
                        e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(canonical, expected);

        let hash = hex::encode(Sha256::digest(canonical.as_bytes()));
        assert_eq!(
            hash,
            "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972"
        );
    }
}
