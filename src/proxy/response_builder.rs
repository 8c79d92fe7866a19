//! Response building for the relay envelope.
//!
//! Converts raw origin output into a [`ResponseEnvelope`]: header flattening,
//! `Set-Cookie` extraction, decompression and best-effort body decoding.
//! Nothing here fails; malformed bodies degrade to text.

use super::types::{ResponseData, ResponseEnvelope};
use crate::error::ErrorKind;
use crate::infra::decompress_body;
use crate::shared::DetailedTiming;
use hyper::header::{HeaderMap, SET_COOKIE};
use std::collections::BTreeMap;

/// Separator used when an origin repeats a header.
pub const HEADER_JOIN: &str = ", ";

/// Whether the media type is JSON: `application/json`, the legacy
/// `text/json` and `application/x-json` aliases, or any `+json` suffix.
pub fn is_json_content(content_type: &str) -> bool {
    let essence = media_essence(content_type);
    matches!(
        essence.as_str(),
        "application/json" | "text/json" | "application/x-json"
    ) || essence.ends_with("+json")
}

/// Whether the media type is textual and should not be parsed.
pub fn is_text_content(content_type: &str) -> bool {
    let essence = media_essence(content_type);
    essence.starts_with("text/")
        || essence.ends_with("+xml")
        || matches!(
            essence.as_str(),
            "application/xml"
                | "application/javascript"
                | "application/x-javascript"
                | "application/ecmascript"
                | "application/x-www-form-urlencoded"
        )
}

fn media_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Flattens response headers into a name → value map plus the raw cookies.
///
/// Names are lowercase. Repeated headers are joined with [`HEADER_JOIN`] in
/// receipt order; every `Set-Cookie` value is also kept verbatim.
pub fn collect_headers(headers: &HeaderMap) -> (BTreeMap<String, String>, Vec<String>) {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    let mut cookies = Vec::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        if name == SET_COOKIE {
            cookies.push(value.clone());
        }
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(HEADER_JOIN);
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    (flat, cookies)
}

/// Decodes a body according to its declared content type.
///
/// Returns [`ErrorKind::DecodeFallback`] alongside the text when the origin
/// declared JSON but sent something unparseable.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> (ResponseData, Option<ErrorKind>) {
    let text = String::from_utf8_lossy(body).into_owned();

    match content_type {
        Some(ct) if is_json_content(ct) => {
            if text.trim().is_empty() {
                return (ResponseData::Text(text), None);
            }
            match serde_json::from_str(&text) {
                Ok(value) => (ResponseData::Json(value), None),
                Err(e) => {
                    tracing::warn!(error = %e, "Origin declared JSON but body did not parse");
                    (ResponseData::Text(text), Some(ErrorKind::DecodeFallback))
                }
            }
        }
        Some(ct) if is_text_content(ct) => (ResponseData::Text(text), None),
        // Absent or binary content types: keep JSON-looking payloads structured.
        _ => match looks_like_json(&text).then(|| serde_json::from_str(&text)) {
            Some(Ok(value)) => (ResponseData::Json(value), None),
            _ => (ResponseData::Text(text), None),
        },
    }
}

fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Raw material for one envelope.
pub struct ResponseBuildParams {
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body_bytes: Vec<u8>,
    pub timing: DetailedTiming,
    pub final_url: String,
    pub redirected: bool,
}

pub fn build_response(params: ResponseBuildParams) -> ResponseEnvelope {
    let ResponseBuildParams {
        status,
        status_text,
        headers,
        body_bytes,
        timing,
        final_url,
        redirected,
    } = params;

    let (flat_headers, cookies) = collect_headers(&headers);
    let content_type = flat_headers.get("content-type").map(String::as_str);
    let content_encoding = flat_headers.get("content-encoding").map(String::as_str);

    let body = match decompress_body(&body_bytes, content_encoding) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(
                encoding = content_encoding.unwrap_or_default(),
                error = %e,
                "Could not decompress body, returning raw bytes"
            );
            body_bytes
        }
    };

    let (data, notice) = decode_body(&body, content_type);

    ResponseEnvelope {
        status,
        status_text,
        data,
        duration: timing.total_ms(),
        cookies,
        size: body.len(),
        url: final_url,
        redirected,
        timing: timing.to_timing_info(),
        notice,
        headers: flat_headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use serde_json::json;

    #[test]
    fn test_content_type_classification() {
        assert!(is_json_content("application/json"));
        assert!(is_json_content("Application/JSON; charset=utf-8"));
        assert!(is_json_content("application/problem+json"));
        assert!(is_json_content("text/json"));
        assert!(is_json_content("application/x-json; charset=utf-8"));
        assert!(!is_json_content("text/json-ish"));

        assert!(is_text_content("text/html"));
        assert!(is_text_content("application/xml"));
        assert!(is_text_content("application/atom+xml"));
        assert!(!is_text_content("image/png"));
        assert!(!is_text_content("application/octet-stream"));
    }

    #[test]
    fn test_json_decodes_to_structure() {
        let (data, notice) = decode_body(br#"{"a":1}"#, Some("application/json"));
        assert_eq!(data, ResponseData::Json(json!({ "a": 1 })));
        assert_eq!(notice, None);
    }

    #[test]
    fn test_legacy_json_media_types_decode_to_structure() {
        for ct in ["text/json", "application/x-json"] {
            let (data, notice) = decode_body(br#"{"a":1}"#, Some(ct));
            assert_eq!(data, ResponseData::Json(json!({ "a": 1 })), "{}", ct);
            assert!(notice.is_none());
        }

        let (data, notice) = decode_body(b"{a:1", Some("text/json"));
        assert_eq!(data, ResponseData::Text("{a:1".to_string()));
        assert_eq!(notice, Some(ErrorKind::DecodeFallback));
    }

    #[test]
    fn test_malformed_json_falls_back_to_text() {
        let (data, notice) = decode_body(b"{a:1", Some("application/json"));
        assert_eq!(data, ResponseData::Text("{a:1".to_string()));
        assert_eq!(notice, Some(ErrorKind::DecodeFallback));
    }

    #[test]
    fn test_empty_json_body_is_empty_text() {
        let (data, notice) = decode_body(b"", Some("application/json"));
        assert_eq!(data, ResponseData::Text(String::new()));
        assert_eq!(notice, None);
    }

    #[test]
    fn test_text_is_not_parsed() {
        let (data, _) = decode_body(br#"{"a":1}"#, Some("text/plain"));
        assert_eq!(data.as_text(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_untyped_body_sniffed() {
        let (data, _) = decode_body(b"[1,2]", None);
        assert_eq!(data, ResponseData::Json(json!([1, 2])));

        let (data, notice) = decode_body(b"{broken", None);
        assert_eq!(data.as_text(), Some("{broken"));
        assert_eq!(notice, None);
    }

    #[test]
    fn test_binary_is_lossy_text() {
        let (data, _) = decode_body(&[0x89, b'P', b'N', b'G'], Some("image/png"));
        assert_eq!(data.as_text(), Some("\u{FFFD}PNG"));
    }

    #[test]
    fn test_collect_headers_joins_duplicates_and_keeps_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2; Path=/"));
        headers.append("x-multi", HeaderValue::from_static("one"));
        headers.append("x-multi", HeaderValue::from_static("two"));

        let (flat, cookies) = collect_headers(&headers);

        assert_eq!(cookies, vec!["a=1", "b=2; Path=/"]);
        assert_eq!(flat["set-cookie"], "a=1, b=2; Path=/");
        assert_eq!(flat["x-multi"], "one, two");
        assert_eq!(flat["content-type"], "text/plain");
    }

    #[test]
    fn test_build_response_decompresses() {
        use std::io::Write;

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(br#"{"ok":true}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("content-encoding", HeaderValue::from_static("gzip"));

        let envelope = build_response(ResponseBuildParams {
            status: 200,
            status_text: "OK".into(),
            headers,
            body_bytes: compressed,
            timing: DetailedTiming::new(),
            final_url: "http://localhost/".into(),
            redirected: false,
        });

        assert_eq!(envelope.data, ResponseData::Json(json!({ "ok": true })));
        assert_eq!(envelope.size, 11);
        assert!(envelope.cookies.is_empty());
    }

    #[test]
    fn test_build_response_survives_bad_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert("content-encoding", HeaderValue::from_static("gzip"));

        let envelope = build_response(ResponseBuildParams {
            status: 200,
            status_text: "OK".into(),
            headers,
            body_bytes: b"plain after all".to_vec(),
            timing: DetailedTiming::new(),
            final_url: "http://localhost/".into(),
            redirected: false,
        });

        assert_eq!(envelope.data.as_text(), Some("plain after all"));
    }
}
