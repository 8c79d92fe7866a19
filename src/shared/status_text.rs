use hyper::{ext::ReasonPhrase, StatusCode};

/// Canonical reason phrase for `status`, or `"Unknown"`.
pub fn status_text(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
        .to_string()
}

/// Reason phrase the origin sent on the wire, falling back to the canonical one.
pub fn reason_phrase<B>(response: &hyper::Response<B>) -> String {
    response
        .extensions()
        .get::<ReasonPhrase>()
        .and_then(|r| std::str::from_utf8(r.as_bytes()).ok())
        .map(str::to_string)
        .unwrap_or_else(|| status_text(response.status().as_u16()))
}
