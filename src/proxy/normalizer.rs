//! Turns a declarative [`RequestSpec`] into a [`ConcreteRequest`].
//!
//! Normalization is pure: no I/O happens here, so every validation failure is
//! reported before the executor opens a socket.

use super::auth::{apply_auth, upsert, Pairs};
use super::types::{BodyType, ConcreteRequest, KeyValue, RequestSpec};
use crate::error::ProxyError;
use hyper::header::{HeaderName, HeaderValue};

/// Collects enabled rows with a non-empty key; later duplicates win.
fn merge_enabled(rows: &[KeyValue], ignore_case: bool) -> Pairs {
    let mut merged = Pairs::new();
    for row in rows.iter().filter(|r| r.enabled && !r.key.is_empty()) {
        upsert(&mut merged, &row.key, &row.value, ignore_case);
    }
    merged
}

fn parse_url(raw: &str) -> Result<url::Url, ProxyError> {
    let url = url::Url::parse(raw).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProxyError::InvalidUrl(format!(
            "unsupported scheme `{}`",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ProxyError::InvalidUrl("URL has no host".to_string()));
    }

    Ok(url)
}

fn validate_headers(headers: &Pairs) -> Result<(), ProxyError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProxyError::InvalidHeader(format!("`{}`: {}", name, e)))?;
        HeaderValue::from_str(value)
            .map_err(|e| ProxyError::InvalidHeader(format!("value for `{}`: {}", name, e)))?;
    }
    Ok(())
}

/// Resolves the final URL, headers and body for `spec`.
pub fn normalize(spec: &RequestSpec) -> Result<ConcreteRequest, ProxyError> {
    let raw_url = spec.url.trim();
    if raw_url.is_empty() {
        return Err(ProxyError::MissingUrl);
    }
    let mut url = parse_url(raw_url)?;

    let mut query = merge_enabled(&spec.query_params, false);
    let mut headers = merge_enabled(&spec.headers, true);
    apply_auth(&spec.auth, &mut headers, &mut query)?;

    // Appended after whatever the URL already carried, never deduplicated.
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &query {
            pairs.append_pair(key, value);
        }
    }

    let body = if spec.method.allows_body() && !spec.body.is_empty() {
        match spec.body_type {
            BodyType::Json => {
                let value: serde_json::Value = serde_json::from_str(&spec.body)?;
                if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                    headers.push(("Content-Type".to_string(), "application/json".to_string()));
                }
                Some(value.to_string())
            }
            BodyType::Raw => Some(spec.body.clone()),
        }
    } else {
        None
    };

    validate_headers(&headers)?;

    Ok(ConcreteRequest {
        method: spec.method,
        url,
        headers,
        body,
        timeout_ms: spec.timeout.filter(|ms| *ms > 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::proxy::types::{ApiKeyLocation, AuthConfig, HttpMethod};

    fn spec(method: HttpMethod, url: &str) -> RequestSpec {
        RequestSpec {
            method,
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_url_is_missing() {
        for url in ["", "   "] {
            let err = normalize(&spec(HttpMethod::Get, url)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingUrl);
        }
    }

    #[test]
    fn test_invalid_urls() {
        for url in ["not a url", "ftp://example.com/file", "example.com/path"] {
            let err = normalize(&spec(HttpMethod::Get, url)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidUrl, "{}", url);
        }
    }

    #[test]
    fn test_query_appended_to_plain_url() {
        let mut s = spec(HttpMethod::Get, "https://api.example.com/search");
        s.query_params = vec![KeyValue::new("q", "x")];

        let req = normalize(&s).unwrap();
        assert_eq!(req.url.as_str(), "https://api.example.com/search?q=x");
    }

    #[test]
    fn test_query_appended_after_existing_query() {
        let mut s = spec(HttpMethod::Get, "https://api.example.com/search?page=2&q=y");
        s.query_params = vec![KeyValue::new("q", "x")];

        let req = normalize(&s).unwrap();
        assert_eq!(
            req.url.as_str(),
            "https://api.example.com/search?page=2&q=y&q=x"
        );
    }

    #[test]
    fn test_last_enabled_duplicate_wins() {
        let mut s = spec(HttpMethod::Get, "http://localhost/items");
        s.query_params = vec![
            KeyValue::new("q", "first"),
            KeyValue::new("limit", "10"),
            KeyValue::new("q", "second"),
            KeyValue::disabled("q", "ignored"),
            KeyValue::new("", "nokey"),
        ];

        let req = normalize(&s).unwrap();
        assert_eq!(req.url.query(), Some("q=second&limit=10"));
    }

    #[test]
    fn test_disabled_headers_are_dropped() {
        let mut s = spec(HttpMethod::Get, "http://localhost/");
        s.headers = vec![
            KeyValue::new("X-One", "1"),
            KeyValue::disabled("X-Two", "2"),
            KeyValue::new("x-one", "override"),
        ];

        let req = normalize(&s).unwrap();
        assert_eq!(req.headers, vec![("x-one".to_string(), "override".to_string())]);
    }

    #[test]
    fn test_auth_wins_over_user_header() {
        let mut s = spec(HttpMethod::Get, "http://localhost/");
        s.headers = vec![KeyValue::new("Authorization", "old")];
        s.auth = AuthConfig::Bearer { token: "abc".into() };

        let req = normalize(&s).unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_empty_bearer_token_rejected() {
        let mut s = spec(HttpMethod::Get, "http://localhost/");
        s.headers = vec![KeyValue::new("Authorization", "Bearer real")];
        s.auth = AuthConfig::Bearer { token: String::new() };

        let err = normalize(&s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAuth);
        assert!(err.is_validation());
    }

    #[test]
    fn test_empty_basic_username_rejected() {
        let mut s = spec(HttpMethod::Get, "http://localhost/");
        s.auth = AuthConfig::Basic {
            username: " ".into(),
            password: "secret".into(),
        };

        let err = normalize(&s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAuth);
    }

    #[test]
    fn test_empty_apikey_name_rejected() {
        let mut s = spec(HttpMethod::Get, "http://localhost/");
        s.auth = AuthConfig::Apikey {
            key: String::new(),
            value: "v".into(),
            add_to: ApiKeyLocation::Query,
        };

        let err = normalize(&s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAuth);
    }

    #[test]
    fn test_nested_auth_shape_is_not_accepted() {
        let payload = serde_json::json!({
            "url": "http://localhost/",
            "headers": [{ "key": "Authorization", "value": "Bearer real" }],
            "auth": { "type": "bearer", "bearer": { "token": "abc" } }
        });
        assert!(serde_json::from_value::<RequestSpec>(payload).is_err());
    }

    #[test]
    fn test_apikey_query_lands_in_url() {
        let mut s = spec(HttpMethod::Get, "http://localhost/data?x=1");
        s.auth = AuthConfig::Apikey {
            key: "api_key".into(),
            value: "s3cret".into(),
            add_to: ApiKeyLocation::Query,
        };

        let req = normalize(&s).unwrap();
        assert_eq!(req.url.query(), Some("x=1&api_key=s3cret"));
    }

    #[test]
    fn test_invalid_json_body_rejected() {
        let mut s = spec(HttpMethod::Post, "http://localhost/");
        s.body = "{a:1".into();

        let err = normalize(&s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequestBody);
    }

    #[test]
    fn test_json_body_serialized_with_content_type() {
        let mut s = spec(HttpMethod::Put, "http://localhost/");
        s.body = "{ \"a\": 1 }".into();

        let req = normalize(&s).unwrap();
        assert_eq!(req.body.as_deref(), Some("{\"a\":1}"));
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_user_content_type_is_kept() {
        let mut s = spec(HttpMethod::Post, "http://localhost/");
        s.body = "[1,2]".into();
        s.headers = vec![KeyValue::new("content-type", "application/vnd.api+json")];

        let req = normalize(&s).unwrap();
        assert_eq!(req.header("Content-Type"), Some("application/vnd.api+json"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_raw_body_passes_through() {
        let mut s = spec(HttpMethod::Patch, "http://localhost/");
        s.body = "{not json".into();
        s.body_type = BodyType::Raw;

        let req = normalize(&s).unwrap();
        assert_eq!(req.body.as_deref(), Some("{not json"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn test_body_ignored_for_get_and_delete() {
        for method in [HttpMethod::Get, HttpMethod::Delete] {
            let mut s = spec(method, "http://localhost/");
            s.body = "{broken".into();

            let req = normalize(&s).unwrap();
            assert!(req.body.is_none());
        }
    }

    #[test]
    fn test_empty_body_not_attached() {
        let req = normalize(&spec(HttpMethod::Post, "http://localhost/")).unwrap();
        assert!(req.body.is_none());
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let mut s = spec(HttpMethod::Get, "http://localhost/");
        s.headers = vec![KeyValue::new("Bad Header", "x")];

        let err = normalize(&s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHeader);
    }

    #[test]
    fn test_spec_is_not_mutated() {
        let mut s = spec(HttpMethod::Post, "http://localhost/?a=1");
        s.body = "{}".into();
        s.auth = AuthConfig::Bearer { token: "t".into() };
        let before = serde_json::to_value(&s).unwrap();

        normalize(&s).unwrap();
        assert_eq!(serde_json::to_value(&s).unwrap(), before);
    }

    #[test]
    fn test_timeout_override() {
        let mut s = spec(HttpMethod::Get, "http://localhost/");
        s.timeout = Some(0);
        assert_eq!(normalize(&s).unwrap().timeout_ms, None);
        s.timeout = Some(250);
        assert_eq!(normalize(&s).unwrap().timeout_ms, Some(250));
    }
}
