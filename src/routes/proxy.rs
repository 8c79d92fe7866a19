use super::AppState;
use crate::proxy::RequestSpec;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub async fn proxy_request(
    State(state): State<AppState>,
    payload: Result<Json<RequestSpec>, JsonRejection>,
) -> Response {
    let Json(spec) = match payload {
        Ok(spec) => spec,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected proxy payload");
            // Wrongly shaped payloads are client errors too, not 422.
            let status = match &rejection {
                JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                    StatusCode::BAD_REQUEST
                }
                other => other.status(),
            };
            let body = Json(json!({
                "error": rejection.body_text(),
                "code": "INVALID_PAYLOAD",
            }));
            return (status, body).into_response();
        }
    };

    tracing::debug!(
        method = spec.method.as_str(),
        url = %spec.url,
        "Proxying request"
    );

    match state.proxy.execute(spec).await {
        Ok(envelope) => {
            tracing::debug!(
                status = envelope.status,
                duration = envelope.duration,
                "Request succeeded"
            );
            Json(envelope).into_response()
        }
        Err(e) => {
            tracing::warn!(code = e.code(), message = %e, "Request failed");
            e.into_response()
        }
    }
}
