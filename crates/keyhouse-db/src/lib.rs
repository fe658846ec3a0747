//! Store HTTP Adapter
//!
//! A thin HTTP surface in front of the storage engine:
//!
//! - `POST /db/{key}` with body `{"value": <string | integer>}` writes a
//!   record. Integers must be exactly representable as a signed 64-bit
//!   value; anything else in the `value` field is a 400.
//! - `GET /db/{key}?type={string|int64}` reads the current value back as
//!   `{"key": ..., "value": ...}`. `type` defaults to `string`. A missing
//!   key — or a stored value of the other type — is a 404; an unknown
//!   `type` is a 400.
//!
//! Any other path is a 404 and any other method on `/db/*` is a 405.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use keyhouse_core::{Value, ValueKind};
use keyhouse_store::{Error as StoreError, Store};
use serde_json::json;
use tracing::{debug, error};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
}

/// Create the adapter router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/db/:key", get(get_value).post(put_value))
        .with_state(state)
}

async fn get_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let requested = params.get("type").map(String::as_str).unwrap_or("string");
    let kind = match requested {
        "string" => ValueKind::Str,
        "int64" => ValueKind::Int64,
        other => {
            debug!(key, requested = other, "unknown value type");
            return (StatusCode::BAD_REQUEST, "invalid type").into_response();
        }
    };

    match state.store.get(&key, kind).await {
        Ok(value) => Json(json!({ "key": key, "value": value })).into_response(),
        Err(StoreError::NotFound) | Err(StoreError::TypeMismatch { .. }) => {
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            error!(key, error = %err, "get failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn put_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = payload else {
        return (StatusCode::BAD_REQUEST, "invalid JSON").into_response();
    };
    let Some(raw) = body.get("value") else {
        return (StatusCode::BAD_REQUEST, "\"value\" field missing").into_response();
    };

    let value = match raw {
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Number(n) => match as_exact_i64(n) {
            Some(int) => Value::Int64(int),
            None => {
                return (StatusCode::BAD_REQUEST, "value must be int64 or string")
                    .into_response()
            }
        },
        _ => {
            return (StatusCode::BAD_REQUEST, "unsupported value type").into_response();
        }
    };

    match state.store.put(&key, value).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            error!(key, error = %err, "put failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "db error").into_response()
        }
    }
}

/// Interpret a JSON number as an i64 only if it is exactly representable.
///
/// Accepts integral floats like `5.0`; rejects fractions and magnitudes
/// outside the signed 64-bit range.
fn as_exact_i64(n: &serde_json::Number) -> Option<i64> {
    if let Some(int) = n.as_i64() {
        return Some(int);
    }
    let f = n.as_f64()?;
    // i64::MAX as f64 rounds up to 2^63, so `<` excludes everything that
    // would saturate on the cast.
    if f.fract() != 0.0 || f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return None;
    }
    Some(f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(raw: &str) -> serde_json::Number {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_exact_i64_plain_integers() {
        assert_eq!(as_exact_i64(&num("0")), Some(0));
        assert_eq!(as_exact_i64(&num("-5")), Some(-5));
        assert_eq!(as_exact_i64(&num("9223372036854775807")), Some(i64::MAX));
        assert_eq!(as_exact_i64(&num("-9223372036854775808")), Some(i64::MIN));
    }

    #[test]
    fn test_exact_i64_integral_floats() {
        assert_eq!(as_exact_i64(&num("5.0")), Some(5));
        assert_eq!(as_exact_i64(&num("-12.0")), Some(-12));
    }

    #[test]
    fn test_exact_i64_rejects_fractions() {
        assert_eq!(as_exact_i64(&num("5.5")), None);
        assert_eq!(as_exact_i64(&num("-0.25")), None);
    }

    #[test]
    fn test_exact_i64_rejects_out_of_range() {
        assert_eq!(as_exact_i64(&num("18446744073709551615")), None);
        assert_eq!(as_exact_i64(&num("1e19")), None);
        assert_eq!(as_exact_i64(&num("-1e19")), None);
        assert_eq!(as_exact_i64(&num("9223372036854775808")), None);
    }
}
