//! Translates [`BusError`] into the JSON error shape the HTTP surface uses
//! (spec §7: "HTTP handlers translate exceptions into JSON with status
//! 400/404/500").

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use orch_core::BusError;
use serde::Deserialize;
use serde_json::json;

pub struct ApiError(pub BusError);

impl From<BusError> for ApiError {
    fn from(e: BusError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.http_status();
        (status, Json(self.0.tool_envelope())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn ok_json(fields: serde_json::Value) -> Json<serde_json::Value> {
    let mut obj = match fields {
        serde_json::Value::Object(m) => m,
        other => {
            let mut m = serde_json::Map::new();
            m.insert("data".to_string(), other);
            m
        }
    };
    obj.insert("ok".to_string(), json!(true));
    Json(serde_json::Value::Object(obj))
}

/// Common `?limit=` query param, parsed defensively (spec §4.L: "all query
/// params pass through `_safe_int` clamps before reaching the store").
#[derive(Debug, Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub type LimitParam = Query<LimitQuery>;
