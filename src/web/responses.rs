use axum::Json;
use serde::Serialize;

/// Canonical JSON envelope for successful responses.
#[derive(Debug, Serialize, Clone)]
pub struct ApiData<T> {
    pub status: &'static str,
    pub data: T,
}

/// Wrap a payload in the standard `{status:"success", data}` envelope.
pub fn json_success<T: Serialize>(data: T) -> Json<ApiData<T>> {
    Json(ApiData {
        status: "success",
        data,
    })
}

/// Success response with no payload, used by delete endpoints.
#[derive(Debug, Serialize, Clone)]
pub struct ApiStatus {
    pub status: &'static str,
}

pub fn json_ok() -> Json<ApiStatus> {
    Json(ApiStatus { status: "success" })
}
