use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}
impl StatusResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { status: "ok" })
    }

    pub fn healthy() -> Json<Self> {
        Json(Self { status: "healthy" })
    }
}

#[derive(Serialize)]
pub struct SetWebhookResponse {
    pub success: bool,
    pub url: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}
impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                success: false,
                error: self.message,
            }),
        )
            .into_response()
    }
}
