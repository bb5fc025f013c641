mod routes;
mod types;

use crate::http::routes::*;
use crate::http::types::HttpError;
use crate::relay::Relay;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::routing::{get, post};
use subtle::ConstantTimeEq;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, warn};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
pub struct HttpState {
    pub relay: Relay,
    pub webhook_secret: Option<String>,
}

async fn secret_token_middleware(
    axum::extract::State(expected_token): axum::extract::State<String>,
    headers: axum::http::HeaderMap,
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, HttpError> {
    let token_header = headers.get(SECRET_TOKEN_HEADER).ok_or(HttpError {
        status: StatusCode::UNAUTHORIZED,
        message: "Missing secret token header".to_string(),
    })?;

    let token = token_header.to_str().map_err(|_| HttpError {
        status: StatusCode::BAD_REQUEST,
        message: "Invalid secret token header".to_string(),
    })?;

    if !bool::from(token.as_bytes().ct_eq(expected_token.as_bytes())) {
        return Err(HttpError {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid secret token".to_string(),
        });
    }

    Ok(next.run(request).await)
}

pub fn create_app(state: HttpState) -> axum::Router {
    let mut webhook_route = post(webhook);
    match &state.webhook_secret {
        Some(secret) => {
            debug!("Adding webhook secret token middleware!");
            webhook_route = webhook_route.route_layer(axum::middleware::from_fn_with_state(
                secret.clone(),
                secret_token_middleware,
            ));
        }
        None => warn!(
            "Serving webhook without secret token verification, as TELEGRAM_WEBHOOK_SECRET is not set!"
        ),
    }

    axum::Router::new()
        .route("/webhook", webhook_route)
        .route("/set_webhook", get(set_webhook))
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-version"),
            HeaderValue::from_static(crate::VERSION),
        ))
        .with_state(state)
}
