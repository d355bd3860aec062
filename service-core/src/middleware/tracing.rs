//! Inbound correlation ids.
//!
//! Every request leaving the router carries an `x-request-id`: the caller's
//! own when it sent a usable one, a fresh v4 uuid otherwise. Provider calls
//! made while handling the request log under the same id.

use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::observability::REQUEST_ID_HEADER;

fn incoming_request_id(req: &Request) -> Option<HeaderValue> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .filter(|value| value.to_str().map(|s| !s.trim().is_empty()).unwrap_or(false))
        .cloned()
}

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = match incoming_request_id(&req) {
        Some(value) => value,
        None => match HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            Ok(value) => value,
            Err(_) => return next.run(req).await,
        },
    };

    req.headers_mut()
        .insert(REQUEST_ID_HEADER, request_id.clone());

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}
