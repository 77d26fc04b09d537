//! Correlation ID middleware (spec §6): every request reads
//! `X-Correlation-ID`; if absent, one is generated. Always echoed back in
//! the response header and in every response body's `meta.correlationId`.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Span;

use crate::request::{CORRELATION_ID_HEADER, CorrelationId};

/// Ensures every request carries a correlation id, generating one via
/// UUID v4 when the client didn't supply it, and attaches it both to the
/// tracing span and to the request extensions for handlers to read.
pub async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = CorrelationId::from_header(
        request
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|h| h.to_str().ok()),
    );

    Span::current().record("correlation_id", correlation_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("correlation_id", correlation_id.as_str());
    });

    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, value);
    }

    response
}
