//! Transport-boundary helpers: pulling the raw token string and the audit
//! request context out of an inbound request. No routing or response
//! shaping happens here; callers map authentication outcomes themselves.

use axum::http::{HeaderMap, Method, Uri, header};

use crate::domain::entities::RequestContext;
use crate::infra::config::Settings;

/// Capture the request metadata an audit entry records.
///
/// The client ip is the first `x-forwarded-for` hop when present; without a
/// trusted proxy chain this header is caller-controlled, so deployments not
/// behind one should treat it as advisory.
pub fn request_context(headers: &HeaderMap, method: &Method, uri: &Uri) -> RequestContext {
    RequestContext {
        path: uri.path().to_string(),
        method: method.to_string(),
        ip_address: forwarded_ip(headers),
        user_agent: header_str(headers, header::USER_AGENT.as_str()),
    }
}

/// Pull the raw token from the configured header, falling back to the
/// configured query parameter when that is enabled.
pub fn raw_token(headers: &HeaderMap, uri: &Uri, settings: &Settings) -> Option<String> {
    if let Some(value) = header_str(headers, &settings.header_name) {
        return Some(value);
    }

    if settings.allow_query_param {
        let query = uri.query()?;
        return url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == settings.query_param_name.as_str())
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());
    }

    None
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = header_str(headers, "x-forwarded-for")?;
    forwarded
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
}
