//! Client IP resolution for rate-limit bucket keys.
//!
//! The rate limiter buckets requests by source IP. Behind a reverse proxy
//! the TCP peer is the proxy itself, so resolution reads the forwarding
//! headers instead: the first `X-Forwarded-For` entry, then `X-Real-IP`,
//! then a shared [`UNKNOWN_IP`] bucket.
//!
//! # Spoofing
//!
//! **Forwarding headers are client-controlled** unless a trusted proxy
//! overwrites them. A client talking to this service directly can rotate
//! fabricated addresses to dodge the limiter, or pin the blame on someone
//! else's address. Deploying per-IP limiting safely requires:
//!
//! 1. A reverse proxy (nginx, HAProxy, a cloud load balancer) in front
//! 2. No direct internet route to this service
//! 3. The proxy configured to overwrite, not append to, the headers:
//!
//!    ```nginx
//!    proxy_set_header X-Real-IP $remote_addr;
//!    proxy_set_header X-Forwarded-For $remote_addr;
//!    ```
//!
//! Requests arriving with neither header all land in the `"unknown"`
//! bucket and are throttled collectively. A spike of "unknown" traffic in
//! production usually means the proxy stopped setting headers.

use std::borrow::Cow;

use axum::http::Request;

/// Shared bucket key for requests whose client IP cannot be determined.
pub const UNKNOWN_IP: &str = "unknown";

/// Resolve the client IP a request is rate-limited under.
///
/// Returns a borrowed [`UNKNOWN_IP`] when neither forwarding header is
/// usable, so the common direct-connection case allocates nothing.
pub fn extract_client_ip<B>(req: &Request<B>) -> Cow<'static, str> {
    let headers = req.headers();

    // X-Forwarded-For holds "client, proxy1, proxy2"; the client is first
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(list) = forwarded.to_str()
        && let Some(client) = list.split(',').next()
    {
        return Cow::Owned(client.trim().to_string());
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        return Cow::Owned(value.trim().to_string());
    }

    Cow::Borrowed(UNKNOWN_IP)
}
