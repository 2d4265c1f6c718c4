use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Allow `attempts` requests per `window_seconds` per IP, as a burst that refills evenly.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let attempts = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
    let period_ms = (window_seconds.max(1) * 1000) / u64::from(attempts.get());
    let period = Duration::from_millis(period_ms.max(1));
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(attempts))
        .allow_burst(attempts);

    Arc::new(RateLimiter::dashmap(quota))
}

/// Limiter plus how the client address is determined.
#[derive(Clone)]
pub struct IpRateLimit {
    pub limiter: IpRateLimiter,
    /// Honour `x-forwarded-for`. Only safe when a proxy in front overwrites it.
    pub trust_forwarded_for: bool,
}

impl IpRateLimit {
    pub fn new(limiter: IpRateLimiter, trust_forwarded_for: bool) -> Self {
        Self {
            limiter,
            trust_forwarded_for,
        }
    }
}

/// Client IP: first `x-forwarded-for` hop when trusted, else the peer address.
pub fn client_ip(request: &Request, trust_forwarded_for: bool) -> Option<IpAddr> {
    let forwarded_ip = trust_forwarded_for
        .then(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .flatten();

    forwarded_ip.or_else(|| {
        request
            .extensions()
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|axum::extract::ConnectInfo(addr)| addr.ip())
    })
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(rate_limit): State<IpRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match client_ip(&request, rate_limit.trust_forwarded_for) {
        Some(ip) => match rate_limit.limiter.check_key(&ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                tracing::warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait_time.as_secs().max(1)),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    fn app(limiter: IpRateLimiter, trust_forwarded_for: bool) -> Router {
        Router::new()
            .route("/auth/login", post(|| async { "ok" }))
            .layer(from_fn_with_state(
                IpRateLimit::new(limiter, trust_forwarded_for),
                ip_rate_limit_middleware,
            ))
    }

    fn login_from_peer(peer: &str, forwarded: &str) -> HttpRequest<Body> {
        let mut request = login_from(forwarded);
        let addr: SocketAddr = format!("{}:40000", peer).parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    fn login_from(ip: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/auth/login")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn blocks_after_burst_is_spent() {
        let limiter = create_ip_rate_limiter(2, 60);
        let app = app(limiter, true);

        for _ in 0..2 {
            let res = app.clone().oneshot(login_from("10.0.0.1")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app.clone().oneshot(login_from("10.0.0.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key(axum::http::header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn buckets_are_per_ip() {
        let limiter = create_ip_rate_limiter(1, 60);
        let app = app(limiter, true);

        let res = app.clone().oneshot(login_from("10.0.0.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.clone().oneshot(login_from("10.0.0.2")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rotating_forwarded_header_is_ignored_without_a_trusted_proxy() {
        let limiter = create_ip_rate_limiter(2, 60);
        let app = app(limiter, false);

        for forwarded in ["10.0.0.1", "10.0.0.2"] {
            let res = app
                .clone()
                .oneshot(login_from_peer("192.0.2.10", forwarded))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app
            .clone()
            .oneshot(login_from_peer("192.0.2.10", "10.0.0.3"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn peer_address_is_used_when_forwarding_is_untrusted() {
        let request = login_from_peer("192.0.2.10", "10.0.0.1");
        assert_eq!(
            client_ip(&request, false),
            Some("192.0.2.10".parse().unwrap())
        );
        assert_eq!(client_ip(&request, true), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn zero_attempts_still_builds_a_limiter() {
        let limiter = create_ip_rate_limiter(0, 0);
        assert!(limiter.check_key(&"127.0.0.1".parse().unwrap()).is_ok());
    }
}
