use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::AppError;
use crate::middleware::client_ip;

const WINDOW: Duration = Duration::from_secs(60);

struct Window {
    count: u32,
    reset: Instant,
}

/// Fixed one-minute window per client key.
///
/// Entries are never evicted; memory grows with the number of distinct clients.
pub struct RateLimiter {
    limit: u32,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit_per_min: u32) -> Self {
        Self {
            limit: limit_per_min,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request. `Err` carries whole seconds until the window resets.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        let (count, reset) = {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            let window = windows.entry(key.to_owned()).or_insert(Window {
                count: 0,
                reset: now + WINDOW,
            });
            if now > window.reset {
                *window = Window {
                    count: 0,
                    reset: now + WINDOW,
                };
            }
            window.count += 1;
            (window.count, window.reset)
        };

        if count > self.limit {
            return Err(reset.saturating_duration_since(now).as_secs());
        }
        Ok(())
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&req);
    if let Err(retry_after_secs) = limiter.check(&ip) {
        warn!(%ip, retry_after_secs, "rate limit exceeded");
        return Err(AppError::RateLimited { retry_after_secs });
    }
    Ok(next.run(req).await)
}
