// ABOUTME: Fixed-window rate limiting for the authorization and token endpoints
// ABOUTME: Per-caller tracking over a sharded concurrent map with lazy cleanup
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rate limit configuration per endpoint
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per window on the authorization endpoint
    pub authorize_limit: u32,
    /// Requests per window on the token endpoint
    pub token_limit: u32,
    /// Window length
    pub window: Duration,
    /// Map size beyond which stale entries are swept
    pub cleanup_threshold: usize,
    /// Age after which an idle entry is considered stale
    pub stale_entry_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            authorize_limit: 30,
            token_limit: 60,
            window: Duration::from_secs(60),
            cleanup_threshold: 10_000,
            stale_entry_timeout: Duration::from_secs(300),
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    /// Whether this request exceeded the limit
    pub is_limited: bool,
    /// Configured limit for the endpoint
    pub limit: u32,
    /// Requests remaining in the current window
    pub remaining: u32,
    /// Seconds until the window resets, set when limited
    pub retry_after_seconds: Option<u64>,
}

/// Fixed-window rate limiter keyed by caller identity.
///
/// `DashMap` provides sharded locking so checks on unrelated callers do not
/// contend. Cleanup runs lazily off the critical path when the map grows
/// past the configured threshold.
#[derive(Clone)]
pub struct OAuth2RateLimiter {
    state: Arc<DashMap<String, (u32, Instant)>>,
    config: RateLimitConfig,
}

impl OAuth2RateLimiter {
    /// Create a limiter with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a limiter with a custom configuration
    #[must_use]
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            state: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Check and count a request against the endpoint's limit.
    ///
    /// The entry guard makes the read-modify-write atomic per caller.
    #[must_use]
    pub fn check(&self, endpoint: &str, caller: &str) -> RateLimitStatus {
        let limit = match endpoint {
            "token" => self.config.token_limit,
            _ => self.config.authorize_limit,
        };
        let now = Instant::now();
        let key = format!("{endpoint}:{caller}");

        let mut entry = self.state.entry(key).or_insert((0, now));
        let (count, window_start) = entry.value_mut();

        if now.duration_since(*window_start) >= self.config.window {
            *count = 0;
            *window_start = now;
        }

        let is_limited = *count >= limit;
        if !is_limited {
            *count += 1;
        }
        let remaining = limit.saturating_sub(*count);
        let elapsed = now.duration_since(*window_start);
        drop(entry);

        if self.state.len() > self.config.cleanup_threshold {
            self.cleanup_stale_entries(now);
        }

        let retry_after_seconds = is_limited.then(|| {
            self.config
                .window
                .saturating_sub(elapsed)
                .as_secs()
                .max(1)
        });

        RateLimitStatus {
            is_limited,
            limit,
            remaining,
            retry_after_seconds,
        }
    }

    fn cleanup_stale_entries(&self, now: Instant) {
        self.state.retain(|_key, (_count, start)| {
            now.duration_since(*start) < self.config.stale_entry_timeout
        });
    }
}

impl Default for OAuth2RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
