pub mod middleware;

pub use middleware::RateLimitMiddleware;

const AUTH_PATHS: [&str; 2] = ["/api/v1/auth/login", "/api/v1/auth/register"];

/// Endpoint category for admission control. Credential-issuance paths get
/// the strict `Auth` budget; everything else shares `General`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitCategory {
    Auth,
    General,
}

impl RateLimitCategory {
    pub fn for_path(path: &str) -> Self {
        if AUTH_PATHS.iter().any(|p| path.starts_with(p)) {
            RateLimitCategory::Auth
        } else {
            RateLimitCategory::General
        }
    }

    pub fn key_prefix(&self) -> &'static str {
        match self {
            RateLimitCategory::Auth => "rate_limit:auth",
            RateLimitCategory::General => "rate_limit:api",
        }
    }
}

#[derive(Clone, Debug)]
pub struct CategoryLimits {
    pub enabled: bool,
    pub capacity: i64,
    pub refill_tokens: i64,
    pub refill_period_minutes: i64,
}

impl CategoryLimits {
    pub fn refill_period_ms(&self) -> i64 {
        self.refill_period_minutes * 60_000
    }

    pub fn retry_after_seconds(&self) -> u64 {
        (self.refill_period_minutes * 60).max(0) as u64
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitSettings {
    pub auth: CategoryLimits,
    pub general: CategoryLimits,
    /// Path prefixes that skip admission control entirely (docs, ops).
    pub skip_paths: Vec<String>,
}

impl RateLimitSettings {
    pub fn for_category(&self, category: RateLimitCategory) -> &CategoryLimits {
        match category {
            RateLimitCategory::Auth => &self.auth,
            RateLimitCategory::General => &self.general,
        }
    }

    pub fn should_skip(&self, path: &str) -> bool {
        self.skip_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn test_settings() -> Self {
        Self {
            auth: CategoryLimits {
                enabled: true,
                capacity: 5,
                refill_tokens: 5,
                refill_period_minutes: 1,
            },
            general: CategoryLimits {
                enabled: true,
                capacity: 100,
                refill_tokens: 100,
                refill_period_minutes: 1,
            },
            skip_paths: vec![
                "/swagger-ui".to_string(),
                "/api-docs".to_string(),
                "/v3/api-docs".to_string(),
                "/actuator".to_string(),
            ],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub fn bucket_key(category: RateLimitCategory, client_id: &str) -> String {
    format!("{}:{}", category.key_prefix(), client_id)
}

/// Reference semantics of one bucket operation: grant whole refill batches
/// for elapsed periods (capped at capacity), then consume one token iff
/// one is available. The Mongo repository runs exactly this computation
/// server-side in a single atomic update; in-process implementations used
/// by tests call it under a lock.
pub fn refill_then_consume(
    tokens: i64,
    window_start_ms: i64,
    now_ms: i64,
    limits: &CategoryLimits,
) -> (i64, i64, RateLimitDecision) {
    let period_ms = limits.refill_period_ms();
    let elapsed_periods = if now_ms > window_start_ms && period_ms > 0 {
        (now_ms - window_start_ms) / period_ms
    } else {
        0
    };

    let refilled = limits
        .capacity
        .min(tokens + elapsed_periods * limits.refill_tokens);
    let window_start_ms = window_start_ms + elapsed_periods * period_ms;

    if refilled >= 1 {
        (refilled - 1, window_start_ms, RateLimitDecision::Allowed)
    } else {
        (refilled, window_start_ms, RateLimitDecision::Limited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> CategoryLimits {
        CategoryLimits {
            enabled: true,
            capacity: 5,
            refill_tokens: 5,
            refill_period_minutes: 1,
        }
    }

    #[test]
    fn test_category_for_path() {
        assert_eq!(
            RateLimitCategory::for_path("/api/v1/auth/login"),
            RateLimitCategory::Auth
        );
        assert_eq!(
            RateLimitCategory::for_path("/api/v1/auth/register"),
            RateLimitCategory::Auth
        );
        // Refresh presents an existing credential; it is not issuance.
        assert_eq!(
            RateLimitCategory::for_path("/api/v1/auth/refresh"),
            RateLimitCategory::General
        );
        assert_eq!(
            RateLimitCategory::for_path("/api/v1/quizzes"),
            RateLimitCategory::General
        );
    }

    #[test]
    fn test_bucket_key_derivation() {
        assert_eq!(
            bucket_key(RateLimitCategory::Auth, "10.0.0.1"),
            "rate_limit:auth:10.0.0.1"
        );
        assert_eq!(
            bucket_key(RateLimitCategory::General, "10.0.0.1"),
            "rate_limit:api:10.0.0.1"
        );
    }

    #[test]
    fn test_consume_until_empty() {
        let limits = limits();
        let mut tokens = limits.capacity;
        let mut window = 0;

        for _ in 0..5 {
            let (t, w, decision) = refill_then_consume(tokens, window, 1_000, &limits);
            assert_eq!(decision, RateLimitDecision::Allowed);
            tokens = t;
            window = w;
        }

        let (tokens, _, decision) = refill_then_consume(tokens, window, 1_000, &limits);
        assert_eq!(decision, RateLimitDecision::Limited);
        assert_eq!(tokens, 0);
    }

    #[test]
    fn test_refill_after_full_period() {
        let limits = limits();

        // Bucket drained at t=0; one full period later it is usable again.
        let (tokens, window, decision) = refill_then_consume(0, 0, 60_000, &limits);
        assert_eq!(decision, RateLimitDecision::Allowed);
        assert_eq!(tokens, 4);
        assert_eq!(window, 60_000);
    }

    #[test]
    fn test_no_refill_within_period() {
        let limits = limits();

        let (tokens, window, decision) = refill_then_consume(0, 0, 59_999, &limits);
        assert_eq!(decision, RateLimitDecision::Limited);
        assert_eq!(tokens, 0);
        assert_eq!(window, 0);
    }

    #[test]
    fn test_refill_is_capped_at_capacity() {
        let limits = limits();

        // Ten periods idle refills to capacity, not beyond.
        let (tokens, _, decision) = refill_then_consume(3, 0, 600_000, &limits);
        assert_eq!(decision, RateLimitDecision::Allowed);
        assert_eq!(tokens, limits.capacity - 1);
    }

    #[test]
    fn test_refill_batches_are_discrete() {
        let limits = limits();

        // 2.5 periods grant exactly 2 batches and advance the window by 2.
        let (_, window, _) = refill_then_consume(0, 0, 150_000, &limits);
        assert_eq!(window, 120_000);
    }
}
