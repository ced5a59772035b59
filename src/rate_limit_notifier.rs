use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_THROTTLE_SECS: u64 = 300;

static RATE_LIMIT_NOTIFIER: Lazy<RateLimitNotifier> = Lazy::new(RateLimitNotifier::new);

/// True when an error message looks like an HTTP 429 from a venue.
pub fn is_rate_limit_error(text: &str) -> bool {
    text.contains("429") || text.contains("Too Many Requests")
}

/// Reports a rate-limit hit for `context`; repeats within the throttle window
/// are dropped. Returns whether a report was emitted.
pub fn notify_rate_limit(context: &str, detail: &str) -> bool {
    RATE_LIMIT_NOTIFIER.notify(context, detail, Instant::now())
}

struct RateLimitNotifier {
    pair_name: String,
    throttle: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl RateLimitNotifier {
    fn new() -> Self {
        let pair_name = match (std::env::var("SYMBOL_A"), std::env::var("SYMBOL_B")) {
            (Ok(a), Ok(b)) => format!("{}/{}", a, b),
            _ => String::new(),
        };
        let throttle = std::env::var("RATE_LIMIT_NOTIFY_THROTTLE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_THROTTLE_SECS);
        Self::with_throttle(pair_name, Duration::from_secs(throttle))
    }

    fn with_throttle(pair_name: String, throttle: Duration) -> Self {
        Self {
            pair_name,
            throttle,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    fn notify(&self, context: &str, detail: &str, now: Instant) -> bool {
        let Ok(mut last_sent) = self.last_sent.lock() else {
            return false;
        };
        if let Some(prev) = last_sent.get(context) {
            if now.duration_since(*prev) < self.throttle {
                log::debug!("[RateLimit] suppressed repeat for '{}'", context);
                return false;
            }
        }
        last_sent.insert(context.to_string(), now);

        let subject = if self.pair_name.is_empty() {
            format!("[RateLimit] {}", context)
        } else {
            format!("[{}] Rate limit - {}", self.pair_name, context)
        };
        log::warn!(
            "{}: HTTP 429 Too Many Requests detected (detail: {})",
            subject,
            detail
        );
        true
    }
}
