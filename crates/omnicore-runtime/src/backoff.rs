use std::time::Duration;

const BASE: Duration = Duration::from_millis(500);
const MAX: Duration = Duration::from_secs(300);

/// Exponential backoff with decorrelated jitter, capped at `MAX`.
///
/// `failures` is the number of consecutive failed reconciles for this
/// resource. `jitter` is a caller-supplied value in `[0.0, 1.0)` — the
/// runtime derives it from the resource pointer's hash rather than a global
/// RNG, so backoff delay is deterministic given the same failure count and
/// pointer (useful in tests).
pub fn backoff_delay(failures: u32, jitter: f64) -> Duration {
    let exp = failures.min(20);
    let scaled = BASE.as_millis() as f64 * 2f64.powi(exp as i32);
    let capped = scaled.min(MAX.as_millis() as f64);
    let jittered = capped * (0.5 + 0.5 * jitter.clamp(0.0, 1.0));
    Duration::from_millis(jittered as u64).min(MAX)
}

pub fn jitter_for(pointer: &omnicore_domain::Pointer) -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    pointer.hash(&mut hasher);
    (hasher.finish() % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_failure_count() {
        let first = backoff_delay(0, 0.0);
        let later = backoff_delay(5, 0.0);
        assert!(later > first);
    }

    #[test]
    fn backoff_is_capped() {
        let huge = backoff_delay(100, 1.0);
        assert!(huge <= MAX);
    }

    #[test]
    fn jitter_is_deterministic_for_same_pointer() {
        let p = omnicore_domain::Pointer::new("Cluster", "default", "c1");
        assert_eq!(jitter_for(&p), jitter_for(&p));
    }
}
