//! Retry policy: exponential backoff as a pure decision function

use chrono::Duration;

/// What to do with a job whose attempt just failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue the job, eligible again after `delay`
    Retry { delay: Duration },
    /// Retry budget exhausted, fail permanently
    GiveUp,
}

/// Exponential backoff: `base * 2^retry_count`, optionally jittered
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, jitter: bool) -> Self {
        Self { base_delay, jitter }
    }

    /// Decide the fate of a job that failed its attempt number `retry_count`
    ///
    /// `retry_count` counts retries already consumed, so a job with
    /// `retry_count == max_retries` has spent its whole budget.
    pub fn decide(&self, retry_count: i32, max_retries: i32) -> RetryDecision {
        if retry_count >= max_retries {
            return RetryDecision::GiveUp;
        }
        let exponent = retry_count.clamp(0, 30) as u32;
        let mut delay = self.base_delay * 2_i32.saturating_pow(exponent);
        if self.jitter {
            delay = jittered(delay);
        }
        RetryDecision::Retry { delay }
    }
}

/// Spread the delay by up to +10% so synchronized failures fan out
fn jittered(delay: Duration) -> Duration {
    use rand::Rng;
    let millis = delay.num_milliseconds().max(0);
    let extra = rand::rng().random_range(0..=millis / 10);
    delay + Duration::milliseconds(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(Duration::minutes(5), false);
        assert_eq!(
            policy.decide(0, 3),
            RetryDecision::Retry {
                delay: Duration::minutes(5)
            }
        );
        assert_eq!(
            policy.decide(1, 3),
            RetryDecision::Retry {
                delay: Duration::minutes(10)
            }
        );
        assert_eq!(
            policy.decide(2, 3),
            RetryDecision::Retry {
                delay: Duration::minutes(20)
            }
        );
    }

    #[test]
    fn gives_up_once_budget_is_spent() {
        let policy = RetryPolicy::new(Duration::minutes(5), false);
        assert_eq!(policy.decide(3, 3), RetryDecision::GiveUp);
        assert_eq!(policy.decide(7, 3), RetryDecision::GiveUp);
    }

    #[test]
    fn zero_budget_never_retries() {
        let policy = RetryPolicy::new(Duration::minutes(5), false);
        assert_eq!(policy.decide(0, 0), RetryDecision::GiveUp);
    }

    #[test]
    fn jitter_only_lengthens_the_delay() {
        let policy = RetryPolicy::new(Duration::minutes(5), true);
        for _ in 0..32 {
            match policy.decide(1, 3) {
                RetryDecision::Retry { delay } => {
                    assert!(delay >= Duration::minutes(10));
                    assert!(delay <= Duration::minutes(11));
                }
                RetryDecision::GiveUp => panic!("budget not spent"),
            }
        }
    }

    #[test]
    fn huge_retry_counts_do_not_overflow() {
        let policy = RetryPolicy::new(Duration::seconds(1), false);
        match policy.decide(25, 100) {
            RetryDecision::Retry { delay } => assert!(delay > Duration::zero()),
            RetryDecision::GiveUp => panic!("budget not spent"),
        }
    }
}
