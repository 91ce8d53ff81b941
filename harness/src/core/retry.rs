//! Attempt bookkeeping for the self-retrying creation workflow.

/// Default number of creation attempts before the run is aborted.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Attempt state carried across one top-level creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    /// Resource being created; named in retry warnings.
    pub resource_name: String,
    /// 1-indexed attempt currently in flight.
    pub attempt: u32,
    pub max_attempts: u32,
}

/// What to do after an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Start over with `next_attempt`.
    Retry { next_attempt: u32 },
    /// Attempts are used up; the caller must abort.
    Exhausted,
}

impl RetryContext {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(resource_name: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            resource_name: resource_name.into(),
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Record a failed attempt and decide whether another one is allowed.
    pub fn on_failure(&mut self) -> RetryDecision {
        if self.attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        self.attempt += 1;
        RetryDecision::Retry {
            next_attempt: self.attempt,
        }
    }

    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_attempts_allow_two_retries() {
        let mut ctx = RetryContext::new("dp1", DEFAULT_MAX_ATTEMPTS);
        assert_eq!(ctx.attempt, 1);
        assert_eq!(ctx.on_failure(), RetryDecision::Retry { next_attempt: 2 });
        assert_eq!(ctx.on_failure(), RetryDecision::Retry { next_attempt: 3 });
        assert!(ctx.is_final_attempt());
        assert_eq!(ctx.on_failure(), RetryDecision::Exhausted);
        assert_eq!(ctx.on_failure(), RetryDecision::Exhausted);
        assert_eq!(ctx.attempt, 3);
        assert_eq!(ctx.resource_name, "dp1");
    }

    #[test]
    fn zero_max_attempts_still_runs_once() {
        let mut ctx = RetryContext::new("dp1", 0);
        assert_eq!(ctx.max_attempts, 1);
        assert_eq!(ctx.on_failure(), RetryDecision::Exhausted);
    }
}
