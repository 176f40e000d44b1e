use std::time::Duration;

/// What the adapter does after losing its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Never,
    /// Attempt `n` waits `min(step * n, max_delay)`; gives up after `max_attempts` failures.
    Linear {
        step: Duration,
        max_delay: Duration,
        max_attempts: u32,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Linear {
            step: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }
}

#[derive(Debug)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, `None` once the policy is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        match self.policy {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Linear {
                step,
                max_delay,
                max_attempts,
            } => {
                if self.attempt >= max_attempts {
                    return None;
                }
                self.attempt += 1;
                Some(step.saturating_mul(self.attempt).min(max_delay))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_policy_gives_up_immediately() {
        let mut b = Backoff::new(ReconnectPolicy::Never);
        assert_eq!(b.next_delay(), None);
    }

    #[test]
    fn linear_policy_grows_caps_and_stops() {
        let mut b = Backoff::new(ReconnectPolicy::Linear {
            step: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            max_attempts: 4,
        });
        let delays: Vec<_> = std::iter::from_fn(|| b.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5),
            ]
        );
        assert_eq!(b.attempts(), 4);
        assert_eq!(b.next_delay(), None);

        b.reset();
        assert_eq!(b.next_delay(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn default_policy_is_bounded() {
        let mut b = Backoff::new(ReconnectPolicy::default());
        assert_eq!(std::iter::from_fn(|| b.next_delay()).count(), 5);
    }
}
