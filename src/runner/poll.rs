//! Retry-until-condition support for storage polling

use std::time::Duration;

use crate::common::config::PollConfig;
use crate::common::{Error, Result};

/// How often to poll and when to give up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Unbounded when `None`
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self::new(config.interval(), config.max_attempts)
    }
}

/// Attempt counter for one polling loop
///
/// The caller reads chain state, and calls [`Poller::wait`] whenever the condition
/// does not hold yet:
///
/// ```ignore
/// let mut poller = Poller::new(policy, "queue head cleared");
/// while chain.storage(&head).await?.is_some() {
///     poller.wait().await?;
/// }
/// ```
pub struct Poller<'a> {
    policy: PollPolicy,
    what: &'a str,
    attempts: u32,
}

impl<'a> Poller<'a> {
    pub fn new(policy: PollPolicy, what: &'a str) -> Self {
        Self {
            policy,
            what,
            attempts: 0,
        }
    }

    /// Number of failed checks so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed check and sleep before the next one
    ///
    /// Fails with [`Error::PollExhausted`] once the attempt budget is spent.
    pub async fn wait(&mut self) -> Result<()> {
        self.attempts += 1;
        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return Err(Error::PollExhausted {
                    what: self.what.to_string(),
                    attempts: self.attempts,
                });
            }
        }

        tracing::trace!(what = self.what, attempt = self.attempts, "Condition not met yet");
        if !self.policy.interval.is_zero() {
            tokio::time::sleep(self.policy.interval).await;
        }
        Ok(())
    }
}
