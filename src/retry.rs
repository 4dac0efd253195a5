//! Bounded retries for flaky external calls
//!
//! Policy: the operation always runs at least once. The loop stops on the
//! first output accepted by the success predicate; otherwise it runs exactly
//! `retries` times and hands back the last output. An `Err` from the
//! operation is not retried: it aborts the sequence and is returned as-is.

use tracing::{debug, warn};

/// Stateless retry loop, reusable across operation/predicate pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryExecutor {
    retries: u32,
}

impl RetryExecutor {
    /// `retries` is the total number of attempts; zero behaves as one
    pub fn new(retries: u32) -> Self {
        Self {
            retries: retries.max(1),
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn execute<I, O, E, F, P>(&self, input: &I, mut operation: F, is_success: P) -> Result<O, E>
    where
        I: ?Sized,
        F: FnMut(&I) -> Result<O, E>,
        P: Fn(&O) -> bool,
    {
        let mut attempt = 1;
        loop {
            let output = operation(input)?;
            if is_success(&output) {
                debug!(attempt, "Attempt succeeded");
                return Ok(output);
            }
            if attempt >= self.retries {
                warn!(attempt, retries = self.retries, "All attempts failed");
                return Ok(output);
            }
            warn!(attempt, retries = self.retries, "Attempt failed, retrying");
            attempt += 1;
        }
    }
}
