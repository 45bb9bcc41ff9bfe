//! Caller-supplied deadline for remote ledger calls.

use std::future::Future;
use std::time::Duration;

use crate::port::RemoteError;

/// Optional upper bound on how long a single remote step may take.
///
/// The core has no timeout of its own; without a limit a call waits for the
/// ledger to answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Duration>);

impl Deadline {
    /// No limit.
    pub const NONE: Self = Self(None);

    #[must_use]
    pub const fn after(limit: Duration) -> Self {
        Self(Some(limit))
    }

    #[must_use]
    pub const fn limit(self) -> Option<Duration> {
        self.0
    }

    /// Run `call`, failing with [`RemoteError::Timeout`] once the limit expires.
    ///
    /// An expired call is dropped; its outcome is never assumed to be success.
    pub async fn run<T, F>(self, call: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match self.0 {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(RemoteError::Timeout)),
            None => call.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_call_times_out() {
        let deadline = Deadline::after(Duration::from_millis(10));
        let result: Result<(), RemoteError> = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(RemoteError::Timeout));
    }

    #[tokio::test]
    async fn no_limit_passes_result_through() {
        let result = Deadline::NONE.run(async { Ok::<_, RemoteError>(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
