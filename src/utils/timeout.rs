//! Async timeout helpers.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::{ProtocolError, Result};

/// Awaits `fut`, mapping an elapsed deadline to [`ProtocolError::Timeout`].
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_is_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        assert!(matches!(
            with_timeout_error(slow, Duration::from_secs(1)).await,
            Err(ProtocolError::Timeout)
        ));
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let failing = async { Err::<(), _>(ProtocolError::ConnectionClosed) };
        assert!(matches!(
            with_timeout_error(failing, Duration::from_secs(1)).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}
