use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Sleep for one poll interval, or fail with `Cancelled` as soon as the
/// token fires.
pub async fn sleep(interval: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}
