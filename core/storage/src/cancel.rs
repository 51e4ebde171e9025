//! Cancellation plumbing for suspending operations.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use axiomstore_common::{Error, Result};

/// Drive `fut` to completion unless `token` is cancelled first.
///
/// A token that is already cancelled short-circuits without polling `fut`.
pub(crate) async fn run<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
