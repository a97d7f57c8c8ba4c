//! Handle to an in-flight invocation.

// ============================================================================
// Imports
// ============================================================================

use std::future::IntoFuture;
use std::sync::Weak;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::codec::{Codec, HostValue};
use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;

use super::pending::{PendingTable, Settlement};

// ============================================================================
// PendingCall
// ============================================================================

/// An invocation waiting for its correlated reply.
///
/// Await it directly, or use [`wait_timeout`](Self::wait_timeout).
/// Dropping the handle before it settles withdraws both correlation ids,
/// so a late reply is ignored.
///
/// # Example
///
/// ```ignore
/// let call = bridge.invoke("echo", 42)?;
/// println!("waiting on {}", call.result_id());
/// let value = call.await?;
/// ```
#[must_use = "an invocation does nothing useful unless awaited"]
pub struct PendingCall {
    command: String,
    result_id: CorrelationId,
    error_id: CorrelationId,
    receiver: Option<oneshot::Receiver<Settlement>>,
    codec: Codec,
    table: Weak<Mutex<PendingTable>>,
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("command", &self.command)
            .field("result_id", &self.result_id)
            .field("error_id", &self.error_id)
            .finish_non_exhaustive()
    }
}

impl PendingCall {
    pub(crate) fn new(
        command: String,
        result_id: CorrelationId,
        error_id: CorrelationId,
        receiver: oneshot::Receiver<Settlement>,
        codec: Codec,
        table: Weak<Mutex<PendingTable>>,
    ) -> Self {
        Self {
            command,
            result_id,
            error_id,
            receiver: Some(receiver),
            codec,
            table,
        }
    }

    /// Command name.
    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Id the host answers with on success.
    #[inline]
    #[must_use]
    pub fn result_id(&self) -> CorrelationId {
        self.result_id
    }

    /// Id the host answers with on failure.
    #[inline]
    #[must_use]
    pub fn error_id(&self) -> CorrelationId {
        self.error_id
    }

    /// Waits for the reply and decodes it.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] if the host answered on the error id
    /// - [`Error::ConnectionClosed`] if the invocation was cancelled
    /// - [`Error::Extension`] if a decode extension failed
    pub async fn wait(mut self) -> Result<HostValue> {
        let receiver = self.receiver.take().ok_or(Error::ConnectionClosed)?;
        let settlement = receiver.await.map_err(|_| Error::ConnectionClosed)?;

        match settlement {
            Ok(wire) => self.codec.decode_deferred(wire).await,
            Err(wire) => {
                let payload = self.codec.decode_deferred(wire.clone()).await?;
                Err(Error::remote(self.command.as_str(), payload, &wire))
            }
        }
    }

    /// Waits at most `timeout` for the reply.
    ///
    /// On expiry both ids are withdrawn.
    ///
    /// # Errors
    ///
    /// [`Error::RequestTimeout`] on expiry, otherwise as [`wait`](Self::wait).
    pub async fn wait_timeout(self, timeout: Duration) -> Result<HostValue> {
        let command = self.command.clone();

        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => Err(Error::request_timeout(
                command,
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }
}

impl IntoFuture for PendingCall {
    type Output = Result<HostValue>;
    type IntoFuture = BoxFuture<'static, Result<HostValue>>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade()
            && table.lock().discard(self.result_id, self.error_id)
        {
            trace!(result_id = %self.result_id, error_id = %self.error_id, "Withdrew unsettled invocation");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
