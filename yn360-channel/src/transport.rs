use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::{ControlHandle, FixtureAddress, LinkError, TransportError};

/// The BLE operations the command channel needs from a radio stack
///
/// Implementations do not enforce timeouts; the connection manager and the
/// dispatcher bound every call.
pub trait Transport: Send + Sync + 'static {
    /// A live link to one peripheral
    type Connection: Send + Sync + 'static;

    fn connect(
        &self,
        address: &FixtureAddress,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    fn write(
        &self,
        connection: &Self::Connection,
        handle: ControlHandle,
        bytes: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn disconnect(
        &self,
        connection: &Self::Connection,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn is_connected(&self, connection: &Self::Connection) -> impl Future<Output = bool> + Send;
}

/// `connect`, giving up after `limit`
pub(crate) async fn connect_within<T: Transport>(
    transport: &T,
    address: &FixtureAddress,
    limit: Duration,
) -> Result<T::Connection, LinkError> {
    match tokio::time::timeout(limit, transport.connect(address)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(LinkError::Timeout { operation: "connect", after: limit }),
    }
}

/// Disconnect, giving up after `limit`; the caller drops the link either way
pub(crate) async fn disconnect_within<T: Transport>(
    transport: &T,
    connection: &T::Connection,
    address: &FixtureAddress,
    limit: Duration,
) {
    match tokio::time::timeout(limit, transport.disconnect(connection)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("disconnect from {address} failed: {e}"),
        Err(_) => warn!("disconnect from {address} timed out after {limit:?}, dropping link"),
    }
}
