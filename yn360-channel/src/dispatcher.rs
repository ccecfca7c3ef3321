//! Command dispatcher: one logical command, tried replica by replica

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};

use yn360_proto::{CommandFrame, DesiredState, FixtureState, encode};

use crate::selector::trial_order;
use crate::{ConnectionManager, ControlHandle, DispatchError, FixtureAddress, LinkError, ReplicaSet, Transport};

pub struct Dispatcher<T: Transport> {
    manager: Arc<ConnectionManager<T>>,
    replicas: ReplicaSet,
    /// Held for the whole of `apply`, one command in flight per fixture
    inflight: Mutex<()>,
    state: RwLock<FixtureState>,
    last_success: RwLock<Option<FixtureAddress>>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(manager: Arc<ConnectionManager<T>>, replicas: ReplicaSet) -> Self {
        Self {
            manager,
            replicas,
            inflight: Mutex::new(()),
            state: RwLock::new(FixtureState::default()),
            last_success: RwLock::new(None),
        }
    }

    pub fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    pub async fn state(&self) -> FixtureState {
        *self.state.read().await
    }

    /// The replica that accepted the most recent command
    pub async fn last_success(&self) -> Option<FixtureAddress> {
        self.last_success.read().await.clone()
    }

    /// Merge `desired` into the current state and send it to the first
    /// replica that accepts it
    ///
    /// Replicas are tried one at a time, last successful first. State and
    /// hint only change once a write went through; on
    /// `AllReplicasUnreachable` both are left as they were, so the caller can
    /// retry the same request.
    pub async fn apply(&self, desired: &DesiredState) -> Result<(), DispatchError> {
        let _inflight = self.inflight.lock().await;

        let next = self.state.read().await.merge(desired);
        let frame = encode(&next)?;

        let hint = self.last_success.read().await.clone();
        let order = trial_order(self.replicas.addresses(), hint.as_ref());
        debug!("sending {frame} to up to {} replica(s)", order.len());

        for address in &order {
            let Some(handle) = self.replicas.control_handle(address) else {
                continue;
            };

            match self.send(address, handle, frame).await {
                Ok(()) => {
                    info!("{address} accepted {frame}");
                    *self.state.write().await = next;
                    *self.last_success.write().await = Some(address.clone());
                    return Ok(());
                }
                Err(e) if e.is_timeout() => warn!("{address} timed out, trying next replica: {e}"),
                Err(e) => warn!("{address} unreachable, trying next replica: {e}"),
            }
        }

        Err(DispatchError::AllReplicasUnreachable { attempted: order.len() })
    }

    async fn send(
        &self,
        address: &FixtureAddress,
        handle: ControlHandle,
        frame: CommandFrame,
    ) -> Result<(), LinkError> {
        let write_timeout = self.manager.config().write_timeout;

        self.manager
            .with_connection(address, move |transport, link| async move {
                let write = transport.write(&link, handle, frame.as_bytes());
                match tokio::time::timeout(write_timeout, write).await {
                    Ok(result) => result.map_err(LinkError::from),
                    Err(_) => Err(LinkError::Timeout { operation: "write", after: write_timeout }),
                }
            })
            .await
    }
}
