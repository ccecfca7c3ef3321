//! Connection manager: at most one live link per peripheral
//!
//! Every address gets a slot guarded by its own async mutex. Holding the slot
//! lock is what serializes connects and writes to one peripheral, while
//! different addresses proceed independently. After each successful
//! operation an idle timer is armed; it only closes the link if the slot's
//! generation is still the one it was armed with, so a command that arrives
//! in between always wins.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::transport::{connect_within, disconnect_within};
use crate::{ChannelConfig, FixtureAddress, LinkError, Transport};

/// Lifecycle of the link to one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// Connected and counting down to an idle disconnect
    IdleScheduled,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::IdleScheduled,
            _ => Self::Disconnected,
        }
    }
}

struct Link<C> {
    connection: Option<Arc<C>>,
    /// Bumped whenever a pending idle timer must not fire any more
    generation: u64,
    idle_timer: Option<JoinHandle<()>>,
}

impl<C> Link<C> {
    fn cancel_idle(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
    }
}

struct Slot<C> {
    link: Mutex<Link<C>>,
    state: AtomicU8,
}

impl<C> Slot<C> {
    fn new() -> Self {
        Self {
            link: Mutex::new(Link { connection: None, generation: 0, idle_timer: None }),
            state: AtomicU8::new(LinkState::Disconnected as u8),
        }
    }

    fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// Owns the links to every replica of a fixture
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    config: ChannelConfig,
    slots: Mutex<HashMap<FixtureAddress, Arc<Slot<T::Connection>>>>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: Arc<T>, config: ChannelConfig) -> Self {
        Self {
            transport,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub async fn link_state(&self, address: &FixtureAddress) -> LinkState {
        let slots = self.slots.lock().await;
        slots.get(address).map_or(LinkState::Disconnected, |slot| slot.state())
    }

    /// Run `op` against a live link to `address`, connecting first if needed
    ///
    /// Success re-arms the idle timer. A failed `op` drops the link so the
    /// next call starts from a fresh connection.
    pub async fn with_connection<F, Fut, R>(
        &self,
        address: &FixtureAddress,
        op: F,
    ) -> Result<R, LinkError>
    where
        F: FnOnce(Arc<T>, Arc<T::Connection>) -> Fut,
        Fut: Future<Output = Result<R, LinkError>>,
    {
        let slot = self.slot(address).await;
        let mut link = slot.link.lock().await;
        link.cancel_idle();

        let connection = self.acquire(address, &slot, &mut link).await?;

        // Armed before `op` runs: if the caller is cancelled mid-operation the
        // link still closes once idle. The timer waits on the slot lock, and
        // the re-arm below bumps the generation, so it never fires under `op`.
        self.arm_idle(address, &slot, &mut link);
        slot.set_state(LinkState::Connected);

        match op(Arc::clone(&self.transport), connection).await {
            Ok(value) => {
                self.arm_idle(address, &slot, &mut link);
                Ok(value)
            }
            Err(e) => {
                debug!("operation on {address} failed, dropping link: {e}");
                self.close(address, &slot, &mut link).await;
                Err(e)
            }
        }
    }

    /// Close the link to `address`; unknown or idle addresses are a no-op
    pub async fn disconnect(&self, address: &FixtureAddress) {
        let slot = self.slots.lock().await.get(address).cloned();
        if let Some(slot) = slot {
            let mut link = slot.link.lock().await;
            self.close(address, &slot, &mut link).await;
        }
    }

    /// Close every link and cancel every idle timer
    pub async fn shutdown(&self) {
        let slots: Vec<_> = {
            let slots = self.slots.lock().await;
            slots.iter().map(|(address, slot)| (address.clone(), Arc::clone(slot))).collect()
        };

        for (address, slot) in slots {
            let mut link = slot.link.lock().await;
            self.close(&address, &slot, &mut link).await;
        }
    }

    async fn slot(&self, address: &FixtureAddress) -> Arc<Slot<T::Connection>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(address.clone()).or_insert_with(|| Arc::new(Slot::new())))
    }

    async fn acquire(
        &self,
        address: &FixtureAddress,
        slot: &Slot<T::Connection>,
        link: &mut Link<T::Connection>,
    ) -> Result<Arc<T::Connection>, LinkError> {
        if let Some(connection) = link.connection.clone() {
            let limit = self.config.disconnect_timeout;
            match tokio::time::timeout(limit, self.transport.is_connected(&connection)).await {
                Ok(true) => {
                    slot.set_state(LinkState::Connected);
                    return Ok(connection);
                }
                Ok(false) => debug!("cached link to {address} is gone, reconnecting"),
                Err(_) => warn!("liveness check on {address} timed out after {limit:?}, reconnecting"),
            }
            link.connection = None;
        }

        let connecting = Connecting::new(slot);
        let connection = Arc::new(self.connect_with_retry(address).await?);
        link.connection = Some(Arc::clone(&connection));
        connecting.done(LinkState::Connected);
        Ok(connection)
    }

    async fn connect_with_retry(&self, address: &FixtureAddress) -> Result<T::Connection, LinkError> {
        let attempts = self.config.connect_attempts.max(1);
        let timeout = self.config.connect_timeout;
        let mut attempt = 1;

        loop {
            debug!("connecting to {address} (attempt {attempt}/{attempts})");

            let error = match connect_within(&*self.transport, address, timeout).await {
                Ok(connection) => {
                    info!("connected to {address}");
                    return Ok(connection);
                }
                Err(e) => e,
            };

            let transient = match &error {
                LinkError::Transport(e) => e.is_transient(),
                LinkError::Timeout { .. } => true,
            };
            if attempt >= attempts || !transient {
                return Err(error);
            }

            warn!(
                "connect to {address} failed ({error}), retrying in {:?}",
                self.config.retry_delay
            );
            tokio::time::sleep(self.config.retry_delay).await;
            attempt += 1;
        }
    }

    fn arm_idle(
        &self,
        address: &FixtureAddress,
        slot: &Arc<Slot<T::Connection>>,
        link: &mut Link<T::Connection>,
    ) {
        link.cancel_idle();
        let generation = link.generation;

        let slot_ref = Arc::clone(slot);
        let transport = Arc::clone(&self.transport);
        let idle = self.config.idle_timeout;
        let limit = self.config.disconnect_timeout;
        let address = address.clone();

        slot.set_state(LinkState::IdleScheduled);
        link.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;

            let mut link = slot_ref.link.lock().await;
            if link.generation != generation {
                return;
            }
            link.idle_timer = None;

            slot_ref.set_state(LinkState::Disconnected);
            if let Some(connection) = link.connection.take() {
                info!("closing link to {address} after {idle:?} idle");
                disconnect_within(&*transport, &*connection, &address, limit).await;
            }
        }));
    }

    async fn close(
        &self,
        address: &FixtureAddress,
        slot: &Slot<T::Connection>,
        link: &mut Link<T::Connection>,
    ) {
        link.cancel_idle();
        slot.set_state(LinkState::Disconnected);
        if let Some(connection) = link.connection.take() {
            debug!("disconnecting from {address}");
            disconnect_within(&*self.transport, &*connection, address, self.config.disconnect_timeout)
                .await;
        }
    }
}

/// Marks a slot `Connecting` until `done`; dropped early (error or
/// cancellation) it falls back to `Disconnected`
struct Connecting<'a, C> {
    slot: &'a Slot<C>,
    finished: bool,
}

impl<'a, C> Connecting<'a, C> {
    fn new(slot: &'a Slot<C>) -> Self {
        slot.set_state(LinkState::Connecting);
        Self { slot, finished: false }
    }

    fn done(mut self, state: LinkState) {
        self.finished = true;
        self.slot.set_state(state);
    }
}

impl<C> Drop for Connecting<'_, C> {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.set_state(LinkState::Disconnected);
        }
    }
}
