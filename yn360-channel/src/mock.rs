//! Scripted in-memory transport for tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{ControlHandle, FixtureAddress, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Accept,
    /// Every connect attempt fails with a transport error
    Refuse,
    /// Connect never completes
    Hang,
    /// Connects, but every write fails
    RejectWrites,
    /// Connects, but writes never complete
    HangWrites,
}

pub struct MockLink {
    address: FixtureAddress,
    alive: Arc<AtomicBool>,
}

#[derive(Default)]
pub struct MockTransport {
    behaviour: Mutex<HashMap<FixtureAddress, Behaviour>>,
    refusals: Mutex<HashMap<FixtureAddress, usize>>,
    connect_delay: Mutex<Duration>,
    links: Mutex<Vec<(FixtureAddress, Arc<AtomicBool>)>>,
    connects: Mutex<Vec<FixtureAddress>>,
    writes: Mutex<Vec<(FixtureAddress, Vec<u8>)>>,
    disconnects: Mutex<Vec<FixtureAddress>>,
    stalled_disconnects: Mutex<HashSet<FixtureAddress>>,
    stalled_checks: Mutex<HashSet<FixtureAddress>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, address: &str, behaviour: Behaviour) {
        self.behaviour.lock().unwrap().insert(address.into(), behaviour);
    }

    /// Fail the next `count` connects to `address`, then follow its behaviour
    pub fn refuse_next(&self, address: &str, count: usize) {
        self.refusals.lock().unwrap().insert(address.into(), count);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = delay;
    }

    /// Drop every open link to `address` as if the peripheral went away
    pub fn sever(&self, address: &str) {
        for (a, alive) in self.links.lock().unwrap().iter() {
            if a.as_str() == address {
                alive.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Disconnects from `address` are recorded but never complete
    pub fn stall_disconnects(&self, address: &str) {
        self.stalled_disconnects.lock().unwrap().insert(address.into());
    }

    /// Liveness checks on links to `address` never complete
    pub fn stall_liveness_checks(&self, address: &str) {
        self.stalled_checks.lock().unwrap().insert(address.into());
    }

    pub fn connects(&self, address: &str) -> usize {
        self.connects.lock().unwrap().iter().filter(|a| a.as_str() == address).count()
    }

    pub fn total_connects(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn disconnects(&self, address: &str) -> usize {
        self.disconnects.lock().unwrap().iter().filter(|a| a.as_str() == address).count()
    }

    pub fn writes(&self) -> Vec<(FixtureAddress, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    fn behaviour_of(&self, address: &FixtureAddress) -> Behaviour {
        self.behaviour.lock().unwrap().get(address).copied().unwrap_or(Behaviour::Accept)
    }

    fn take_refusal(&self, address: &FixtureAddress) -> bool {
        let mut refusals = self.refusals.lock().unwrap();
        match refusals.get_mut(address) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

impl Transport for MockTransport {
    type Connection = MockLink;

    async fn connect(&self, address: &FixtureAddress) -> Result<MockLink, TransportError> {
        self.connects.lock().unwrap().push(address.clone());

        let delay = *self.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.take_refusal(address) {
            return Err(TransportError::Link("connection refused".to_string()));
        }

        match self.behaviour_of(address) {
            Behaviour::Refuse => Err(TransportError::Link("connection refused".to_string())),
            Behaviour::Hang => std::future::pending().await,
            _ => {
                let alive = Arc::new(AtomicBool::new(true));
                self.links.lock().unwrap().push((address.clone(), Arc::clone(&alive)));
                Ok(MockLink { address: address.clone(), alive })
            }
        }
    }

    async fn write(
        &self,
        connection: &MockLink,
        _handle: ControlHandle,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        if !connection.alive.load(Ordering::SeqCst) {
            return Err(TransportError::Link("not connected".to_string()));
        }

        match self.behaviour_of(&connection.address) {
            Behaviour::RejectWrites => Err(TransportError::Link("write rejected".to_string())),
            Behaviour::HangWrites => std::future::pending().await,
            _ => {
                self.writes.lock().unwrap().push((connection.address.clone(), bytes.to_vec()));
                Ok(())
            }
        }
    }

    async fn disconnect(&self, connection: &MockLink) -> Result<(), TransportError> {
        self.disconnects.lock().unwrap().push(connection.address.clone());
        if self.stalled_disconnects.lock().unwrap().contains(&connection.address) {
            std::future::pending::<()>().await;
        }
        connection.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self, connection: &MockLink) -> bool {
        if self.stalled_checks.lock().unwrap().contains(&connection.address) {
            std::future::pending::<()>().await;
        }
        connection.alive.load(Ordering::SeqCst)
    }
}
