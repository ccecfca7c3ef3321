//! One logical light, driven through any of its replicas

use std::sync::Arc;

use yn360_proto::{DesiredState, FixtureState};

use crate::{
    ChannelConfig, ConnectionManager, DispatchError, Dispatcher, FixtureAddress, LinkState,
    ReplicaSet, Transport,
};

/// The surface a host integration talks to
pub struct Fixture<T: Transport> {
    manager: Arc<ConnectionManager<T>>,
    dispatcher: Dispatcher<T>,
}

impl<T: Transport> Fixture<T> {
    pub fn new(transport: Arc<T>, replicas: ReplicaSet, config: ChannelConfig) -> Self {
        let manager = Arc::new(ConnectionManager::new(transport, config));
        let dispatcher = Dispatcher::new(Arc::clone(&manager), replicas);
        Self { manager, dispatcher }
    }

    pub async fn apply_desired_state(&self, desired: DesiredState) -> Result<(), DispatchError> {
        self.dispatcher.apply(&desired).await
    }

    pub async fn turn_on(&self) -> Result<(), DispatchError> {
        self.apply_desired_state(DesiredState::on()).await
    }

    pub async fn turn_off(&self) -> Result<(), DispatchError> {
        self.apply_desired_state(DesiredState::off()).await
    }

    /// Snapshot of the last state a replica accepted
    pub async fn state(&self) -> FixtureState {
        self.dispatcher.state().await
    }

    pub async fn last_success(&self) -> Option<FixtureAddress> {
        self.dispatcher.last_success().await
    }

    pub async fn link_state(&self, address: &FixtureAddress) -> LinkState {
        self.manager.link_state(address).await
    }

    pub fn replicas(&self) -> &ReplicaSet {
        self.dispatcher.replicas()
    }

    /// Disconnect every replica and cancel pending idle timers
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ControlHandle;
    use crate::mock::{Behaviour, MockTransport};

    fn fixture(transport: &Arc<MockTransport>) -> Fixture<MockTransport> {
        let handle = ControlHandle::new(uuid::Uuid::from_u128(0xffe1));
        let replicas = ReplicaSet::new([("A".into(), handle), ("B".into(), handle)]).unwrap();
        Fixture::new(Arc::clone(transport), replicas, ChannelConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_replica_falls_back_and_is_skipped_next_time() {
        let transport = MockTransport::new();
        transport.set("A", Behaviour::Hang);
        let fixture = fixture(&transport);

        fixture.apply_desired_state(DesiredState::on()).await.unwrap();

        assert_eq!(fixture.last_success().await, Some("B".into()));
        assert_eq!(transport.connects("A"), 3);
        assert_eq!(transport.writes().len(), 1);
        assert_eq!(transport.writes()[0].0, FixtureAddress::from("B"));

        fixture.apply_desired_state(DesiredState::default().with_brightness(60)).await.unwrap();

        // B went first, so A was not touched again
        assert_eq!(transport.connects("A"), 3);
        assert_eq!(transport.connects("B"), 1);
        assert_eq!(transport.writes()[1].0, FixtureAddress::from("B"));
        assert_eq!(fixture.state().await.brightness, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_replica_teardown_does_not_block_fallback() {
        let transport = MockTransport::new();
        transport.set("A", Behaviour::HangWrites);
        transport.stall_disconnects("A");
        let fixture = fixture(&transport);

        let applied = tokio::time::timeout(Duration::from_secs(60), fixture.turn_on()).await;

        assert!(matches!(applied, Ok(Ok(()))));
        assert_eq!(fixture.last_success().await, Some("B".into()));
        assert_eq!(transport.writes().len(), 1);
        assert_eq!(transport.writes()[0].0, FixtureAddress::from("B"));
        assert_eq!(fixture.link_state(&"A".into()).await, LinkState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_commands_share_a_link_until_idle() {
        let transport = MockTransport::new();
        let fixture = fixture(&transport);

        fixture.turn_on().await.unwrap();
        fixture.turn_off().await.unwrap();
        assert_eq!(transport.connects("A"), 1);
        assert_eq!(fixture.link_state(&"A".into()).await, LinkState::IdleScheduled);

        tokio::time::sleep(Duration::from_secs(10) + Duration::from_millis(1)).await;
        assert_eq!(fixture.link_state(&"A".into()).await, LinkState::Disconnected);
        assert_eq!(transport.disconnects("A"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_disconnects_and_keeps_state() {
        let transport = MockTransport::new();
        let fixture = fixture(&transport);

        fixture.turn_on().await.unwrap();
        fixture.shutdown().await;

        assert_eq!(transport.disconnects("A"), 1);
        assert!(fixture.state().await.power);
        assert_eq!(fixture.replicas().len(), 2);
    }
}
