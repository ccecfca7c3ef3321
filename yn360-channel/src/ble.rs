//! btleplug transport for YN360 fixtures
//!
//! Provides the `Transport` used in production plus the scan and
//! characteristic discovery helpers needed to build a replica set.

use std::time::Duration;

use btleplug::api::{Central, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::debug;
use uuid::Uuid;

use yn360_proto::ble::is_fixture_name;

use crate::transport::{connect_within, disconnect_within};
use crate::{ControlHandle, FixtureAddress, LinkError, Transport, TransportError};

/// A peripheral seen during a scan
#[derive(Debug, Clone)]
pub struct DiscoveredFixture {
    pub name: String,
    pub address: FixtureAddress,
    pub rssi: Option<i16>,
    pub is_yn360: bool,
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, TransportError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(TransportError::NoAdapter)
}

/// An open GATT link to one peripheral
pub struct BleLink {
    peripheral: Peripheral,
}

/// Transport over the host's first Bluetooth adapter
pub struct BleTransport {
    adapter: Adapter,
    scan_window: Duration,
}

impl BleTransport {
    /// Use the default adapter; peripherals it has not seen yet are scanned
    /// for during `scan_window`
    pub async fn new(scan_window: Duration) -> Result<Self, TransportError> {
        let adapter = get_adapter().await?;
        Ok(Self { adapter, scan_window })
    }

    /// Scan for BLE devices
    ///
    /// Returns every peripheral that reported properties; YN360 fixtures have
    /// `is_yn360 = true`.
    pub async fn scan(&self, duration: Duration) -> Result<Vec<DiscoveredFixture>, TransportError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(duration).await;

        let devices = self.seen_devices().await;
        self.adapter.stop_scan().await?;
        devices
    }

    async fn seen_devices(&self) -> Result<Vec<DiscoveredFixture>, TransportError> {
        let peripherals = self.adapter.peripherals().await?;
        let mut devices = Vec::new();

        for peripheral in peripherals {
            if let Some(props) = peripheral.properties().await? {
                let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
                let address = FixtureAddress::new(peripheral.address().to_string());
                let is_yn360 = is_fixture_name(&name);

                devices.push(DiscoveredFixture { name, address, rssi: props.rssi, is_yn360 });
            }
        }

        Ok(devices)
    }

    /// Connect once and return the control characteristic, giving up after
    /// `timeout`
    ///
    /// The control characteristic is the last one that accepts writes with
    /// response.
    pub async fn find_control_handle(
        &self,
        address: &FixtureAddress,
        timeout: Duration,
    ) -> Result<ControlHandle, LinkError> {
        let link = connect_within(self, address, timeout).await?;

        let handle = control_handle_of(
            link.peripheral.characteristics().into_iter().map(|c| (c.uuid, c.properties)),
        );

        disconnect_within(self, &link, address, timeout).await;

        handle.ok_or_else(|| TransportError::NoWritableCharacteristic(address.clone()).into())
    }

    async fn lookup(&self, address: &FixtureAddress) -> Result<Option<Peripheral>, TransportError> {
        let peripherals = self.adapter.peripherals().await?;
        Ok(peripherals.into_iter().find(|p| {
            p.address().to_string().eq_ignore_ascii_case(address.as_str())
                || p.id().to_string().eq_ignore_ascii_case(address.as_str())
        }))
    }

    async fn find_peripheral(&self, address: &FixtureAddress) -> Result<Peripheral, TransportError> {
        if let Some(peripheral) = self.lookup(address).await? {
            return Ok(peripheral);
        }

        debug!("{address} not known to the adapter, scanning for {:?}", self.scan_window);
        self.adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(self.scan_window).await;
        let found = self.lookup(address).await;
        self.adapter.stop_scan().await?;

        found?.ok_or_else(|| TransportError::PeripheralNotFound(address.clone()))
    }
}

/// Pick the last characteristic that accepts writes with response
fn control_handle_of<I>(characteristics: I) -> Option<ControlHandle>
where
    I: IntoIterator<Item = (Uuid, CharPropFlags)>,
{
    characteristics
        .into_iter()
        .filter(|(_, properties)| properties.contains(CharPropFlags::WRITE))
        .last()
        .map(|(uuid, _)| ControlHandle::new(uuid))
}

impl Transport for BleTransport {
    type Connection = BleLink;

    async fn connect(&self, address: &FixtureAddress) -> Result<BleLink, TransportError> {
        let peripheral = self.find_peripheral(address).await?;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        Ok(BleLink { peripheral })
    }

    async fn write(
        &self,
        connection: &BleLink,
        handle: ControlHandle,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = connection
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.uuid())
            .ok_or(TransportError::CharacteristicNotFound(handle))?;

        let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        connection.peripheral.write(&characteristic, bytes, write_type).await?;
        Ok(())
    }

    async fn disconnect(&self, connection: &BleLink) -> Result<(), TransportError> {
        connection.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self, connection: &BleLink) -> bool {
        connection.peripheral.is_connected().await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_handle_is_last_write_with_response() {
        let first = Uuid::from_u128(0xffe1);
        let notify = Uuid::from_u128(0xffe2);
        let last = Uuid::from_u128(0xffe9);
        let unacked = Uuid::from_u128(0xfff0);

        let handle = control_handle_of([
            (first, CharPropFlags::WRITE | CharPropFlags::READ),
            (notify, CharPropFlags::NOTIFY),
            (last, CharPropFlags::WRITE),
            (unacked, CharPropFlags::WRITE_WITHOUT_RESPONSE),
        ]);
        assert_eq!(handle, Some(ControlHandle::new(last)));
    }

    #[test]
    fn write_without_response_alone_is_not_a_control_handle() {
        let handle = control_handle_of([
            (Uuid::from_u128(1), CharPropFlags::WRITE_WITHOUT_RESPONSE),
            (Uuid::from_u128(2), CharPropFlags::READ | CharPropFlags::NOTIFY),
        ]);
        assert_eq!(handle, None);
    }
}
