//! Remote XBee devices, reached over the air through a local one.

use std::sync::{Arc, RwLock};

use bytes::Bytes;

use crate::commands::AtDestination;
use crate::device::DeviceCore;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::address::XBee64BitAddress;
use crate::types::device::{DeviceIdentity, HardwareVersion, XBeeProtocol};
use crate::types::io::{IOLine, IOMode, IOSample, IOValue};

/// A module addressed by its 64-bit address through a local device.
///
/// Every AT command is wrapped in a remote AT request and correlated with
/// the local device's frame-ID counter; a remote never opens or owns the
/// transport.
pub struct RemoteXBeeDevice<T: Transport + 'static> {
    local: Arc<DeviceCore<T>>,
    addr64: XBee64BitAddress,
    identity: RwLock<DeviceIdentity>,
}

impl<T: Transport + 'static> RemoteXBeeDevice<T> {
    pub(crate) fn new(local: Arc<DeviceCore<T>>, addr64: XBee64BitAddress) -> Self {
        let mut identity = DeviceIdentity::new();
        identity.addr64 = Some(addr64);
        Self {
            local,
            addr64,
            identity: RwLock::new(identity),
        }
    }

    const fn dest(&self) -> AtDestination {
        AtDestination::Remote(self.addr64)
    }

    /// The remote's 64-bit address.
    #[must_use]
    pub const fn addr64(&self) -> XBee64BitAddress {
        self.addr64
    }

    fn identity_snapshot(&self) -> DeviceIdentity {
        self.identity.read().expect("identity poisoned").clone()
    }

    /// Cached node identifier.
    #[must_use]
    pub fn node_id(&self) -> Option<String> {
        self.identity_snapshot().node_id
    }

    /// Cached hardware version.
    #[must_use]
    pub fn hardware_version(&self) -> Option<HardwareVersion> {
        self.identity_snapshot().hardware_version
    }

    /// Cached firmware version (hex string).
    #[must_use]
    pub fn firmware_version(&self) -> Option<String> {
        self.identity_snapshot().firmware_version
    }

    /// Protocol derived from the cached hardware and firmware versions.
    #[must_use]
    pub fn protocol(&self) -> XBeeProtocol {
        self.identity_snapshot().protocol
    }

    /// Fetches the identity parameters still missing from the cache over
    /// the air (`NI`, `HV`, `VR`).
    ///
    /// The 64-bit address is already known, so only the remaining fields
    /// are read.
    pub async fn read_device_info(&self) -> Result<()> {
        self.local
            .initialize_identity(self.dest(), &self.identity)
            .await
    }

    /// Reads a parameter value from the remote.
    pub async fn get_parameter(&self, parameter: &str) -> Result<Bytes> {
        self.local.get_parameter(self.dest(), parameter).await
    }

    /// Writes a parameter value on the remote.
    pub async fn set_parameter(&self, parameter: &str, value: &[u8]) -> Result<()> {
        self.local
            .set_parameter(self.dest(), parameter, value)
            .await
    }

    /// Executes an action parameter on the remote.
    pub async fn execute_parameter(&self, parameter: &str) -> Result<()> {
        self.local.execute_parameter(self.dest(), parameter).await
    }

    /// Re-reads the remote's node identifier.
    pub async fn read_node_id(&self) -> Result<String> {
        self.local.read_node_id(self.dest(), &self.identity).await
    }

    /// Writes a new node identifier on the remote (at most 20 bytes).
    pub async fn set_node_id(&self, node_id: &str) -> Result<()> {
        self.local
            .set_node_id(self.dest(), &self.identity, node_id)
            .await
    }

    /// Configures an IO line on the remote.
    pub async fn set_io_configuration(&self, line: IOLine, mode: IOMode) -> Result<()> {
        self.local
            .set_io_configuration(self.dest(), line, mode)
            .await
    }

    /// Reads the configuration mode of an IO line on the remote.
    pub async fn get_io_configuration(&self, line: IOLine) -> Result<IOMode> {
        self.local.get_io_configuration(self.dest(), line).await
    }

    /// Drives a digital output line on the remote.
    pub async fn set_dio_value(&self, line: IOLine, value: IOValue) -> Result<()> {
        self.local.set_dio_value(self.dest(), line, value).await
    }

    /// Reads the digital level of a line on the remote.
    pub async fn get_dio_value(&self, line: IOLine) -> Result<IOValue> {
        self.local
            .get_dio_value(self.dest(), self.protocol(), line)
            .await
    }

    /// Sets the PWM duty cycle of a PWM-capable line on the remote.
    pub async fn set_pwm_duty_cycle(&self, line: IOLine, duty_cycle: f64) -> Result<()> {
        self.local
            .set_pwm_duty_cycle(self.dest(), line, duty_cycle)
            .await
    }

    /// Reads the PWM duty cycle of a PWM-capable line on the remote.
    pub async fn get_pwm_duty_cycle(&self, line: IOLine) -> Result<f64> {
        self.local.get_pwm_duty_cycle(self.dest(), line).await
    }

    /// Reads the 10-bit ADC conversion of an analog line on the remote.
    pub async fn get_adc_value(&self, line: IOLine) -> Result<u16> {
        self.local
            .get_adc_value(self.dest(), self.protocol(), line)
            .await
    }

    /// Reads an IO sample from the remote.
    pub async fn read_io_sample(&self) -> Result<IOSample> {
        self.local
            .read_io_sample(self.dest(), self.protocol())
            .await
    }

    /// Performs a software reset of the remote.
    ///
    /// Completion is the OK answer to the remote `FR`; a remote module
    /// announces its restart locally, not over the air.
    pub async fn reset(&self) -> Result<()> {
        self.local
            .engine
            .send_parameter(self.dest(), "FR", None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{XBeeConfig, XBeeDevice};
    use crate::testutil::{at_responder, mock_transport, spawn_module, MockTransport};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::time::Duration;

    async fn open_local() -> XBeeDevice<MockTransport> {
        let values = HashMap::from([
            ("AP", Bytes::from_static(&[0x01])),
            ("SH", Bytes::from_static(&[0x00, 0x13, 0xA2, 0x00])),
            ("SL", Bytes::from_static(&[0x40, 0x00, 0x00, 0x01])),
            ("NI", Bytes::from_static(b"local")),
            ("HV", Bytes::from_static(&[0x1E])),
            ("VR", Bytes::from_static(&[0x10, 0x81])),
            // Values served to remote AT requests as well.
            ("D3", Bytes::from_static(&[0x03])),
        ]);
        let (transport, far) = mock_transport();
        spawn_module(far, at_responder(values));
        let mut device = XBeeDevice::with_config(
            transport,
            XBeeConfig::default().receive_timeout(Duration::from_millis(300)),
        );
        device.open().await.unwrap();
        device
    }

    fn remote_addr() -> XBee64BitAddress {
        XBee64BitAddress::from_hex("0013A20040BBCCDD").unwrap()
    }

    #[tokio::test]
    async fn test_remote_parameter_goes_over_the_air() {
        let local = open_local().await;
        let remote = local.remote(remote_addr());

        assert_eq!(remote.addr64(), remote_addr());
        let value = remote.get_parameter("D3").await.unwrap();
        assert_eq!(&value[..], &[0x03]);

        remote.set_parameter("D3", &[0x05]).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_reads_device_info_lazily() {
        let local = open_local().await;
        let remote = local.remote(remote_addr());

        assert_eq!(remote.node_id(), None);
        assert_eq!(remote.protocol(), XBeeProtocol::Unknown);

        remote.read_device_info().await.unwrap();
        assert_eq!(remote.node_id().as_deref(), Some("local"));
        assert_eq!(remote.hardware_version().unwrap().value(), 0x1E);
        assert_eq!(remote.firmware_version().as_deref(), Some("1081"));
        assert_eq!(remote.protocol(), XBeeProtocol::ZigBee);
    }

    #[tokio::test]
    async fn test_remote_io_configuration() {
        let local = open_local().await;
        let remote = local.remote(remote_addr());

        assert_eq!(
            remote.get_io_configuration(IOLine::Dio3Ad3).await.unwrap(),
            IOMode::DigitalIn
        );
        remote
            .set_dio_value(IOLine::Dio4Ad4, IOValue::High)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remote_reset_requires_ok() {
        let local = open_local().await;
        let remote = local.remote(remote_addr());
        remote.reset().await.unwrap();
    }
}
