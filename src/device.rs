//! The local XBee device facade.
//!
//! [`XBeeDevice`] owns the transport and the background reader, and builds
//! the synchronous command surface (parameters, IO lines, PWM, reset,
//! identity) on top of the send engine.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

use crate::commands::{AtDestination, CommandEngine, ResponseListener};
use crate::error::{Error, Result};
use crate::listener::{FrameDispatcher, FrameSubscription};
use crate::protocol::packet::{
    TransmitRequestFrame, Tx64Frame, XBeeApiFrame, NO_FRAME_ID,
};
use crate::reader::run_read_loop;
use crate::remote::RemoteXBeeDevice;
use crate::transport::serial::SerialConfig;
use crate::transport::{SerialTransport, Transport};
use crate::types::address::{XBee16BitAddress, XBee64BitAddress};
use crate::types::device::{
    DeviceIdentity, HardwareVersion, OperatingMode, XBeeProtocol,
};
use crate::types::io::{IOLine, IOMode, IOSample, IOValue};

/// Default receive timeout for command responses.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(2000);
/// Default guard time of silence before the `+++` escape sequence.
pub const DEFAULT_COMMAND_MODE_GUARD: Duration = Duration::from_millis(1200);
/// Default wait for the `OK` answer to the escape sequence.
pub const DEFAULT_COMMAND_MODE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Maximum node identifier length in bytes.
const NODE_ID_MAX_LEN: usize = 20;

/// Read-IO-sample AT command.
const IS_COMMAND: &str = "IS";

/// Device configuration.
#[derive(Debug, Clone)]
pub struct XBeeConfig {
    /// How long a synchronous send waits for its response.
    pub receive_timeout: Duration,
    /// Silence required before the AT-mode escape sequence.
    pub command_mode_guard: Duration,
    /// How long to wait for `OK` after the escape sequence.
    pub command_mode_timeout: Duration,
    /// Frame mode to speak; one of the two API modes.
    pub operating_mode: OperatingMode,
}

impl Default for XBeeConfig {
    fn default() -> Self {
        Self {
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            command_mode_guard: DEFAULT_COMMAND_MODE_GUARD,
            command_mode_timeout: DEFAULT_COMMAND_MODE_TIMEOUT,
            operating_mode: OperatingMode::Api,
        }
    }
}

impl XBeeConfig {
    /// Sets the receive timeout.
    #[must_use]
    pub const fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Sets the AT-mode guard time.
    #[must_use]
    pub const fn command_mode_guard(mut self, guard: Duration) -> Self {
        self.command_mode_guard = guard;
        self
    }

    /// Sets the AT-mode probe timeout.
    #[must_use]
    pub const fn command_mode_timeout(mut self, timeout: Duration) -> Self {
        self.command_mode_timeout = timeout;
        self
    }

    /// Sets the expected API mode.
    #[must_use]
    pub const fn operating_mode(mut self, mode: OperatingMode) -> Self {
        self.operating_mode = mode;
        self
    }
}

/// State shared between a local device and the remotes reached through it.
pub(crate) struct DeviceCore<T> {
    pub(crate) engine: CommandEngine<T>,
    pub(crate) identity: RwLock<DeviceIdentity>,
}

impl<T: Transport> DeviceCore<T> {
    /// Reads a parameter; the response must carry a value.
    pub(crate) async fn get_parameter(
        &self,
        dest: AtDestination,
        parameter: &str,
    ) -> Result<Bytes> {
        self.engine
            .send_parameter(dest, parameter, None)
            .await?
            .ok_or_else(|| {
                Error::OperationNotSupported(format!("couldn't read the '{parameter}' value"))
            })
    }

    /// Writes a parameter value.
    pub(crate) async fn set_parameter(
        &self,
        dest: AtDestination,
        parameter: &str,
        value: &[u8],
    ) -> Result<()> {
        self.engine
            .send_parameter(dest, parameter, Some(Bytes::copy_from_slice(value)))
            .await?;
        Ok(())
    }

    /// Executes an action parameter that carries no value either way.
    pub(crate) async fn execute_parameter(
        &self,
        dest: AtDestination,
        parameter: &str,
    ) -> Result<()> {
        self.engine.send_parameter(dest, parameter, None).await?;
        Ok(())
    }

    /// Fills the empty identity fields by querying the module, then derives
    /// the protocol from the hardware and firmware versions.
    pub(crate) async fn initialize_identity(
        &self,
        dest: AtDestination,
        identity: &RwLock<DeviceIdentity>,
    ) -> Result<()> {
        let addr_missing = {
            let id = identity.read().expect("identity poisoned");
            id.addr64.map_or(true, |a| !a.is_known())
        };
        if addr_missing {
            let high = self.get_parameter(dest, "SH").await?;
            let low = self.get_parameter(dest, "SL").await?;
            let addr = XBee64BitAddress::from_sh_sl(&high, &low)?;
            identity.write().expect("identity poisoned").addr64 = Some(addr);
        }
        let node_id_missing = {
            identity.read().expect("identity poisoned").node_id.is_none()
        };
        if node_id_missing {
            let value = self.get_parameter(dest, "NI").await?;
            let node_id = String::from_utf8_lossy(&value).into_owned();
            identity.write().expect("identity poisoned").node_id = Some(node_id);
        }
        let hardware_missing = {
            identity
                .read()
                .expect("identity poisoned")
                .hardware_version
                .is_none()
        };
        if hardware_missing {
            let value = self.get_parameter(dest, "HV").await?;
            let byte = *value.first().ok_or_else(|| {
                Error::OperationNotSupported("couldn't read the 'HV' value".into())
            })?;
            identity.write().expect("identity poisoned").hardware_version =
                Some(HardwareVersion::new(byte));
        }
        let firmware_missing = {
            identity
                .read()
                .expect("identity poisoned")
                .firmware_version
                .is_none()
        };
        if firmware_missing {
            let value = self.get_parameter(dest, "VR").await?;
            identity.write().expect("identity poisoned").firmware_version =
                Some(hex::encode_upper(&value));
        }

        let mut id = identity.write().expect("identity poisoned");
        if let (Some(hw), Some(fw)) = (id.hardware_version, id.firmware_version.clone()) {
            id.protocol = XBeeProtocol::determine(hw, &fw);
        }
        Ok(())
    }

    /// Re-reads the node identifier and refreshes the cache.
    pub(crate) async fn read_node_id(
        &self,
        dest: AtDestination,
        identity: &RwLock<DeviceIdentity>,
    ) -> Result<String> {
        let value = self.get_parameter(dest, "NI").await?;
        let node_id = String::from_utf8_lossy(&value).into_owned();
        identity.write().expect("identity poisoned").node_id = Some(node_id.clone());
        Ok(node_id)
    }

    /// Writes a new node identifier and updates the cache.
    pub(crate) async fn set_node_id(
        &self,
        dest: AtDestination,
        identity: &RwLock<DeviceIdentity>,
        node_id: &str,
    ) -> Result<()> {
        if node_id.len() > NODE_ID_MAX_LEN {
            return Err(Error::InvalidArgument(format!(
                "node ID must be at most {NODE_ID_MAX_LEN} bytes"
            )));
        }
        self.set_parameter(dest, "NI", node_id.as_bytes()).await?;
        identity.write().expect("identity poisoned").node_id = Some(node_id.to_owned());
        Ok(())
    }

    /// Configures an IO line.
    pub(crate) async fn set_io_configuration(
        &self,
        dest: AtDestination,
        line: IOLine,
        mode: IOMode,
    ) -> Result<()> {
        match mode {
            IOMode::Pwm if !line.has_pwm_capability() => {
                return Err(Error::InvalidArgument(format!(
                    "{line} cannot be configured as PWM"
                )))
            }
            IOMode::Adc if !line.has_adc_capability() => {
                return Err(Error::InvalidArgument(format!(
                    "{line} cannot be configured as ADC"
                )))
            }
            _ => {}
        }
        self.set_parameter(dest, line.configuration_command(), &[mode.id()])
            .await
    }

    /// Reads the configuration mode of an IO line.
    pub(crate) async fn get_io_configuration(
        &self,
        dest: AtDestination,
        line: IOLine,
    ) -> Result<IOMode> {
        let value = self
            .get_parameter(dest, line.configuration_command())
            .await?;
        let byte = *value.first().ok_or_else(|| {
            Error::OperationNotSupported(format!("answer carries no configuration for {line}"))
        })?;
        IOMode::from_id(byte, line).ok_or_else(|| {
            Error::OperationNotSupported(format!(
                "received configuration {byte:#04x} is not valid for {line}"
            ))
        })
    }

    /// Drives a digital output line high or low.
    ///
    /// The value identifiers coincide with the output configuration modes,
    /// so this writes through the line's configuration command.
    pub(crate) async fn set_dio_value(
        &self,
        dest: AtDestination,
        line: IOLine,
        value: IOValue,
    ) -> Result<()> {
        self.set_parameter(dest, line.configuration_command(), &[value.id()])
            .await
    }

    /// Reads the digital level of a line from a fresh IO sample.
    pub(crate) async fn get_dio_value(
        &self,
        dest: AtDestination,
        protocol: XBeeProtocol,
        line: IOLine,
    ) -> Result<IOValue> {
        let sample = self.read_io_sample(dest, protocol).await?;
        sample.digital_value(line).ok_or_else(|| {
            Error::OperationNotSupported(format!("answer carries no digital data for {line}"))
        })
    }

    /// Reads the 10-bit ADC conversion of a line from a fresh IO sample.
    pub(crate) async fn get_adc_value(
        &self,
        dest: AtDestination,
        protocol: XBeeProtocol,
        line: IOLine,
    ) -> Result<u16> {
        let sample = self.read_io_sample(dest, protocol).await?;
        sample.analog_value(line).ok_or_else(|| {
            Error::OperationNotSupported(format!("answer carries no analog data for {line}"))
        })
    }

    /// Sets the PWM duty cycle of a PWM-capable line, in percent.
    pub(crate) async fn set_pwm_duty_cycle(
        &self,
        dest: AtDestination,
        line: IOLine,
        duty_cycle: f64,
    ) -> Result<()> {
        let command = line
            .pwm_command()
            .ok_or_else(|| Error::InvalidArgument(format!("{line} has no PWM capability")))?;
        if !(0.0..=100.0).contains(&duty_cycle) {
            return Err(Error::InvalidArgument(
                "duty cycle must be between 0% and 100%".into(),
            ));
        }
        let scaled = (duty_cycle * 1023.0 / 100.0).round() as u16;
        self.set_parameter(dest, command, &u16_to_param_bytes(scaled))
            .await
    }

    /// Reads the PWM duty cycle of a PWM-capable line, in percent.
    pub(crate) async fn get_pwm_duty_cycle(
        &self,
        dest: AtDestination,
        line: IOLine,
    ) -> Result<f64> {
        let command = line
            .pwm_command()
            .ok_or_else(|| Error::InvalidArgument(format!("{line} has no PWM capability")))?;
        let value = self.get_parameter(dest, command).await?;
        let raw = f64::from(param_bytes_to_u16(&value));
        Ok((raw * 100.0 / 1023.0 * 100.0).round() / 100.0)
    }

    /// Obtains an IO sample.
    ///
    /// On 802.15.4 the `IS` answer is empty and the sample arrives as an
    /// asynchronous RX-IO frame; a one-shot listener picks it up. On the
    /// other protocols the sample is embedded in the `IS` response value.
    pub(crate) async fn read_io_sample(
        &self,
        dest: AtDestination,
        protocol: XBeeProtocol,
    ) -> Result<IOSample> {
        if protocol != XBeeProtocol::Raw802Dot15Dot4 {
            let value = self
                .engine
                .send_parameter(dest, IS_COMMAND, None)
                .await?
                .ok_or_else(|| {
                    Error::OperationNotSupported("answer carries no IO sample".into())
                })?;
            return IOSample::decode(&value);
        }

        // Subscribe before issuing IS so the sample frame cannot race us.
        let mut subscription = self.engine.dispatcher.subscribe();
        self.engine.send_parameter(dest, IS_COMMAND, None).await?;

        let receive_timeout = self.engine.receive_timeout();
        let deadline = Instant::now() + receive_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, subscription.recv()).await {
                Ok(Some(frame)) => match &frame {
                    XBeeApiFrame::Rx64IO(f) => return IOSample::decode_raw_802(&f.data),
                    XBeeApiFrame::Rx16IO(f) => return IOSample::decode_raw_802(&f.data),
                    XBeeApiFrame::IODataSampleRx(f) => return IOSample::decode(&f.data),
                    _ => {}
                },
                Ok(None) => return Err(Error::TransportClosed),
                Err(_) => {
                    return Err(Error::Timeout {
                        timeout_ms: receive_timeout.as_millis() as u64,
                    })
                }
            }
        }
    }
}

/// Encodes an integer parameter value with no leading zero bytes.
fn u16_to_param_bytes(value: u16) -> Vec<u8> {
    if value > 0xFF {
        value.to_be_bytes().to_vec()
    } else {
        vec![value as u8]
    }
}

/// Decodes a big-endian integer parameter value; only the low 16 bits
/// matter for duty-cycle registers.
fn param_bytes_to_u16(bytes: &[u8]) -> u16 {
    bytes[bytes.len().saturating_sub(2)..]
        .iter()
        .fold(0u16, |acc, &b| (acc << 8) | u16::from(b))
}

/// A locally attached XBee module.
pub struct XBeeDevice<T: Transport + 'static> {
    core: Arc<DeviceCore<T>>,
    read_task: Option<JoinHandle<()>>,
}

impl XBeeDevice<SerialTransport> {
    /// Creates a device on a serial port with default settings
    /// (9600-8-N-1, no flow control).
    #[must_use]
    pub fn serial(port: impl Into<String>) -> Self {
        Self::with_serial_config(SerialConfig::new(port))
    }

    /// Creates a device with custom serial parameters.
    #[must_use]
    pub fn with_serial_config(config: SerialConfig) -> Self {
        Self::new(SerialTransport::new(config))
    }
}

impl<T: Transport + 'static> XBeeDevice<T> {
    /// Creates a device over the given transport with default
    /// configuration.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, XBeeConfig::default())
    }

    /// Creates a device over the given transport.
    #[must_use]
    pub fn with_config(transport: T, config: XBeeConfig) -> Self {
        let engine = CommandEngine::new(
            Arc::new(Mutex::new(transport)),
            FrameDispatcher::new(),
            Arc::new(RwLock::new(OperatingMode::Unknown)),
            Arc::new(RwLock::new(config)),
        );
        Self {
            core: Arc::new(DeviceCore {
                engine,
                identity: RwLock::new(DeviceIdentity::new()),
            }),
            read_task: None,
        }
    }

    /// Opens the transport, starts the background reader, determines the
    /// operating mode and reads the device identity.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidOperatingMode`] when the module is in
    /// transparent AT mode or does not answer the probe; the transport is
    /// closed again in that case. Identity reads can fail with the usual
    /// command errors.
    pub async fn open(&mut self) -> Result<()> {
        let reader = {
            let mut transport = self.core.engine.transport.lock().await;
            if transport.is_open() && self.read_task.is_some() {
                return Ok(());
            }
            transport.open().await?;
            transport
                .take_reader()
                .ok_or(Error::InterfaceNotOpen)?
        };

        self.core.engine.dispatcher.reopen();
        self.read_task = Some(tokio::spawn(run_read_loop(
            reader,
            Arc::clone(&self.core.engine.mode),
            self.core.engine.dispatcher.clone(),
        )));

        let mode = self.determine_operating_mode().await?;
        if !mode.is_api() {
            self.close().await?;
            return Err(Error::InvalidOperatingMode(mode));
        }
        self.set_mode(mode);

        self.initialize().await
    }

    /// Stops the reader and closes the transport. Cached identity
    /// survives; reopening re-determines the operating mode.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        self.core.engine.dispatcher.close();
        self.set_mode(OperatingMode::Unknown);
        let mut transport = self.core.engine.transport.lock().await;
        transport.close().await
    }

    /// Returns true while the transport is open.
    pub async fn is_open(&self) -> bool {
        self.core.engine.transport.lock().await.is_open()
    }

    fn set_mode(&self, mode: OperatingMode) {
        *self.core.engine.mode.write().expect("operating mode poisoned") = mode;
    }

    /// The operating mode in effect.
    #[must_use]
    pub fn operating_mode(&self) -> OperatingMode {
        *self.core.engine.mode.read().expect("operating mode poisoned")
    }

    /// The receive timeout in effect.
    #[must_use]
    pub fn receive_timeout(&self) -> Duration {
        self.core.engine.receive_timeout()
    }

    /// Changes the receive timeout.
    pub fn set_receive_timeout(&self, timeout: Duration) {
        self.core
            .engine
            .config
            .write()
            .expect("config poisoned")
            .receive_timeout = timeout;
    }

    fn identity(&self) -> DeviceIdentity {
        self.core.identity.read().expect("identity poisoned").clone()
    }

    /// Cached 64-bit address.
    #[must_use]
    pub fn addr64(&self) -> Option<XBee64BitAddress> {
        self.identity().addr64
    }

    /// Cached 16-bit address.
    #[must_use]
    pub fn addr16(&self) -> Option<XBee16BitAddress> {
        self.identity().addr16
    }

    /// Cached node identifier.
    #[must_use]
    pub fn node_id(&self) -> Option<String> {
        self.identity().node_id
    }

    /// Cached hardware version.
    #[must_use]
    pub fn hardware_version(&self) -> Option<HardwareVersion> {
        self.identity().hardware_version
    }

    /// Cached firmware version (hex string).
    #[must_use]
    pub fn firmware_version(&self) -> Option<String> {
        self.identity().firmware_version
    }

    /// Protocol derived from the cached hardware and firmware versions.
    #[must_use]
    pub fn protocol(&self) -> XBeeProtocol {
        self.identity().protocol
    }

    /// Reads the identity parameters the cache is still missing (`SH`,
    /// `SL`, `NI`, `HV`, `VR`) and derives the protocol.
    pub async fn initialize(&self) -> Result<()> {
        self.core
            .initialize_identity(AtDestination::Local, &self.core.identity)
            .await
    }

    /// Determines how the module is talking to us.
    ///
    /// An `AP` read answered in frame mode settles on API or API-escape.
    /// When it times out, the transparent-mode probe (guard silence, then
    /// `+++`, then `OK`) distinguishes AT mode from a dead line.
    async fn determine_operating_mode(&self) -> Result<OperatingMode> {
        let configured = {
            self.core
                .engine
                .config
                .read()
                .expect("config poisoned")
                .operating_mode
        };
        self.set_mode(if configured.is_api() {
            configured
        } else {
            OperatingMode::Api
        });

        match self
            .core
            .engine
            .send_parameter(AtDestination::Local, "AP", None)
            .await
        {
            Ok(Some(value)) => Ok(if value.first() == Some(&2) {
                OperatingMode::ApiEscape
            } else {
                OperatingMode::Api
            }),
            Ok(None) => Ok(self.operating_mode()),
            Err(Error::Timeout { .. }) => {
                if self.enter_at_command_mode().await.unwrap_or(false) {
                    Ok(OperatingMode::At)
                } else {
                    Ok(OperatingMode::Unknown)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Attempts the transparent-mode escape sequence; true when the module
    /// answers `OK`.
    async fn enter_at_command_mode(&self) -> Result<bool> {
        let (guard, probe_timeout) = {
            let config = self.core.engine.config.read().expect("config poisoned");
            (config.command_mode_guard, config.command_mode_timeout)
        };

        let mut raw = self.core.engine.dispatcher.subscribe_raw();
        tokio::time::sleep(guard).await;
        {
            let mut transport = self.core.engine.transport.lock().await;
            if !transport.is_open() {
                return Err(Error::InterfaceNotOpen);
            }
            transport.write(Bytes::from_static(b"+++")).await?;
        }

        let deadline = Instant::now() + probe_timeout;
        let mut answer = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, raw.recv()).await {
                Ok(Some(chunk)) => {
                    answer.extend_from_slice(&chunk);
                    if answer.windows(2).any(|w| w == b"OK") {
                        return Ok(true);
                    }
                }
                Ok(None) | Err(_) => return Ok(false),
            }
        }
    }

    /// Reads a parameter value.
    pub async fn get_parameter(&self, parameter: &str) -> Result<Bytes> {
        self.core.get_parameter(AtDestination::Local, parameter).await
    }

    /// Writes a parameter value.
    pub async fn set_parameter(&self, parameter: &str, value: &[u8]) -> Result<()> {
        self.core
            .set_parameter(AtDestination::Local, parameter, value)
            .await
    }

    /// Executes an action parameter.
    pub async fn execute_parameter(&self, parameter: &str) -> Result<()> {
        self.core
            .execute_parameter(AtDestination::Local, parameter)
            .await
    }

    /// Re-reads the node identifier from the module.
    pub async fn read_node_id(&self) -> Result<String> {
        self.core
            .read_node_id(AtDestination::Local, &self.core.identity)
            .await
    }

    /// Writes a new node identifier (at most 20 bytes).
    pub async fn set_node_id(&self, node_id: &str) -> Result<()> {
        self.core
            .set_node_id(AtDestination::Local, &self.core.identity, node_id)
            .await
    }

    /// Configures an IO line.
    pub async fn set_io_configuration(&self, line: IOLine, mode: IOMode) -> Result<()> {
        self.core
            .set_io_configuration(AtDestination::Local, line, mode)
            .await
    }

    /// Reads the configuration mode of an IO line.
    pub async fn get_io_configuration(&self, line: IOLine) -> Result<IOMode> {
        self.core
            .get_io_configuration(AtDestination::Local, line)
            .await
    }

    /// Drives a digital output line.
    pub async fn set_dio_value(&self, line: IOLine, value: IOValue) -> Result<()> {
        self.core
            .set_dio_value(AtDestination::Local, line, value)
            .await
    }

    /// Reads the digital level of a line.
    pub async fn get_dio_value(&self, line: IOLine) -> Result<IOValue> {
        self.core
            .get_dio_value(AtDestination::Local, self.protocol(), line)
            .await
    }

    /// Sets the PWM duty cycle of a PWM-capable line, in percent.
    pub async fn set_pwm_duty_cycle(&self, line: IOLine, duty_cycle: f64) -> Result<()> {
        self.core
            .set_pwm_duty_cycle(AtDestination::Local, line, duty_cycle)
            .await
    }

    /// Reads the PWM duty cycle of a PWM-capable line, in percent.
    pub async fn get_pwm_duty_cycle(&self, line: IOLine) -> Result<f64> {
        self.core
            .get_pwm_duty_cycle(AtDestination::Local, line)
            .await
    }

    /// Reads the 10-bit ADC conversion of an analog line.
    pub async fn get_adc_value(&self, line: IOLine) -> Result<u16> {
        self.core
            .get_adc_value(AtDestination::Local, self.protocol(), line)
            .await
    }

    /// Performs a software reset and waits for the module to announce the
    /// restart.
    ///
    /// Some firmware resets before acknowledging `FR`, so a missing AT
    /// response is tolerated; the completion signal is the modem status.
    pub async fn reset(&self) -> Result<()> {
        let mut subscription = self.core.engine.dispatcher.subscribe();
        match self
            .core
            .engine
            .send_parameter(AtDestination::Local, "FR", None)
            .await
        {
            Ok(_) | Err(Error::Timeout { .. }) => {}
            Err(e) => return Err(e),
        }

        let receive_timeout = self.receive_timeout();
        let deadline = Instant::now() + receive_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, subscription.recv()).await {
                Ok(Some(XBeeApiFrame::ModemStatus(status))) if status.status.is_reset() => {
                    tracing::debug!("module restart confirmed");
                    return Ok(());
                }
                Ok(Some(_)) => {}
                Ok(None) => return Err(Error::TransportClosed),
                Err(_) => {
                    return Err(Error::Timeout {
                        timeout_ms: receive_timeout.as_millis() as u64,
                    })
                }
            }
        }
    }

    /// Sends an RF payload to the given 64-bit address and verifies the
    /// delivery status.
    pub async fn send_data(&self, dest64: XBee64BitAddress, data: &[u8]) -> Result<()> {
        let frame = self.transmit_frame(dest64, Bytes::copy_from_slice(data));
        self.core.engine.send_and_check(frame, false).await
    }

    /// Sends an RF payload without waiting for the delivery status.
    pub async fn send_data_async(&self, dest64: XBee64BitAddress, data: &[u8]) -> Result<()> {
        let frame = self.transmit_frame(dest64, Bytes::copy_from_slice(data));
        self.core.engine.send_and_check(frame, true).await
    }

    fn transmit_frame(&self, dest64: XBee64BitAddress, payload: Bytes) -> XBeeApiFrame {
        match self.protocol() {
            XBeeProtocol::Raw802Dot15Dot4 => XBeeApiFrame::Tx64(Tx64Frame {
                frame_id: NO_FRAME_ID,
                dest64,
                options: 0,
                payload,
            }),
            _ => XBeeApiFrame::TransmitRequest(TransmitRequestFrame {
                frame_id: NO_FRAME_ID,
                dest64,
                dest16: XBee16BitAddress::UNKNOWN,
                broadcast_radius: 0,
                options: 0,
                payload,
            }),
        }
    }

    /// Sends a frame and waits for its correlated response. Frames without
    /// a frame ID are written and `None` comes back.
    pub async fn send_packet(&self, frame: XBeeApiFrame) -> Result<Option<XBeeApiFrame>> {
        self.core.engine.send_frame(frame).await
    }

    /// Sends a frame without waiting for any response.
    pub async fn send_packet_async(&self, frame: XBeeApiFrame) -> Result<()> {
        self.core.engine.send_frame_async(frame).await
    }

    /// Sends a frame and returns a keyed listener for its responses.
    pub async fn send_packet_with_listener(
        &self,
        frame: XBeeApiFrame,
    ) -> Result<ResponseListener> {
        self.core.engine.send_frame_with_listener(frame).await
    }

    /// Subscribes to every frame the reader decodes.
    #[must_use]
    pub fn subscribe(&self) -> FrameSubscription {
        self.core.engine.dispatcher.subscribe()
    }

    /// Creates a handle to a remote module reached through this device.
    #[must_use]
    pub fn remote(&self, addr64: XBee64BitAddress) -> RemoteXBeeDevice<T> {
        RemoteXBeeDevice::new(Arc::clone(&self.core), addr64)
    }
}

impl<T: Transport + 'static> Drop for XBeeDevice<T> {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}
