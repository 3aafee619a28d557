use alloc::vec::Vec;
use core::fmt::{Display, Formatter};
use core::time::Duration;

use crate::advertisement::{AdvertisingSizeLimit, EncodedPayload, PayloadEncoder, MAX_AD_VALUE_LEN};

/// Longest local name Bluetooth allows a device to carry.
pub const MAX_DEVICE_NAME_LEN: usize = 248;

/// Company identifier reserved by the Bluetooth SIG for internal and interoperability tests.
/// Shipping advertisements must not use it.
pub const RESERVED_TEST_VENDOR_ID: u16 = 0xffff;

pub type DeviceName = heapless::String<MAX_DEVICE_NAME_LEN>;

/// Trades advertising interval against energy use.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdvertiseMode {
  LowPower,
  Balanced,
  #[default]
  LowLatency,
}

impl AdvertiseMode {
  /// Nominal interval between advertising events in this mode.
  pub fn interval(&self) -> Duration {
    match self {
      AdvertiseMode::LowPower => Duration::from_millis(1000),
      AdvertiseMode::Balanced => Duration::from_millis(250),
      AdvertiseMode::LowLatency => Duration::from_millis(100),
    }
  }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TxPowerLevel {
  UltraLow,
  Low,
  Medium,
  #[default]
  High,
}

impl TxPowerLevel {
  /// Approximate radiated power, also the value placed in a TX power record.
  pub fn dbm(&self) -> i8 {
    match self {
      TxPowerLevel::UltraLow => -21,
      TxPowerLevel::Low => -15,
      TxPowerLevel::Medium => -7,
      TxPowerLevel::High => 1,
    }
  }
}

/// A vendor-id tagged record carried in the advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManufacturerData {
  pub vendor_id: u16,
  pub data: Vec<u8>,
}

/// Radio-side parameters of an advertising session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdvertiseSettings {
  pub mode: AdvertiseMode,
  pub tx_power_level: TxPowerLevel,

  /// Whether scanners may initiate a connection from this advertisement.
  pub connectable: bool,
}

impl Default for AdvertiseSettings {
  fn default() -> Self {
    Self {
      mode: AdvertiseMode::default(),
      tx_power_level: TxPowerLevel::default(),
      connectable: true,
    }
  }
}

/// What goes on air.  Holds both the structured records, for platforms that assemble the PDU
/// themselves, and the encoding the size cap was checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisePayload {
  include_device_name: bool,
  include_tx_power_level: bool,
  device_name: DeviceName,
  manufacturer_data: Vec<ManufacturerData>,
  encoded: EncodedPayload,
}

impl AdvertisePayload {
  pub fn include_device_name(&self) -> bool {
    self.include_device_name
  }

  pub fn include_tx_power_level(&self) -> bool {
    self.include_tx_power_level
  }

  pub fn device_name(&self) -> &str {
    &self.device_name
  }

  pub fn manufacturer_data(&self) -> &[ManufacturerData] {
    &self.manufacturer_data
  }

  pub fn encoded(&self) -> &EncodedPayload {
    &self.encoded
  }
}

/// Immutable bundle of settings and payload for one advertising session.  Changing anything
/// means building a new value and handing it to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingConfiguration {
  settings: AdvertiseSettings,
  payload: AdvertisePayload,
  size_limit: AdvertisingSizeLimit,
}

impl AdvertisingConfiguration {
  pub fn builder() -> AdvertisingConfigurationBuilder {
    AdvertisingConfigurationBuilder::new()
  }

  pub fn settings(&self) -> &AdvertiseSettings {
    &self.settings
  }

  pub fn payload(&self) -> &AdvertisePayload {
    &self.payload
  }

  pub fn size_limit(&self) -> AdvertisingSizeLimit {
    self.size_limit
  }

  pub fn encoded_len(&self) -> usize {
    self.payload.encoded.len()
  }
}

impl Default for AdvertisingConfiguration {
  /// Low latency, high power, connectable, device name included, no manufacturer records.
  /// Always fits the legacy cap.
  fn default() -> Self {
    AdvertisingConfigurationBuilder::new().assemble()
  }
}

/// Consuming builder for [AdvertisingConfiguration].  Every limit is checked no later than
/// [AdvertisingConfigurationBuilder::build], so an invalid configuration never exists.
#[derive(Debug, Clone)]
pub struct AdvertisingConfigurationBuilder {
  settings: AdvertiseSettings,
  include_device_name: bool,
  include_tx_power_level: bool,
  device_name: DeviceName,
  manufacturer_data: Vec<ManufacturerData>,
  size_limit: AdvertisingSizeLimit,
}

impl Default for AdvertisingConfigurationBuilder {
  fn default() -> Self {
    Self {
      settings: AdvertiseSettings::default(),
      include_device_name: true,
      include_tx_power_level: false,
      device_name: DeviceName::new(),
      manufacturer_data: Vec::new(),
      size_limit: AdvertisingSizeLimit::default(),
    }
  }
}

impl AdvertisingConfigurationBuilder {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn mode(mut self, mode: AdvertiseMode) -> Self {
    self.settings.mode = mode;
    self
  }

  pub fn tx_power_level(mut self, tx_power_level: TxPowerLevel) -> Self {
    self.settings.tx_power_level = tx_power_level;
    self
  }

  pub fn connectable(mut self, connectable: bool) -> Self {
    self.settings.connectable = connectable;
    self
  }

  pub fn include_device_name(mut self, include_device_name: bool) -> Self {
    self.include_device_name = include_device_name;
    self
  }

  pub fn include_tx_power_level(mut self, include_tx_power_level: bool) -> Self {
    self.include_tx_power_level = include_tx_power_level;
    self
  }

  pub fn size_limit(mut self, size_limit: AdvertisingSizeLimit) -> Self {
    self.size_limit = size_limit;
    self
  }

  /// Name placed in the payload when [Self::include_device_name] is set.  This should match the
  /// name the host adapter reports, it is only carried here so its length counts against the cap.
  pub fn device_name(mut self, name: &str) -> Result<Self, ValidationError> {
    let mut device_name = DeviceName::new();
    device_name
      .push_str(name)
      .map_err(|_| ValidationError::DeviceNameTooLong { len: name.len() })?;
    self.device_name = device_name;
    Ok(self)
  }

  /// Add a manufacturer specific record.  Pushing a vendor id a second time replaces the earlier
  /// record in place.
  pub fn push_manufacturer_data(mut self, vendor_id: u16, data: &[u8]) -> Result<Self, ValidationError> {
    if vendor_id == RESERVED_TEST_VENDOR_ID {
      return Err(ValidationError::InvalidVendorId(vendor_id));
    }
    let len = 2 + data.len();
    if len > MAX_AD_VALUE_LEN {
      return Err(ValidationError::RecordTooLarge { len });
    }

    match self.manufacturer_data.iter_mut().find(|r| r.vendor_id == vendor_id) {
      Some(existing) => existing.data = data.to_vec(),
      None => self.manufacturer_data.push(ManufacturerData {
        vendor_id,
        data: data.to_vec(),
      }),
    }
    Ok(self)
  }

  pub fn build(self) -> Result<AdvertisingConfiguration, ValidationError> {
    let limit = self.size_limit.bytes();
    let config = self.assemble();
    let encoded_len = config.encoded_len();
    if encoded_len > limit {
      return Err(ValidationError::PayloadTooLarge { encoded_len, limit });
    }
    Ok(config)
  }

  fn assemble(self) -> AdvertisingConfiguration {
    let mut encoder = PayloadEncoder::new();
    if self.settings.connectable {
      encoder = encoder.push_flags();
    }
    if self.include_device_name {
      encoder = encoder.push_local_name(&self.device_name);
    }
    if self.include_tx_power_level {
      encoder = encoder.push_tx_power_level(self.settings.tx_power_level.dbm());
    }
    for record in &self.manufacturer_data {
      encoder = encoder.push_manufacturer_data(record.vendor_id, &record.data);
    }

    AdvertisingConfiguration {
      settings: self.settings,
      payload: AdvertisePayload {
        include_device_name: self.include_device_name,
        include_tx_power_level: self.include_tx_power_level,
        device_name: self.device_name,
        manufacturer_data: self.manufacturer_data,
        encoded: encoder.finish(),
      },
      size_limit: self.size_limit,
    }
  }
}

/// Reasons a configuration is refused at build time, before any radio interaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValidationError {
  PayloadTooLarge { encoded_len: usize, limit: usize },
  InvalidVendorId(u16),
  DeviceNameTooLong { len: usize },

  /// A single manufacturer record (vendor id plus data) does not fit one AD structure.
  RecordTooLarge { len: usize },
}

impl Display for ValidationError {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    match self {
      ValidationError::PayloadTooLarge { encoded_len, limit } => {
        write!(f, "Advertisement payload is {encoded_len} bytes, limit is {limit}")
      }
      ValidationError::InvalidVendorId(id) => write!(f, "Vendor id {id:#06x} is reserved"),
      ValidationError::DeviceNameTooLong { len } => {
        write!(f, "Device name is {len} bytes, limit is {MAX_DEVICE_NAME_LEN}")
      }
      ValidationError::RecordTooLarge { len } => {
        write!(f, "Manufacturer record is {len} bytes, limit is {MAX_AD_VALUE_LEN}")
      }
    }
  }
}
