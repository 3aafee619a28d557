use alloc::vec::Vec;
use core::ops::Deref;

/// Largest payload a legacy (Bluetooth 4.x) advertising PDU can carry.
pub const LEGACY_ADVERTISEMENT_LEN: usize = 31;

/// Largest total advertising data length allowed with extended advertising.
pub const MAX_EXTENDED_ADVERTISEMENT_LEN: usize = 1650;

/// Largest value a single AD structure can carry (the length byte also counts the type).
pub const MAX_AD_VALUE_LEN: usize = u8::MAX as usize - 1;

/// How much room the advertisement payload is allowed to take.  Platforms that
/// support extended advertising report a larger cap, otherwise the legacy 31 bytes apply.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdvertisingSizeLimit {
  #[default]
  Legacy,
  Extended,

  /// Platform-reported cap, clamped to [MAX_EXTENDED_ADVERTISEMENT_LEN].
  Custom(usize),
}

impl AdvertisingSizeLimit {
  pub fn bytes(&self) -> usize {
    match *self {
      AdvertisingSizeLimit::Legacy => LEGACY_ADVERTISEMENT_LEN,
      AdvertisingSizeLimit::Extended => MAX_EXTENDED_ADVERTISEMENT_LEN,
      AdvertisingSizeLimit::Custom(n) => n.min(MAX_EXTENDED_ADVERTISEMENT_LEN),
    }
  }
}

/// Writes AD structures (length, type, value) back to back.  Callers bound every value to
/// [MAX_AD_VALUE_LEN] beforehand and compare [PayloadEncoder::len] against their size cap once
/// everything has been pushed, so the full overshoot can be reported.
#[derive(Debug, Default, Clone)]
pub(crate) struct PayloadEncoder {
  raw: Vec<u8>,
}

impl PayloadEncoder {
  pub fn new() -> Self {
    Default::default()
  }

  /// Flags record advertising LE general discoverability without BR/EDR support.  Only
  /// connectable advertisements carry it.
  pub fn push_flags(self) -> Self {
    self.push_raw_ad_type(
      AdType::Flags as _,
      &[DISCOVER_MODE_GENERAL | CLASSIC_NOT_SUPPORTED_MASK],
    )
  }

  pub fn push_manufacturer_data(mut self, manufacturer_id: u16, data: &[u8]) -> Self {
    self = self.push_start_record(AdType::ManufacturerData as _, 2 + data.len());
    self.raw.extend_from_slice(&manufacturer_id.to_le_bytes());
    self.raw.extend_from_slice(data);
    self
  }

  pub fn push_local_name(self, name: &str) -> Self {
    self.push_raw_ad_type(AdType::LongLocalName as _, name.as_bytes())
  }

  pub fn push_tx_power_level(self, dbm: i8) -> Self {
    self.push_raw_ad_type(AdType::TxPowerLevel as _, &dbm.to_le_bytes())
  }

  pub fn push_raw_ad_type(mut self, ad_type: u8, data: &[u8]) -> Self {
    self = self.push_start_record(ad_type, data.len());
    self.raw.extend_from_slice(data);
    self
  }

  fn push_start_record(mut self, ad_type: u8, remaining_size: usize) -> Self {
    debug_assert!(remaining_size <= MAX_AD_VALUE_LEN);
    let length = u8::try_from(remaining_size + 1).unwrap_or(u8::MAX);
    self.raw.push(length);
    self.raw.push(ad_type);
    self
  }

  pub fn len(&self) -> usize {
    self.raw.len()
  }

  pub fn finish(self) -> EncodedPayload {
    EncodedPayload(self.raw)
  }
}

/// Advertisements consist of one or more ad type units in a TLV-style format (but actually it's
/// LTV).  Only the types this crate emits are listed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum AdType {
  Flags = 0x01,
  LongLocalName = 0x09,
  TxPowerLevel = 0x0a,
  ManufacturerData = 0xff,
}

const DISCOVER_MODE_GENERAL: u8 = 0b0000_0010;
const CLASSIC_NOT_SUPPORTED_MASK: u8 = 0b0000_0100;

/// The encoded advertisement payload handed to the radio.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EncodedPayload(Vec<u8>);

impl Deref for EncodedPayload {
  type Target = [u8];

  fn deref(&self) -> &Self::Target {
    &self.0
  }
}
