use core::fmt::{Display, Formatter};

/// Platform-reported reasons an advertising start did not take effect.  Delivered only through
/// [crate::advertise_cb::AdvertiseCallback], never retried by the controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StartFailure {
  /// Encoded payload is larger than the radio accepts.  Shrink the payload and start again.
  DataTooLarge,

  /// Every advertising instance of the radio is in use.
  TooManyAdvertisers,

  /// An advertisement is already running for this session.
  AlreadyStarted,

  InternalError,

  /// The radio or its driver cannot advertise at all (or not with these settings).
  FeatureUnsupported,

  /// Code outside the known set, kept verbatim.
  Unknown(i32),
}

impl From<i32> for StartFailure {
  fn from(value: i32) -> Self {
    match value {
      1 => StartFailure::DataTooLarge,
      2 => StartFailure::TooManyAdvertisers,
      3 => StartFailure::AlreadyStarted,
      4 => StartFailure::InternalError,
      5 => StartFailure::FeatureUnsupported,
      o => StartFailure::Unknown(o),
    }
  }
}

impl From<StartFailure> for i32 {
  fn from(value: StartFailure) -> Self {
    match value {
      StartFailure::DataTooLarge => 1,
      StartFailure::TooManyAdvertisers => 2,
      StartFailure::AlreadyStarted => 3,
      StartFailure::InternalError => 4,
      StartFailure::FeatureUnsupported => 5,
      StartFailure::Unknown(o) => o,
    }
  }
}

impl Display for StartFailure {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    match self {
      StartFailure::DataTooLarge => write!(f, "Data is too large"),
      StartFailure::TooManyAdvertisers => write!(f, "Too many advertisers"),
      StartFailure::AlreadyStarted => write!(f, "Already started"),
      StartFailure::InternalError => write!(f, "Internal error"),
      StartFailure::FeatureUnsupported => write!(f, "Feature unsupported"),
      StartFailure::Unknown(code) => write!(f, "Unknown error (code {code})"),
    }
  }
}

/// Synchronous refusal to dispatch a start.  Nothing reached the radio and no callback will fire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StartError {
  /// The advertise permission is not granted.
  PermissionDenied,

  /// The host has no advertiser (radio off or advertising unsupported).
  AdvertiserUnavailable,
}

impl Display for StartError {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    match self {
      StartError::PermissionDenied => write!(f, "Advertise permission denied"),
      StartError::AdvertiserUnavailable => write!(f, "No advertiser available"),
    }
  }
}
