use crate::configuration::{AdvertisePayload, AdvertiseSettings};

/// The platform's broadcast primitive.  Exclusively owned by
/// [crate::controller::AdvertiseController]; nothing else should hold a way to drive it.
pub trait GapAdvertiser {
  /// Request that BLE advertising begins.  This must not block: the outcome is reported later by
  /// whoever drives the platform event loop, through
  /// [crate::controller::AdvertiseController::on_platform_start_success] or
  /// [crate::controller::AdvertiseController::on_platform_start_failure].
  ///
  /// Implementations should not filter repeated requests themselves.  If the radio is already
  /// broadcasting, report [crate::advertise_error::StartFailure::AlreadyStarted].
  fn begin(&mut self, settings: &AdvertiseSettings, payload: &AdvertisePayload, sink: OutcomeSink);

  /// Request that the advertisement started with `sink` is stopped.  There is no confirmation.
  fn end(&mut self, sink: OutcomeSink);
}

/// Identifies the callback registration a start was dispatched under, so the platform can tell
/// advertising sets apart.  `end` is always issued with the sink the running session began with.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutcomeSink(u32);

impl OutcomeSink {
  pub(crate) fn first() -> Self {
    Self(0)
  }

  pub(crate) fn next(self) -> Self {
    Self(self.0.wrapping_add(1))
  }

  pub fn id(&self) -> u32 {
    self.0
  }
}
