use log::{error, info};

use crate::advertise_error::StartFailure;

/// Receives the asynchronous outcome of each dispatched start.  Whatever callback is registered
/// on the controller when the outcome arrives is the one invoked.
pub trait AdvertiseCallback {
  fn on_outcome(&mut self, outcome: AdvertiseOutcome);
}

impl<F> AdvertiseCallback for F
where
  F: FnMut(AdvertiseOutcome),
{
  fn on_outcome(&mut self, outcome: AdvertiseOutcome) {
    (self)(outcome)
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdvertiseOutcome {
  /// The radio confirmed it is broadcasting.
  Success,

  /// The radio refused the start.  See [StartFailure] for which reasons are worth retrying.
  Failure(StartFailure),
}

/// Callback a controller starts with.  It only logs, leaving presentation to whoever registers
/// a real one.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogOutcome;

impl AdvertiseCallback for LogOutcome {
  fn on_outcome(&mut self, outcome: AdvertiseOutcome) {
    match outcome {
      AdvertiseOutcome::Success => info!("Advertising started"),
      AdvertiseOutcome::Failure(reason) => {
        error!("Advertising failed, code: {}, reason: {reason}", i32::from(reason))
      }
    }
  }
}
