use alloc::boxed::Box;
use core::cell::Cell;
use core::fmt::{Debug, Formatter};
use core::marker::PhantomData;

use log::{debug, error, info, warn};

use crate::access::{AccessChecker, RadioPermission};
use crate::advertise_cb::{AdvertiseCallback, AdvertiseOutcome, LogOutcome};
use crate::advertise_error::{StartError, StartFailure};
use crate::configuration::AdvertisingConfiguration;
use crate::gap_advertiser::{GapAdvertiser, OutcomeSink};

/// Where the advertising session stands, as far as the controller knows.  The radio is
/// authoritative; this only moves on requests issued and outcomes reported.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
  /// Nothing on air.
  Idle,

  /// Start dispatched, outcome pending.  There is no timeout: a radio that never answers leaves
  /// the session here until [AdvertiseController::stop] is called.
  Starting,

  /// The radio confirmed the broadcast.
  Advertising,

  /// Stop is being issued.  Never observable between calls since stop is not confirmed.
  Stopping,
}

/// What [AdvertiseController::stop] did.  Only [StopOutcome::Stopped] touched the radio.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StopOutcome {
  Stopped,

  /// The advertise permission is not granted so the stop was skipped without reporting an
  /// error.  Unlike a denied start this is deliberately silent, apart from a warning log.
  SuppressedByPermission,

  /// No advertiser was ever handed to the controller.
  AdvertiserUnavailable,

  /// The session was already idle.
  NotActive,
}

/// Single authority over whether the radio is broadcasting, what it broadcasts and how
/// outcomes are reported.
///
/// The controller does no locking of its own.  It is meant to live on one execution context
/// (typically the host's event loop) which issues requests and also feeds platform outcomes
/// back in; the marker field keeps it from being shared across threads by reference.
pub struct AdvertiseController<A, R> {
  access: A,
  advertiser: Option<R>,
  configuration: AdvertisingConfiguration,
  callback: Box<dyn AdvertiseCallback>,
  sink: OutcomeSink,
  active_sink: Option<OutcomeSink>,
  in_flight: usize,
  pending: Option<AdvertisingConfiguration>,
  broadcasting: Option<AdvertisingConfiguration>,
  state: SessionState,
  _single_owner: PhantomData<Cell<()>>,
}

impl<A, R> AdvertiseController<A, R>
where
  A: AccessChecker,
  R: GapAdvertiser,
{
  /// A new controller is idle with the default configuration and a callback that only logs.
  /// `advertiser` is `None` when the host cannot advertise at all.
  pub fn new(access: A, advertiser: Option<R>) -> Self {
    Self {
      access,
      advertiser,
      configuration: AdvertisingConfiguration::default(),
      callback: Box::new(LogOutcome),
      sink: OutcomeSink::first(),
      active_sink: None,
      in_flight: 0,
      pending: None,
      broadcasting: None,
      state: SessionState::Idle,
      _single_owner: PhantomData,
    }
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  /// Configuration the next start will dispatch.
  pub fn configuration(&self) -> &AdvertisingConfiguration {
    &self.configuration
  }

  /// Configuration the radio confirmed it is broadcasting, if any.  Lags behind
  /// [Self::configuration] after a reconfigure until the session is restarted.
  pub fn broadcasting_configuration(&self) -> Option<&AdvertisingConfiguration> {
    self.broadcasting.as_ref()
  }

  pub fn has_advertiser(&self) -> bool {
    self.advertiser.is_some()
  }

  pub fn set_configuration(&mut self, configuration: AdvertisingConfiguration) {
    self.configuration = configuration;
  }

  /// Replace the configuration without touching the radio.  To put it on air call
  /// [Self::stop] and then [Self::start].
  pub fn reconfigure(&mut self, configuration: AdvertisingConfiguration) {
    if self.state != SessionState::Idle {
      debug!("Reconfigured while {:?}, takes effect on next start", self.state);
    }
    self.set_configuration(configuration);
  }

  /// Register the callback for outcomes of future (and still pending) starts.
  pub fn set_callback(&mut self, callback: impl AdvertiseCallback + 'static) {
    self.callback = Box::new(callback);
    self.sink = self.sink.next();
  }

  /// Dispatch a start with the current configuration.  `true` means the request reached the
  /// radio, not that advertising is live; that is only known once the outcome arrives through
  /// the callback.
  pub fn start(&mut self) -> bool {
    self.try_start().is_ok()
  }

  /// Like [Self::start], but says why a request was not dispatched.  A refused start changes
  /// nothing and never invokes the callback.
  pub fn try_start(&mut self) -> Result<(), StartError> {
    self.check_start_access()?;
    let advertiser = self
      .advertiser
      .as_mut()
      .ok_or(StartError::AdvertiserUnavailable)?;

    // Repeated starts go to the radio as well, under the running session's sink so the radio
    // can answer AlreadyStarted instead of opening a second set.
    let sink = match self.state {
      SessionState::Starting | SessionState::Advertising => self.active_sink.unwrap_or(self.sink),
      SessionState::Idle | SessionState::Stopping => self.sink,
    };
    advertiser.begin(
      self.configuration.settings(),
      self.configuration.payload(),
      sink,
    );
    self.in_flight += 1;
    info!(
      "Advertising start dispatched, {} byte payload",
      self.configuration.encoded_len()
    );

    match self.state {
      SessionState::Idle | SessionState::Stopping => {
        self.pending = Some(self.configuration.clone());
        self.active_sink = Some(sink);
        self.state = SessionState::Starting;
      }
      SessionState::Starting | SessionState::Advertising => {
        debug!("Start re-dispatched while {:?}", self.state);
      }
    }
    Ok(())
  }

  /// Record `configuration` and `callback` as current and dispatch a start.  Neither is recorded
  /// when the advertise permission is missing.
  pub fn start_with(
    &mut self,
    configuration: AdvertisingConfiguration,
    callback: impl AdvertiseCallback + 'static,
  ) -> bool {
    if self.check_start_access().is_err() {
      return false;
    }
    self.set_configuration(configuration);
    self.set_callback(callback);
    self.start()
  }

  /// Platform confirmation that the dispatched start is broadcasting.
  pub fn on_platform_start_success(&mut self) {
    self.in_flight = self.in_flight.saturating_sub(1);
    match self.state {
      SessionState::Starting => {
        self.state = SessionState::Advertising;
        self.broadcasting = self.pending.take();
        info!("Advertising confirmed by radio");
      }
      state => debug!("Start success received while {state:?}, state unchanged"),
    }
    self.callback.on_outcome(AdvertiseOutcome::Success);
  }

  /// Platform report that a dispatched start failed with `code`.  The attempt is over; nothing
  /// is retried here.  While other starts of the session are still awaiting their outcome the
  /// session stays in [SessionState::Starting].
  pub fn on_platform_start_failure(&mut self, code: i32) {
    let reason = StartFailure::from(code);
    self.in_flight = self.in_flight.saturating_sub(1);
    match self.state {
      SessionState::Starting if self.in_flight > 0 => {
        debug!("Start failed ({reason}), {} more pending", self.in_flight);
      }
      SessionState::Starting => {
        self.state = SessionState::Idle;
        self.pending = None;
        self.active_sink = None;
        debug!("Start failed ({reason}), back to idle");
      }
      state => debug!("Start failure ({reason}) received while {state:?}, state unchanged"),
    }
    self.callback.on_outcome(AdvertiseOutcome::Failure(reason));
  }

  /// Stop advertising.  Fire and forget: the session is idle afterwards whatever the radio
  /// makes of the request.
  pub fn stop(&mut self) -> StopOutcome {
    if !self.access.is_granted(RadioPermission::Advertise) {
      warn!("StopSuppressedByPermission: advertise permission denied, stop not issued");
      return StopOutcome::SuppressedByPermission;
    }
    let Some(advertiser) = self.advertiser.as_mut() else {
      debug!("Stop without an advertiser");
      return StopOutcome::AdvertiserUnavailable;
    };
    if self.state == SessionState::Idle {
      debug!("Stop while idle");
      return StopOutcome::NotActive;
    }

    let sink = self.active_sink.take().unwrap_or(self.sink);
    self.in_flight = 0;
    self.state = SessionState::Stopping;
    advertiser.end(sink);
    self.state = SessionState::Idle;
    self.pending = None;
    self.broadcasting = None;
    info!("Advertising stopped");
    StopOutcome::Stopped
  }

  fn check_start_access(&self) -> Result<(), StartError> {
    if self.access.is_granted(RadioPermission::Advertise) {
      Ok(())
    } else {
      error!("Advertise permission denied, start not dispatched");
      Err(StartError::PermissionDenied)
    }
  }
}

impl<A, R: Debug> Debug for AdvertiseController<A, R> {
  fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("AdvertiseController")
      .field("advertiser", &self.advertiser)
      .field("configuration", &self.configuration)
      .field("sink", &self.sink)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  extern crate std;

  use alloc::rc::Rc;
  use alloc::vec;
  use alloc::vec::Vec;
  use core::cell::RefCell;

  use super::*;
  use crate::advertisement::{AdvertisingSizeLimit, EncodedPayload};
  use crate::configuration::ValidationError;

  #[derive(Debug, Clone, PartialEq, Eq)]
  enum RadioCall {
    Begin { payload: EncodedPayload, sink: OutcomeSink },
    End { sink: OutcomeSink },
  }

  #[derive(Debug, Clone, Default)]
  struct FakeRadio {
    calls: Rc<RefCell<Vec<RadioCall>>>,
  }

  impl GapAdvertiser for FakeRadio {
    fn begin(
      &mut self,
      _settings: &crate::configuration::AdvertiseSettings,
      payload: &crate::configuration::AdvertisePayload,
      sink: OutcomeSink,
    ) {
      self.calls.borrow_mut().push(RadioCall::Begin {
        payload: payload.encoded().clone(),
        sink,
      });
    }

    fn end(&mut self, sink: OutcomeSink) {
      self.calls.borrow_mut().push(RadioCall::End { sink });
    }
  }

  #[derive(Clone)]
  struct Grant(Rc<Cell<bool>>);

  impl AccessChecker for Grant {
    fn is_granted(&self, permission: RadioPermission) -> bool {
      permission == RadioPermission::Advertise && self.0.get()
    }
  }

  struct Harness {
    controller: AdvertiseController<Grant, FakeRadio>,
    granted: Rc<Cell<bool>>,
    calls: Rc<RefCell<Vec<RadioCall>>>,
    outcomes: Rc<RefCell<Vec<AdvertiseOutcome>>>,
  }

  impl Harness {
    fn new(granted: bool) -> Self {
      let granted = Rc::new(Cell::new(granted));
      let radio = FakeRadio::default();
      let calls = radio.calls.clone();
      let mut controller = AdvertiseController::new(Grant(granted.clone()), Some(radio));
      let outcomes = Rc::new(RefCell::new(Vec::new()));
      controller.set_callback(recorder(&outcomes));
      Self {
        controller,
        granted,
        calls,
        outcomes,
      }
    }

    fn advertising(config: AdvertisingConfiguration) -> Self {
      let mut harness = Self::new(true);
      harness.controller.set_configuration(config);
      assert!(harness.controller.start());
      harness.controller.on_platform_start_success();
      harness.calls.borrow_mut().clear();
      harness.outcomes.borrow_mut().clear();
      harness
    }

    fn calls(&self) -> Vec<RadioCall> {
      self.calls.borrow().clone()
    }

    fn outcomes(&self) -> Vec<AdvertiseOutcome> {
      self.outcomes.borrow().clone()
    }
  }

  fn recorder(outcomes: &Rc<RefCell<Vec<AdvertiseOutcome>>>) -> impl FnMut(AdvertiseOutcome) {
    let outcomes = outcomes.clone();
    move |outcome: AdvertiseOutcome| outcomes.borrow_mut().push(outcome)
  }

  fn config_with(data: &[u8]) -> AdvertisingConfiguration {
    AdvertisingConfiguration::builder()
      .push_manufacturer_data(100, data)
      .unwrap()
      .build()
      .unwrap()
  }

  #[test]
  pub fn test_new_controller_is_idle() {
    let harness = Harness::new(true);

    assert_eq!(harness.controller.state(), SessionState::Idle);
    assert_eq!(
      harness.controller.configuration(),
      &AdvertisingConfiguration::default()
    );
    assert!(harness.controller.broadcasting_configuration().is_none());
    assert!(harness.calls().is_empty());
  }

  #[test]
  pub fn test_oversized_payload_leaves_controller_untouched() {
    let mut harness = Harness::new(true);
    let before = harness.controller.configuration().clone();

    let result = AdvertisingConfiguration::builder()
      .size_limit(AdvertisingSizeLimit::Legacy)
      .push_manufacturer_data(100, &[0xaa; 32])
      .unwrap()
      .build();
    if let Ok(config) = result.clone() {
      harness.controller.set_configuration(config);
    }

    assert!(matches!(result, Err(ValidationError::PayloadTooLarge { .. })));
    assert_eq!(harness.controller.configuration(), &before);
    assert_eq!(harness.controller.state(), SessionState::Idle);
    assert!(harness.calls().is_empty());
  }

  #[test]
  pub fn test_start_denied() {
    let mut harness = Harness::new(false);

    assert!(!harness.controller.start());
    assert_eq!(harness.controller.try_start(), Err(StartError::PermissionDenied));
    assert_eq!(harness.controller.state(), SessionState::Idle);
    assert!(harness.calls().is_empty());
    assert!(harness.outcomes().is_empty());
  }

  #[test]
  pub fn test_start_then_success() {
    let mut harness = Harness::new(true);
    let config = config_with(b"Hello world!");
    harness.controller.set_configuration(config.clone());

    assert!(harness.controller.start());
    assert_eq!(harness.controller.state(), SessionState::Starting);
    assert!(harness.outcomes().is_empty());
    assert_eq!(harness.calls().len(), 1);

    harness.controller.on_platform_start_success();

    assert_eq!(harness.controller.state(), SessionState::Advertising);
    assert_eq!(harness.outcomes(), vec![AdvertiseOutcome::Success]);
    assert_eq!(harness.controller.broadcasting_configuration(), Some(&config));
  }

  #[test]
  pub fn test_start_failure_already_started() {
    let mut harness = Harness::new(true);

    assert!(harness.controller.start());
    assert_eq!(harness.controller.state(), SessionState::Starting);

    harness
      .controller
      .on_platform_start_failure(StartFailure::AlreadyStarted.into());

    assert_eq!(harness.controller.state(), SessionState::Idle);
    assert_eq!(
      harness.outcomes(),
      vec![AdvertiseOutcome::Failure(StartFailure::AlreadyStarted)]
    );
  }

  #[test]
  pub fn test_failure_is_not_retried() {
    let mut harness = Harness::new(true);

    assert!(harness.controller.start());
    harness
      .controller
      .on_platform_start_failure(StartFailure::TooManyAdvertisers.into());

    assert_eq!(harness.calls().len(), 1);
    assert_eq!(harness.controller.state(), SessionState::Idle);

    // The caller decides to try again.
    assert!(harness.controller.start());
    assert_eq!(harness.calls().len(), 2);
    assert_eq!(harness.controller.state(), SessionState::Starting);
  }

  #[test]
  pub fn test_unknown_failure_code() {
    let mut harness = Harness::new(true);

    assert!(harness.controller.start());
    harness.controller.on_platform_start_failure(17);

    assert_eq!(
      harness.outcomes(),
      vec![AdvertiseOutcome::Failure(StartFailure::Unknown(17))]
    );
  }

  #[test]
  pub fn test_start_while_advertising_is_dispatched() {
    let mut harness = Harness::advertising(config_with(b"old"));

    assert!(harness.controller.start());
    assert_eq!(harness.calls().len(), 1);
    assert_eq!(harness.controller.state(), SessionState::Advertising);

    harness
      .controller
      .on_platform_start_failure(StartFailure::AlreadyStarted.into());

    assert_eq!(harness.controller.state(), SessionState::Advertising);
    assert_eq!(
      harness.outcomes(),
      vec![AdvertiseOutcome::Failure(StartFailure::AlreadyStarted)]
    );
  }

  #[test]
  pub fn test_start_while_starting_keeps_first_attempt() {
    let mut harness = Harness::new(true);

    assert!(harness.controller.start());
    assert!(harness.controller.start());
    assert_eq!(harness.controller.state(), SessionState::Starting);
    match &harness.calls()[..] {
      [RadioCall::Begin { sink: first, .. }, RadioCall::Begin { sink: second, .. }] => {
        assert_eq!(first, second)
      }
      calls => panic!("unexpected radio calls: {calls:?}"),
    }

    // The redundant request is refused before the first one is confirmed.
    harness
      .controller
      .on_platform_start_failure(StartFailure::AlreadyStarted.into());
    assert_eq!(harness.controller.state(), SessionState::Starting);

    harness.controller.on_platform_start_success();
    assert_eq!(harness.controller.state(), SessionState::Advertising);
    assert_eq!(
      harness.outcomes(),
      vec![
        AdvertiseOutcome::Failure(StartFailure::AlreadyStarted),
        AdvertiseOutcome::Success
      ]
    );

    assert_eq!(harness.controller.stop(), StopOutcome::Stopped);
    assert!(matches!(harness.calls().last(), Some(RadioCall::End { .. })));
  }

  #[test]
  pub fn test_idle_once_every_pending_start_failed() {
    let mut harness = Harness::new(true);

    assert!(harness.controller.start());
    assert!(harness.controller.start());
    harness
      .controller
      .on_platform_start_failure(StartFailure::AlreadyStarted.into());
    harness
      .controller
      .on_platform_start_failure(StartFailure::InternalError.into());

    assert_eq!(harness.controller.state(), SessionState::Idle);
    assert_eq!(harness.controller.stop(), StopOutcome::NotActive);
  }

  #[test]
  pub fn test_redispatch_after_callback_change_uses_running_sink() {
    let mut harness = Harness::advertising(config_with(b"on air"));
    let replacement = Rc::new(RefCell::new(Vec::new()));
    harness.controller.set_callback(recorder(&replacement));

    assert!(harness.controller.start());
    assert_eq!(harness.controller.stop(), StopOutcome::Stopped);

    match &harness.calls()[..] {
      [RadioCall::Begin { sink: began, .. }, RadioCall::End { sink: ended }] => {
        assert_eq!(began, ended)
      }
      calls => panic!("unexpected radio calls: {calls:?}"),
    }
  }

  #[test]
  pub fn test_stop_while_idle_is_noop() {
    let mut harness = Harness::new(true);

    assert_eq!(harness.controller.stop(), StopOutcome::NotActive);
    assert_eq!(harness.controller.stop(), StopOutcome::NotActive);
    assert_eq!(harness.controller.state(), SessionState::Idle);
    assert!(harness.calls().is_empty());
  }

  #[test]
  pub fn test_stop_after_advertising() {
    let mut harness = Harness::advertising(config_with(b"on air"));

    assert_eq!(harness.controller.stop(), StopOutcome::Stopped);

    assert_eq!(harness.controller.state(), SessionState::Idle);
    assert!(harness.controller.broadcasting_configuration().is_none());
    assert!(matches!(harness.calls()[..], [RadioCall::End { .. }]));
    assert!(harness.outcomes().is_empty());
  }

  #[test]
  pub fn test_stop_suppressed_by_permission() {
    let mut harness = Harness::advertising(config_with(b"on air"));
    harness.granted.set(false);

    assert_eq!(harness.controller.stop(), StopOutcome::SuppressedByPermission);
    assert_eq!(harness.controller.stop(), StopOutcome::SuppressedByPermission);

    assert_eq!(harness.controller.state(), SessionState::Advertising);
    assert!(harness.calls().is_empty());
  }

  #[test]
  pub fn test_stop_while_starting() {
    let mut harness = Harness::new(true);
    assert!(harness.controller.start());

    assert_eq!(harness.controller.stop(), StopOutcome::Stopped);
    assert_eq!(harness.controller.state(), SessionState::Idle);

    // A confirmation that raced the stop is still reported but does not revive the session.
    harness.controller.on_platform_start_success();
    assert_eq!(harness.controller.state(), SessionState::Idle);
    assert!(harness.controller.broadcasting_configuration().is_none());
    assert_eq!(harness.outcomes(), vec![AdvertiseOutcome::Success]);
  }

  #[test]
  pub fn test_reconfigure_takes_effect_after_restart() {
    let old = config_with(b"old");
    let new = config_with(b"new");
    let mut harness = Harness::advertising(old.clone());

    harness.controller.reconfigure(new.clone());

    assert_eq!(harness.controller.state(), SessionState::Advertising);
    assert_eq!(harness.controller.broadcasting_configuration(), Some(&old));
    assert_eq!(harness.controller.configuration(), &new);
    assert!(harness.calls().is_empty());

    assert_eq!(harness.controller.stop(), StopOutcome::Stopped);
    assert!(harness.controller.start());
    harness.controller.on_platform_start_success();

    assert_eq!(harness.controller.broadcasting_configuration(), Some(&new));
    match &harness.calls()[..] {
      [RadioCall::End { .. }, RadioCall::Begin { payload, .. }] => {
        assert_eq!(payload, new.payload().encoded())
      }
      calls => panic!("unexpected radio calls: {calls:?}"),
    }
  }

  #[test]
  pub fn test_no_advertiser() {
    let granted = Rc::new(Cell::new(true));
    let mut controller: AdvertiseController<Grant, FakeRadio> =
      AdvertiseController::new(Grant(granted), None);

    assert!(!controller.has_advertiser());
    assert_eq!(controller.try_start(), Err(StartError::AdvertiserUnavailable));
    assert_eq!(controller.stop(), StopOutcome::AdvertiserUnavailable);
    assert_eq!(controller.state(), SessionState::Idle);
  }

  #[test]
  pub fn test_start_with_denied_records_nothing() {
    let mut harness = Harness::new(false);
    let other = Rc::new(RefCell::new(Vec::new()));

    assert!(!harness.controller.start_with(config_with(b"new"), recorder(&other)));

    assert_eq!(
      harness.controller.configuration(),
      &AdvertisingConfiguration::default()
    );
    harness.granted.set(true);
    assert!(harness.controller.start());
    harness.controller.on_platform_start_success();
    assert_eq!(harness.outcomes(), vec![AdvertiseOutcome::Success]);
    assert!(other.borrow().is_empty());
  }

  #[test]
  pub fn test_start_with_records_config_and_callback() {
    let mut harness = Harness::new(true);
    let other = Rc::new(RefCell::new(Vec::new()));
    let config = config_with(b"fresh");

    assert!(harness.controller.start_with(config.clone(), recorder(&other)));
    harness.controller.on_platform_start_success();

    assert_eq!(harness.controller.broadcasting_configuration(), Some(&config));
    assert_eq!(*other.borrow(), vec![AdvertiseOutcome::Success]);
    assert!(harness.outcomes().is_empty());
  }

  #[test]
  pub fn test_stop_uses_sink_of_running_session() {
    let mut harness = Harness::new(true);
    assert!(harness.controller.start());
    harness.controller.on_platform_start_success();

    let replacement = Rc::new(RefCell::new(Vec::new()));
    harness.controller.set_callback(recorder(&replacement));
    assert_eq!(harness.controller.stop(), StopOutcome::Stopped);

    match &harness.calls()[..] {
      [RadioCall::Begin { sink: began, .. }, RadioCall::End { sink: ended }] => {
        assert_eq!(began, ended)
      }
      calls => panic!("unexpected radio calls: {calls:?}"),
    }
  }

  #[test]
  pub fn test_outcome_goes_to_current_callback() {
    let mut harness = Harness::new(true);
    assert!(harness.controller.start());

    let replacement = Rc::new(RefCell::new(Vec::new()));
    harness.controller.set_callback(recorder(&replacement));
    harness.controller.on_platform_start_success();

    assert!(harness.outcomes().is_empty());
    assert_eq!(*replacement.borrow(), vec![AdvertiseOutcome::Success]);
  }
}
