//! Drives an [AdvertiseController] against a simulated radio the way a host shell would: check
//! permissions, start, restart with a new payload, stop.
//!
//! Run with `RUST_LOG=debug cargo run --example advertise_shell` to see the controller's logs.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ble_advertiser::prelude::*;
use log::info;

const VENDOR_ID: u16 = 100;

/// Outcomes the simulated radio will report on the next turn of the event loop.
type OutcomeQueue = Rc<RefCell<VecDeque<Result<(), StartFailure>>>>;

#[derive(Debug)]
struct SimulatedRadio {
  outcomes: OutcomeQueue,
  running: Option<OutcomeSink>,
}

impl GapAdvertiser for SimulatedRadio {
  fn begin(&mut self, settings: &AdvertiseSettings, payload: &AdvertisePayload, sink: OutcomeSink) {
    info!(
      "radio: begin {:?} at {} dBm, {} byte payload",
      settings.mode,
      settings.tx_power_level.dbm(),
      payload.encoded().len()
    );
    let outcome = if self.running.is_some() {
      Err(StartFailure::AlreadyStarted)
    } else {
      self.running = Some(sink);
      Ok(())
    };
    self.outcomes.borrow_mut().push_back(outcome);
  }

  fn end(&mut self, sink: OutcomeSink) {
    info!("radio: end sink {}", sink.id());
    if self.running == Some(sink) {
      self.running = None;
    }
  }
}

fn pump<A: AccessChecker>(
  controller: &mut AdvertiseController<A, SimulatedRadio>,
  outcomes: &OutcomeQueue,
) {
  loop {
    let next = outcomes.borrow_mut().pop_front();
    match next {
      Some(Ok(())) => controller.on_platform_start_success(),
      Some(Err(reason)) => controller.on_platform_start_failure(reason.into()),
      None => break,
    }
  }
}

fn main() -> Result<(), ValidationError> {
  env_logger::init();

  let granted = REQUIRED_PERMISSIONS;
  let checker = move |p: RadioPermission| granted.contains(p);
  let missing = missing_permissions(&checker, REQUIRED_PERMISSIONS);
  if !missing.is_empty() {
    println!("Would ask the user for {missing:?}");
    return Ok(());
  }

  let outcomes = OutcomeQueue::default();
  let radio = SimulatedRadio {
    outcomes: outcomes.clone(),
    running: None,
  };
  let mut controller = AdvertiseController::new(checker, Some(radio));
  controller.set_callback(|outcome: AdvertiseOutcome| match outcome {
    AdvertiseOutcome::Success => println!("Advertising"),
    AdvertiseOutcome::Failure(reason) => println!("Advertising failed: {reason}"),
  });

  let hello = AdvertisingConfiguration::builder()
    .mode(AdvertiseMode::LowLatency)
    .tx_power_level(TxPowerLevel::High)
    .device_name("demo")?
    .push_manufacturer_data(VENDOR_ID, b"Hello world!")?
    .build()?;
  controller.set_configuration(hello);
  println!("start dispatched: {}", controller.start());
  pump(&mut controller, &outcomes);

  // A second start is passed through and the radio refuses it.
  println!("start dispatched: {}", controller.start());
  pump(&mut controller, &outcomes);

  if let Err(e) = AdvertisingConfiguration::builder()
    .push_manufacturer_data(VENDOR_ID, &[0x55; 40])?
    .build()
  {
    println!("Rejected configuration: {e}");
  }

  let goodbye = AdvertisingConfiguration::builder()
    .mode(AdvertiseMode::Balanced)
    .push_manufacturer_data(VENDOR_ID, b"Goodbye!")?
    .build()?;
  controller.reconfigure(goodbye);
  println!("stop: {:?}", controller.stop());
  println!("start dispatched: {}", controller.start());
  pump(&mut controller, &outcomes);
  println!("state: {:?}", controller.state());

  println!("stop: {:?}", controller.stop());
  println!("stop: {:?}", controller.stop());
  Ok(())
}
