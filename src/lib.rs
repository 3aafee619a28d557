#![no_std]

extern crate alloc;

pub mod access;
pub mod advertise_cb;
pub mod advertise_error;
pub mod advertisement;
pub mod configuration;
pub mod controller;
pub mod gap_advertiser;

pub mod prelude {
  pub use crate::access::*;
  pub use crate::advertise_cb::*;
  pub use crate::advertise_error::*;
  pub use crate::advertisement::*;
  pub use crate::configuration::*;
  pub use crate::controller::*;
  pub use crate::gap_advertiser::*;
}
