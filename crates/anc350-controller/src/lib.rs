//! Transaction engine and axis sessions for the ANC350 piezo controller.
//!
//! A [`Controller`] owns one connection to the controller and the state of
//! its axes. Callers issue blocking get/set and motion commands on any
//! thread; a [`Poller`] keeps the axis statuses fresh in the background and
//! publishes them to [`StatusSink`]s.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use anc350_controller::{Controller, ControllerConfig, Poller};
//!
//! # fn main() -> anc350_controller::Result<()> {
//! let controller = Arc::new(Controller::connect("192.168.1.2:2101", ControllerConfig::default())?);
//! controller.subscribe(|status: &anc350_controller::AxisStatus| {
//!     println!("axis {} at {}", status.axis, status.position);
//! });
//! let poller = Poller::spawn(Arc::clone(&controller))?;
//! controller.move_to(0, 150_000, false)?;
//! # poller.stop();
//! # Ok(())
//! # }
//! ```

pub mod axis;
pub mod config;
pub mod controller;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod health;
pub mod poller;
pub mod sim;

pub use axis::{AxisStatus, StatusFlags, DIRECTION_DEADBAND};
pub use config::{ControllerConfig, EngineConfig, HealthConfig, PollerConfig, MAX_AXES};
pub use controller::Controller;
pub use correlation::{CorrelationAllocator, MAX_CORRELATION};
pub use engine::TransactionEngine;
pub use error::{ControllerError, Result};
pub use health::CommHealth;
pub use poller::{poll_cycle, PollSchedule, PollSignal, Poller, StatusSink, Wake};
pub use sim::{Fault, SimLink, Simulator};
