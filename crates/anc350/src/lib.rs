//! Attocube ANC350 piezo controller support.
//!
//! The controller is driven over TCP with the NCore/UC telegram protocol.
//! This crate bundles the layers:
//!
//! - [`transport`]: TCP byte stream with read timeouts and receive discard
//! - [`telegram`]: Telegram codec and the controller's parameter address table
//! - [`controller`]: Transaction engine, axis sessions, poller and simulator

/// Re-export transport types.
pub mod transport {
    pub use anc350_transport::*;
}

/// Re-export telegram types.
pub mod telegram {
    pub use anc350_telegram::*;
}

/// Re-export controller types.
pub mod controller {
    pub use anc350_controller::*;
}
