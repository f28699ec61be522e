//! Byte-stream transport for the ANC350 controller link.
//!
//! The controller speaks its telegram protocol over a plain TCP stream that
//! is reliable and ordered but not message-framed. This is the lowest layer:
//! it connects, applies read/write timeouts, and can drop whatever is sitting
//! in the receive buffer. Everything else builds on the [`Transport`] trait.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::TcpEndpoint;
pub use traits::{ControllerStream, Transport};
