//! Gateway core for tether.
//!
//! Turns one blocking call from the boundary into one asynchronous capability
//! invocation and back:
//!
//! - [`gateway`] decodes raw call arguments, consults the availability gate,
//!   and shapes the [`Reply`].
//! - [`dispatcher`] runs the capability on a dedicated tokio runtime and blocks
//!   the caller on a single-use completion channel.
//! - [`transfer`] hands the reply's one owned string to the receiving side.
//!
//! Nothing here knows about raw pointers; the `extern "C"` surface lives in
//! `tether-abi`.

pub mod dispatcher;
pub mod errors;
mod gate;
pub mod gateway;
pub mod transfer;

pub use dispatcher::Dispatcher;
pub use errors::GatewayError;
pub use gate::AvailabilityGate;
pub use gateway::{Gateway, GatewayBuilder, RawCall};
pub use transfer::{Delivered, Reply, Transfer};
