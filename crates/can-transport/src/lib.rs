//! can-transport: CAN bus abstractions for the arm nodes
//!
//! Traits and types for talking to a Controller Area Network (CAN) interface. The default
//! build enables an in-process `mock` backend so the node and its tests run on any host.

mod types;
pub use types::{BusInfo, CanFilter, CanFrame, CanId, Timestamp, MAX_STANDARD_ID};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::CanBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBus, MockBusHandle};
