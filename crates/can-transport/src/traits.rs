use crate::{BusInfo, CanFilter, CanFrame, Result, TransportError};

/// A minimal CAN bus interface.
pub trait CanBus {
    /// Open a CAN interface by name (e.g., "can0", "mock0").
    fn open(name: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available interfaces for this backend.
    fn list() -> Result<Vec<BusInfo>>;

    /// Set acceptance filters if supported.
    fn set_filters(&mut self, _filters: &[CanFilter]) -> Result<()> {
        Err(TransportError::Unsupported("filters not supported"))
    }

    /// Receive one frame (blocking with optional timeout in milliseconds).
    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<CanFrame>;

    /// Non-blocking poll: `Ok(None)` when nothing is pending.
    fn try_recv(&mut self) -> Result<Option<CanFrame>> {
        match self.recv(Some(0)) {
            Ok(frame) => Ok(Some(frame)),
            Err(TransportError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Send one frame.
    fn send(&mut self, frame: &CanFrame) -> Result<()>;
}
