use crate::{BusInfo, CanBus, CanFilter, CanFrame, Result, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockQueues {
    rx: VecDeque<CanFrame>,
    tx: Vec<CanFrame>,
    tx_capacity: Option<usize>,
}

/// An in-process mock bus. Frames injected through a [`MockBusHandle`] are
/// delivered by `recv`/`try_recv` (subject to the acceptance filters), and
/// every sent frame is captured for inspection.
pub struct MockBus {
    name: String,
    filters: Vec<CanFilter>,
    queues: Arc<Mutex<MockQueues>>,
}

/// Test-side view of a [`MockBus`]; cloneable and usable while the bus is owned elsewhere.
#[derive(Clone)]
pub struct MockBusHandle {
    queues: Arc<Mutex<MockQueues>>,
}

impl MockBus {
    pub fn handle(&self) -> MockBusHandle {
        MockBusHandle {
            queues: Arc::clone(&self.queues),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, frame: &CanFrame) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(frame.id))
    }
}

impl MockBusHandle {
    /// Queue a frame for the bus to receive.
    pub fn inject(&self, frame: CanFrame) -> Result<()> {
        let mut q = lock(&self.queues)?;
        q.rx.push_back(frame);
        Ok(())
    }

    /// Take every frame sent so far.
    pub fn take_sent(&self) -> Result<Vec<CanFrame>> {
        let mut q = lock(&self.queues)?;
        Ok(std::mem::take(&mut q.tx))
    }

    /// Limit the number of captured, untaken frames; further sends fail with `BusFull`.
    pub fn set_tx_capacity(&self, capacity: Option<usize>) -> Result<()> {
        let mut q = lock(&self.queues)?;
        q.tx_capacity = capacity;
        Ok(())
    }

    pub fn pending_rx(&self) -> Result<usize> {
        Ok(lock(&self.queues)?.rx.len())
    }
}

fn lock(queues: &Mutex<MockQueues>) -> Result<std::sync::MutexGuard<'_, MockQueues>> {
    queues
        .lock()
        .map_err(|_| TransportError::Io("mock bus lock poisoned".to_string()))
}

impl CanBus for MockBus {
    fn open(name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            filters: Vec::new(),
            queues: Arc::new(Mutex::new(MockQueues::default())),
        })
    }

    fn list() -> Result<Vec<BusInfo>> {
        Ok(vec![BusInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn set_filters(&mut self, filters: &[CanFilter]) -> Result<()> {
        self.filters = filters.to_vec();
        Ok(())
    }

    fn recv(&mut self, _timeout_ms: Option<u64>) -> Result<CanFrame> {
        // Nothing arrives while we wait, so any timeout ends the same way.
        self.try_recv()?.ok_or(TransportError::Timeout)
    }

    fn try_recv(&mut self) -> Result<Option<CanFrame>> {
        let mut q = lock(&self.queues)?;
        while let Some(frame) = q.rx.pop_front() {
            if self.accepts(&frame) {
                return Ok(Some(frame.stamped_now()));
            }
            tracing::trace!(bus = %self.name, id = %frame.id, "mock bus filtered frame");
        }
        Ok(None)
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        let mut q = lock(&self.queues)?;
        if let Some(cap) = q.tx_capacity {
            if q.tx.len() >= cap {
                return Err(TransportError::BusFull);
            }
        }
        q.tx.push(frame.clone());
        Ok(())
    }
}
