//! Mock construction helpers

use dataflow_rt::dataflow::{BusDriver, InterfaceKind};
use dataflow_rt::{Component, DataflowError, PortSet, Result, TaskContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Bus that records every write and answers reads from a fixed pattern
pub struct RecordingBus {
    pub writes: Arc<Mutex<Vec<(u16, Vec<u8>)>>>,
    pub fill: u8,
}

impl RecordingBus {
    pub fn new(fill: u8) -> (Self, Arc<Mutex<Vec<(u16, Vec<u8>)>>>) {
        let writes = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                writes: Arc::clone(&writes),
                fill,
            },
            writes,
        )
    }
}

impl BusDriver for RecordingBus {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::I2c
    }

    fn write(&mut self, address: u16, bytes: &[u8]) -> Result<()> {
        self.writes
            .lock()
            .map_err(|_| DataflowError::Bus("poisoned".to_string()))?
            .push((address, bytes.to_vec()));
        Ok(())
    }

    fn read(&mut self, _address: u16, buffer: &mut [u8]) -> Result<()> {
        buffer.fill(self.fill);
        Ok(())
    }
}

/// Component whose `process()` returns right away and counts its calls
pub struct ReturningComponent {
    name: String,
    ports: PortSet,
    pub calls: Arc<AtomicUsize>,
}

impl ReturningComponent {
    pub fn new(name: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.to_string(),
                ports: PortSet::new(),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl Component for ReturningComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn process(&mut self, ctx: &TaskContext) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Keep the restart loop from spinning flat out
        ctx.sleep(std::time::Duration::from_millis(1));
        Ok(())
    }
}
