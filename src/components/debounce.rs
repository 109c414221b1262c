//! Debounce: drops messages that arrive too soon after the last one forwarded.

use super::{IN, OUT};
use crate::dataflow::component::Component;
use crate::dataflow::port::{PortSet, DEFAULT_QUEUE_CAPACITY};
use crate::dataflow::runtime::TaskContext;
use crate::error::Result;
use std::time::{Duration, Instant};

pub struct Debounce {
    name: String,
    ports: PortSet,
    window: Duration,
    last_forwarded: Option<Instant>,
}

impl Debounce {
    pub fn new(name: impl Into<String>, window: Duration) -> Self {
        Self::with_capacity(name, window, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(name: impl Into<String>, window: Duration, capacity: usize) -> Self {
        let mut ports = PortSet::with_default_capacity(capacity);
        ports.add_input_default(IN);
        ports.add_output(OUT);
        Self {
            name: name.into(),
            ports,
            window,
            last_forwarded: None,
        }
    }

    /// Whether a message arriving at `now` passes. Records it if so.
    fn admit(&mut self, now: Instant) -> bool {
        let open = match self.last_forwarded {
            Some(last) => now.duration_since(last) > self.window,
            None => true,
        };
        if open {
            self.last_forwarded = Some(now);
        }
        open
    }
}

impl Component for Debounce {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn process(&mut self, _ctx: &TaskContext) -> Result<()> {
        loop {
            let message = self.ports.get(IN)?.receive()?;
            if self.admit(Instant::now()) {
                self.ports.get(OUT)?.send(&message)?;
            } else {
                tracing::trace!("{}: dropped bounce", self.name);
            }
        }
    }
}
