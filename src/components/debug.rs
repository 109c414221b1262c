//! Debug: logs every message that passes through.

use super::{IN, OUT};
use crate::dataflow::component::Component;
use crate::dataflow::message::Message;
use crate::dataflow::port::{PortSet, DEFAULT_QUEUE_CAPACITY};
use crate::dataflow::runtime::TaskContext;
use crate::error::Result;

/// Logs each received message one node per line, indented by depth, as
/// `name: value`. Forwards the message on `out` only when `out` is connected,
/// so it can sit at the end of a chain or in the middle of one.
pub struct Debug {
    name: String,
    ports: PortSet,
}

impl Debug {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_QUEUE_CAPACITY)
    }

    /// Like [`new`](Self::new), with room for `capacity` queued messages on `in`.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let mut ports = PortSet::with_default_capacity(capacity);
        ports.add_input_default(IN);
        ports.add_output(OUT);
        Self {
            name: name.into(),
            ports,
        }
    }

    /// The lines logged for `message`.
    pub fn render(message: &Message) -> Vec<String> {
        message
            .iter()
            .map(|(level, node)| format!("{}{}: {}", " ".repeat(level), node.name(), node.value()))
            .collect()
    }
}

impl Component for Debug {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn process(&mut self, _ctx: &TaskContext) -> Result<()> {
        let input = self.ports.get(IN)?;
        let output = self.ports.get(OUT)?;
        loop {
            let message = input.receive()?;
            for line in Self::render(&message) {
                tracing::info!(component = %self.name, "{}", line);
            }
            if output.is_connected() {
                output.send(&message)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::port::Port;
    use crate::dataflow::runtime::Runtime;
    use std::time::Duration;

    #[test]
    fn test_render_indents_by_level() {
        let mut msg = Message::named("root");
        msg.add_with("temperature", 21.5);
        msg.child_mut("update").child_at_mut(0).set(3);

        assert_eq!(
            Debug::render(&msg),
            vec!["root: null", " temperature: 21.5", " update: null", "  : 3"]
        );
    }

    #[test]
    fn test_input_capacity() {
        assert_eq!(Debug::new("debug").ports()[IN].capacity(), Some(DEFAULT_QUEUE_CAPACITY));
        assert_eq!(Debug::with_capacity("debug", 2).ports()[IN].capacity(), Some(2));
        assert_eq!(Debug::with_capacity("debug", 2).ports()[OUT].capacity(), None);
    }

    #[test]
    fn test_forwards_when_connected() {
        let debug = Debug::new("debug");
        let source = Port::output("source");
        let sink = Port::input("sink", 2);
        Port::connect(&source, &debug.ports()[IN]);
        Port::connect(&debug.ports()[OUT], &sink);

        let mut runtime = Runtime::new();
        runtime.add_component(debug);
        let handle = runtime.start().unwrap();

        let mut msg = Message::named("reading");
        msg.add_with("humidity", 40.0);
        source.send(&msg).unwrap();
        assert_eq!(sink.receive_timeout(Duration::from_secs(5)).unwrap(), msg);

        handle.cancel();
    }

    #[test]
    fn test_unconnected_output_is_not_used() {
        let debug = Debug::new("debug");
        let source = Port::output("source");
        Port::connect(&source, &debug.ports()[IN]);
        assert!(!debug.ports()[OUT].is_connected());

        let mut runtime = Runtime::new();
        runtime.add_component(debug);
        let handle = runtime.start().unwrap();

        // Consumes more than a queue's worth without blocking on `out`
        for i in 0..25 {
            source
                .send_timeout(&Message::with_value("", i), Duration::from_secs(5))
                .unwrap();
        }
        handle.cancel();
    }
}
