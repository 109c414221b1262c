//! InterruptInput: turns edge notifications into level messages.

use super::OUT;
use crate::dataflow::component::Component;
use crate::dataflow::message::Message;
use crate::dataflow::notify::{notification, Notifier, NotifyWait};
use crate::dataflow::port::PortSet;
use crate::dataflow::runtime::TaskContext;
use crate::error::Result;

type LevelReader = Box<dyn FnMut() -> i64 + Send>;

/// Waits for a notification, samples the input level and sends it.
///
/// The interrupt side only calls [`Notifier::notify`], which never blocks.
/// Reading the level and sending happen on the component's task. Edges that
/// arrive while a message is being sent collapse into one more sample.
///
/// Each sample is sent as `Message::with_value("root", level)`.
pub struct InterruptInput {
    name: String,
    ports: PortSet,
    notifier: Notifier,
    wait: NotifyWait,
    read_level: LevelReader,
}

impl InterruptInput {
    pub fn new<F>(name: impl Into<String>, read_level: F) -> Self
    where
        F: FnMut() -> i64 + Send + 'static,
    {
        let mut ports = PortSet::new();
        ports.add_output(OUT);
        let (notifier, wait) = notification();
        Self {
            name: name.into(),
            ports,
            notifier,
            wait,
            read_level: Box::new(read_level),
        }
    }

    /// Handle to give to the interrupt source.
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }
}

impl Component for InterruptInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn process(&mut self, ctx: &TaskContext) -> Result<()> {
        let output = self.ports.get(OUT)?;
        while !ctx.is_cancelled() {
            // The component keeps a notifier of its own, so this cannot disconnect
            self.wait.wait();
            let level = (self.read_level)();
            tracing::trace!("{}: level {}", self.name, level);
            output.send(&Message::with_value("root", level))?;
        }
        Ok(())
    }
}
