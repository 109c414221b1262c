//! InterfaceProvider: hands a bus driver to the components that need it.

use super::INTERFACE;
use crate::dataflow::component::Component;
use crate::dataflow::interface::DriverHandle;
use crate::dataflow::message::Message;
use crate::dataflow::port::PortSet;
use crate::dataflow::runtime::TaskContext;
use crate::error::Result;

/// Publishes its driver handle once on `interface`, then parks for good.
///
/// Consumers wire their own `interface` input to this port and block on it
/// before touching the bus, which makes start-up order irrelevant.
pub struct InterfaceProvider {
    name: String,
    ports: PortSet,
    handle: DriverHandle,
}

impl InterfaceProvider {
    pub fn new(name: impl Into<String>, handle: DriverHandle) -> Self {
        let mut ports = PortSet::new();
        ports.add_output(INTERFACE);
        Self {
            name: name.into(),
            ports,
            handle,
        }
    }
}

impl Component for InterfaceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn process(&mut self, ctx: &TaskContext) -> Result<()> {
        let message = Message::with_value("root", self.handle.clone());
        self.ports.get(INTERFACE)?.send(&message)?;
        tracing::info!("{}: published {} interface", self.name, self.handle.kind());
        ctx.suspend();
        Ok(())
    }
}
