//! Function: a component whose body is a closure.

use super::{IN, OUT};
use crate::dataflow::component::Component;
use crate::dataflow::port::{PortSet, DEFAULT_QUEUE_CAPACITY};
use crate::dataflow::runtime::TaskContext;
use crate::error::Result;

/// Closure run by a [`Function`] component.
pub type FunctionBody = Box<dyn FnMut(&PortSet, &TaskContext) -> Result<()> + Send>;

/// Runs a user closure against its ports, over and over.
///
/// The closure is one iteration of the component's loop: typically a blocking
/// receive on `in`, some work, and a send on `out`. An `Err` ends the current
/// `process()` pass and is reported by the runtime.
pub struct Function {
    name: String,
    ports: PortSet,
    body: FunctionBody,
}

impl Function {
    /// A function component with an `in` and an `out` port.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&PortSet, &TaskContext) -> Result<()> + Send + 'static,
    {
        Self::with_capacity(name, DEFAULT_QUEUE_CAPACITY, body)
    }

    /// Like [`new`](Self::new), with room for `capacity` queued messages on `in`.
    pub fn with_capacity<F>(name: impl Into<String>, capacity: usize, body: F) -> Self
    where
        F: FnMut(&PortSet, &TaskContext) -> Result<()> + Send + 'static,
    {
        let mut ports = PortSet::with_default_capacity(capacity);
        ports.add_input_default(IN);
        ports.add_output(OUT);
        Self::with_ports(name, ports, body)
    }

    /// A function component over a caller-built port set.
    pub fn with_ports<F>(name: impl Into<String>, ports: PortSet, body: F) -> Self
    where
        F: FnMut(&PortSet, &TaskContext) -> Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            ports,
            body: Box::new(body),
        }
    }
}

impl Component for Function {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn process(&mut self, ctx: &TaskContext) -> Result<()> {
        while !ctx.is_cancelled() {
            (self.body)(&self.ports, ctx)?;
        }
        Ok(())
    }
}
