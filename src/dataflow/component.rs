//! Components and the fluent wiring API.
//!
//! A component owns a [`PortSet`] built in its constructor and a `process`
//! body the runtime calls in a loop on the component's own task. Wiring
//! happens before the runtime starts, through [`PortQuery`]:
//!
//! ```ignore
//! sensor.query("out") >> debug.query("in");
//! splitter.query("a").then("b") >> sink.query("in"); // connects "b"
//! prepare.query("in").send_initial_message(&Message::new())?;
//! ```

use crate::dataflow::message::Message;
use crate::dataflow::port::{Port, PortSet};
use crate::dataflow::runtime::TaskContext;
use crate::error::{DataflowError, Result};
use std::ops::Shr;

/// A unit of execution that owns named ports.
pub trait Component: Send {
    /// Name used for the task and in logs.
    fn name(&self) -> &str;

    fn ports(&self) -> &PortSet;

    /// One pass of the component's body.
    ///
    /// Under normal operation this blocks on its inputs and never returns.
    /// A return, `Ok` or `Err`, is treated as a crash: the runtime logs it and
    /// calls `process` again.
    fn process(&mut self, ctx: &TaskContext) -> Result<()>;

    /// Start a connection query at the port called `name`.
    fn query(&self, name: &str) -> PortQuery<'_> {
        PortQuery::new(self.name(), self.ports(), name)
    }
}

/// A lookup of one or two ports on a single component, used for wiring.
///
/// `left` is the port named when the query was created. `right` is the last
/// output port selected with [`then`](Self::then) and, when present, is the
/// source of the connection made by `>>`.
#[derive(Clone)]
pub struct PortQuery<'a> {
    component: &'a str,
    ports: &'a PortSet,
    requested: String,
    left: Option<&'a Port>,
    right: Option<&'a Port>,
}

impl<'a> PortQuery<'a> {
    pub fn new(component: &'a str, ports: &'a PortSet, name: &str) -> Self {
        let left = ports.get(name).ok();
        if left.is_none() {
            tracing::warn!("Component '{}' has no port '{}'", component, name);
        }
        Self {
            component,
            ports,
            requested: name.to_string(),
            left,
            right: None,
        }
    }

    /// Select another port on the same component as the connection source.
    ///
    /// Only output ports are accepted; naming anything else clears the
    /// selection, so the next `>>` falls back to the original port.
    pub fn then(mut self, name: &str) -> Self {
        self.right = self.ports.get(name).ok().filter(|port| port.is_output());
        if self.right.is_none() {
            tracing::debug!(
                "Query on '{}': '{}' is not an output port, selection cleared",
                self.component,
                name
            );
        }
        self
    }

    /// The port this query was created for.
    pub fn port(&self) -> Option<&'a Port> {
        self.left
    }

    /// The port `>>` would use as the connection source.
    pub fn source(&self) -> Option<&'a Port> {
        self.right.or(self.left)
    }

    /// Connect this query's source to `other`'s port.
    ///
    /// Returns false without connecting anything unless the target is an
    /// input port and the source is an output port.
    pub fn connect_to(&self, other: &PortQuery<'_>) -> bool {
        let Some(target) = other.left.filter(|port| port.is_input()) else {
            tracing::warn!(
                "Cannot connect '{}' to '{}.{}': target is not an input port",
                self.component,
                other.component,
                other.requested
            );
            return false;
        };
        match self.source() {
            Some(source) => Port::connect(source, target),
            None => false,
        }
    }

    /// Seed the queried port with `message` during startup.
    ///
    /// On an input port the message goes straight into its own queue; on an
    /// output port it is sent to every connected input.
    pub fn send_initial_message(&self, message: &Message) -> Result<()> {
        let port = self.left.ok_or_else(|| {
            DataflowError::PortNotFound(format!("{}.{}", self.component, self.requested))
        })?;
        if port.is_input() {
            port.inject(message.clone())
        } else {
            port.send(message)
        }
    }
}

impl<'a, 'b> Shr<PortQuery<'b>> for PortQuery<'a> {
    type Output = PortQuery<'b>;

    /// `a >> b` connects `a`'s source to `b` and yields `b`, so wiring chains.
    fn shr(self, other: PortQuery<'b>) -> PortQuery<'b> {
        self.connect_to(&other);
        other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        ports: PortSet,
    }

    impl Stub {
        fn new(inputs: &[&str], outputs: &[&str]) -> Self {
            let mut ports = PortSet::new();
            for name in inputs {
                ports.add_input_default(name);
            }
            for name in outputs {
                ports.add_output(name);
            }
            Self { ports }
        }
    }

    impl Component for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn ports(&self) -> &PortSet {
            &self.ports
        }

        fn process(&mut self, _ctx: &TaskContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_shr_connects_output_to_input() {
        let a = Stub::new(&[], &["out"]);
        let b = Stub::new(&["in"], &[]);

        let _ = a.query("out") >> b.query("in");
        assert!(a.ports["out"].is_connected());
        assert!(b.ports["in"].is_connected());
    }

    #[test]
    fn test_last_queried_output_wins() {
        let a = Stub::new(&[], &["out1", "out2"]);
        let b = Stub::new(&["in"], &[]);

        let _ = a.query("out1").then("out2") >> b.query("in");
        assert!(!a.ports["out1"].is_connected());
        assert!(a.ports["out2"].is_connected());
    }

    #[test]
    fn test_then_on_input_falls_back_to_left() {
        let a = Stub::new(&["in"], &["out"]);
        let b = Stub::new(&["in"], &[]);

        let _ = a.query("out").then("in") >> b.query("in");
        assert!(a.ports["out"].is_connected());
        assert!(!a.ports["in"].is_connected());
    }

    #[test]
    fn test_mismatched_directions_are_noop() {
        let a = Stub::new(&["in"], &["out"]);
        let b = Stub::new(&["in"], &["out"]);

        let _ = a.query("out") >> b.query("out");
        let _ = a.query("in") >> b.query("in");
        let _ = a.query("missing") >> b.query("in");
        let _ = a.query("out") >> b.query("missing");

        for port in a.ports.iter().chain(b.ports.iter()) {
            assert!(!port.is_connected(), "{} should be unconnected", port.name());
        }
    }

    #[test]
    fn test_chained_wiring() {
        let a = Stub::new(&[], &["out"]);
        let b = Stub::new(&["in"], &["out"]);
        let c = Stub::new(&["in"], &[]);

        // The middle query's selection decides the second hop
        let _ = a.query("out") >> b.query("in").then("out") >> c.query("in");
        assert!(a.ports["out"].is_connected());
        assert!(b.ports["out"].is_connected());
        assert!(c.ports["in"].is_connected());
    }

    #[test]
    fn test_send_initial_message_seeds_input() {
        let b = Stub::new(&["in"], &[]);
        b.query("in")
            .send_initial_message(&Message::with_value("seed", 1))
            .unwrap();
        assert_eq!(b.ports["in"].len(), 1);
        assert!(!b.ports["in"].is_connected());
    }

    #[test]
    fn test_send_initial_message_on_missing_port() {
        let b = Stub::new(&["in"], &[]);
        assert!(b.query("nope").send_initial_message(&Message::new()).is_err());
    }
}
