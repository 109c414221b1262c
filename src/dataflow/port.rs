//! Named, directional message endpoints.
//!
//! An input port owns one bounded FIFO queue. An output port owns no storage;
//! it holds senders into every input queue it was connected to and copies each
//! outgoing message into all of them, in connection order.
//!
//! A full input queue blocks the sender until the consumer catches up. Nothing
//! is ever dropped. Queues are crossbeam bounded channels: the input port keeps
//! both ends, so its queue stays open for as long as the port exists.

use crate::dataflow::message::Message;
use crate::error::{DataflowError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Queue capacity used when a component does not pick one.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// One downstream queue of an output port.
struct Target {
    /// Name of the input port, for logs.
    port: String,
    tx: Sender<Message>,
}

enum Endpoint {
    Input {
        tx: Sender<Message>,
        rx: Receiver<Message>,
        capacity: usize,
    },
    Output {
        targets: RwLock<Vec<Target>>,
    },
}

/// A named communication endpoint.
pub struct Port {
    name: String,
    endpoint: Endpoint,
    connected: AtomicBool,
}

impl Port {
    /// Create an input port with a queue of `capacity` messages.
    ///
    /// A capacity of zero is raised to one; a queue must be able to hold the
    /// message it is handed.
    pub fn input(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            name: name.into(),
            endpoint: Endpoint::Input { tx, rx, capacity },
            connected: AtomicBool::new(false),
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: Endpoint::Output {
                targets: RwLock::new(Vec::new()),
            },
            connected: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> PortDirection {
        match self.endpoint {
            Endpoint::Input { .. } => PortDirection::Input,
            Endpoint::Output { .. } => PortDirection::Output,
        }
    }

    pub fn is_input(&self) -> bool {
        self.direction() == PortDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction() == PortDirection::Output
    }

    /// True once at least one connection involves this port.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queue capacity of an input port.
    pub fn capacity(&self) -> Option<usize> {
        match &self.endpoint {
            Endpoint::Input { capacity, .. } => Some(*capacity),
            Endpoint::Output { .. } => None,
        }
    }

    /// Messages currently waiting in an input port's queue. Always 0 for outputs.
    pub fn len(&self) -> usize {
        match &self.endpoint {
            Endpoint::Input { rx, .. } => rx.len(),
            Endpoint::Output { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of input queues an output port fans out to.
    pub fn connection_count(&self) -> usize {
        match &self.endpoint {
            Endpoint::Input { .. } => 0,
            Endpoint::Output { targets } => read_targets(targets).len(),
        }
    }

    /// Attach `input`'s queue to `output`'s fan-out list.
    ///
    /// Only output to input is legal. Any other pairing is a no-op that
    /// returns false and logs a warning; wiring code is not expected to check.
    pub fn connect(output: &Port, input: &Port) -> bool {
        let (Endpoint::Output { targets }, Endpoint::Input { tx, .. }) =
            (&output.endpoint, &input.endpoint)
        else {
            tracing::warn!(
                "Ignoring connection {} '{}' -> {} '{}': must be output -> input",
                output.direction(),
                output.name,
                input.direction(),
                input.name
            );
            return false;
        };

        targets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Target {
                port: input.name.clone(),
                tx: tx.clone(),
            });
        output.connected.store(true, Ordering::Release);
        input.connected.store(true, Ordering::Release);
        tracing::debug!("Connected '{}' -> '{}'", output.name, input.name);
        true
    }

    /// Deliver a copy of `message` to every connected input queue.
    ///
    /// Blocks while any target queue is full. Every target is attempted; the
    /// result is an error if any delivery failed because its queue is gone.
    /// An output with no connections accepts and discards the message.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.fan_out(message, None)
    }

    /// Like [`send`](Self::send), but gives up on a target after `timeout`.
    pub fn send_timeout(&self, message: &Message, timeout: Duration) -> Result<()> {
        self.fan_out(message, Some(timeout))
    }

    fn fan_out(&self, message: &Message, timeout: Option<Duration>) -> Result<()> {
        let Endpoint::Output { targets } = &self.endpoint else {
            return Err(self.wrong_direction(PortDirection::Output));
        };

        let targets = read_targets(targets);
        let mut failure = None;
        for target in targets.iter() {
            let copy = message.clone();
            let delivered = match timeout {
                None => target
                    .tx
                    .send(copy)
                    .map_err(|_| DataflowError::Disconnected(target.port.clone())),
                Some(timeout) => target.tx.send_timeout(copy, timeout).map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => DataflowError::Timeout(target.port.clone()),
                    SendTimeoutError::Disconnected(_) => {
                        DataflowError::Disconnected(target.port.clone())
                    }
                }),
            };
            if let Err(e) = delivered {
                tracing::warn!("Port '{}' failed to deliver to '{}': {}", self.name, target.port, e);
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Push `message` straight into this input port's own queue.
    ///
    /// Used to seed a pipeline before any upstream producer runs.
    pub fn inject(&self, message: Message) -> Result<()> {
        match &self.endpoint {
            Endpoint::Input { tx, .. } => tx
                .send(message)
                .map_err(|_| DataflowError::Disconnected(self.name.clone())),
            Endpoint::Output { .. } => Err(self.wrong_direction(PortDirection::Input)),
        }
    }

    /// Block until a message is available and return the oldest one.
    pub fn receive(&self) -> Result<Message> {
        self.queue()?
            .recv()
            .map_err(|_| DataflowError::Disconnected(self.name.clone()))
    }

    /// Like [`receive`](Self::receive), but fails with `Timeout` after `timeout`.
    pub fn receive_timeout(&self, timeout: Duration) -> Result<Message> {
        self.queue()?.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => DataflowError::Timeout(self.name.clone()),
            RecvTimeoutError::Disconnected => DataflowError::Disconnected(self.name.clone()),
        })
    }

    /// Pop the oldest message if one is waiting.
    pub fn try_receive(&self) -> Result<Option<Message>> {
        match self.queue()?.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DataflowError::Disconnected(self.name.clone())),
        }
    }

    fn queue(&self) -> Result<&Receiver<Message>> {
        match &self.endpoint {
            Endpoint::Input { rx, .. } => Ok(rx),
            Endpoint::Output { .. } => Err(self.wrong_direction(PortDirection::Input)),
        }
    }

    fn wrong_direction(&self, expected: PortDirection) -> DataflowError {
        DataflowError::WrongDirection {
            port: self.name.clone(),
            expected,
        }
    }
}

fn read_targets(targets: &RwLock<Vec<Target>>) -> std::sync::RwLockReadGuard<'_, Vec<Target>> {
    targets.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("direction", &self.direction())
            .field("connected", &self.is_connected())
            .field("queued", &self.len())
            .finish()
    }
}

/// The name-indexed ports of one component.
///
/// Ports are registered while the component is being built and never removed.
pub struct PortSet {
    ports: BTreeMap<String, Port>,
    default_capacity: usize,
}

impl Default for PortSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PortSet {
    pub fn new() -> Self {
        Self::with_default_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Port set whose [`add_input_default`](Self::add_input_default) uses `capacity`.
    pub fn with_default_capacity(capacity: usize) -> Self {
        Self {
            ports: BTreeMap::new(),
            default_capacity: capacity,
        }
    }

    /// Register an input port. Returns false if the name is taken.
    pub fn add_input(&mut self, name: &str, capacity: usize) -> bool {
        self.insert(Port::input(name, capacity))
    }

    /// Register an input port with the set's default capacity.
    pub fn add_input_default(&mut self, name: &str) -> bool {
        self.add_input(name, self.default_capacity)
    }

    /// Register an output port. Returns false if the name is taken.
    pub fn add_output(&mut self, name: &str) -> bool {
        self.insert(Port::output(name))
    }

    fn insert(&mut self, port: Port) -> bool {
        if self.ports.contains_key(port.name()) {
            let collision = DataflowError::PortNameCollision(port.name().to_string());
            tracing::warn!("{}, ignoring new {} port", collision, port.direction());
            return false;
        }
        self.ports.insert(port.name().to_string(), port);
        true
    }

    pub fn get(&self, name: &str) -> Result<&Port> {
        self.ports
            .get(name)
            .ok_or_else(|| DataflowError::PortNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ports.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn default_capacity(&self) -> usize {
        self.default_capacity
    }

    /// Ports in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }
}

impl std::ops::Index<&str> for PortSet {
    type Output = Port;

    /// Panics if no port has this name; use [`PortSet::get`] to handle that case.
    fn index(&self, name: &str) -> &Port {
        match self.ports.get(name) {
            Some(port) => port,
            None => panic!("no port named '{}'", name),
        }
    }
}

impl fmt::Debug for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ports.values()).finish()
    }
}
