//! Component-and-port dataflow core.
//!
//! Components run as independent tasks and exchange [`Message`] trees through
//! named ports. The graph is wired once at startup and never changes.
//!
//! # Architecture
//!
//! ```text
//! [InterfaceProvider] ──interface──► [Sensor] ──out──► [Debug]
//!                                            └──out──► [Prepare] ──► [Uplink]
//! ```
//!
//! # Design
//!
//! - **Closed value set**: `Value` is an enum over bool, int, double, string
//!   and driver handle. Extraction is exact.
//! - **Arena trees**: a `Message` is a flat `Vec` of nodes with index links;
//!   copy, clear and traversal are iterative.
//! - **Copy on send**: every connected input queue gets its own deep copy, so
//!   receivers never alias.
//! - **Back-pressure**: input queues are bounded; a full queue blocks the
//!   sender instead of dropping.
//! - **Restart on return**: a task whose `process()` returns or panics is run
//!   again.

pub mod component;
pub mod id;
pub mod interface;
pub mod message;
pub mod notify;
pub mod port;
pub mod runtime;
pub mod snapshot;
pub mod value;

pub use component::{Component, PortQuery};
pub use id::{NodeId, TaskId};
pub use interface::{BusDriver, DriverHandle, InterfaceKind};
pub use message::{DepthFirst, Message, NodeMut, NodeRef};
pub use notify::{notification, Notifier, NotifyWait};
pub use port::{Port, PortDirection, PortSet, DEFAULT_QUEUE_CAPACITY};
pub use runtime::{Runtime, RuntimeHandle, Spawner, TaskBody, TaskContext, ThreadSpawner};
pub use snapshot::{MessageSnapshot, SnapshotValue};
pub use value::{Value, ValueKind, ValueType};
