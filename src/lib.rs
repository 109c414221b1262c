//! # dataflow-rt: component-and-port dataflow runtime
//!
//! Independent components run as concurrent tasks and talk only through
//! typed message ports. The pipeline graph is wired once at startup and stays
//! fixed afterwards.
//!
//! ## Architecture
//!
//! - **Values**: `Value` holds one bool, integer, double, string or driver
//!   handle, with exact type-checked extraction
//! - **Messages**: `Message` is a named tree of values stored in a node arena
//! - **Ports**: bounded input queues with blocking back-pressure; output ports
//!   fan out deep copies to every connected input
//! - **Runtime**: one task per component, restarting `process()` whenever it
//!   returns
//! - **Components**: reusable building blocks (debug, debounce, watchdog,
//!   interrupt input, interface provider, closures)
//!
//! ## Example
//!
//! ```ignore
//! use dataflow_rt::components::{Debug, Function};
//! use dataflow_rt::{Component, Message, Runtime};
//!
//! let producer = Function::new("producer", |ports, ctx| {
//!     ctx.sleep(std::time::Duration::from_secs(1));
//!     ports.get("out")?.send(&Message::with_value("", 42))
//! });
//! let debug = Debug::new("debug");
//!
//! let _ = producer.query("out") >> debug.query("in");
//!
//! let mut runtime = Runtime::new();
//! runtime.add_component(producer);
//! runtime.add_component(debug);
//! let handle = runtime.start()?;
//! ```

pub mod components;
pub mod config;
pub mod dataflow;
pub mod error;
pub mod state;

// Re-export commonly used types
pub use config::{RuntimeConfig, TaskConfig};
pub use dataflow::{
    Component, DriverHandle, Message, Port, PortDirection, PortQuery, PortSet, Runtime,
    RuntimeHandle, TaskContext, Value, ValueKind,
};
pub use error::{DataflowError, Result, ResultExt};
pub use state::RetainedState;
