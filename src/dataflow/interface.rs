//! Driver interface boundary.
//!
//! Bus drivers (I2C, SPI, UART, SD-over-SPI) live outside the runtime. The
//! runtime only moves an opaque [`DriverHandle`] between components, usually
//! once at startup over an `"interface"` port. It never interprets the bytes a
//! driver exchanges.
//!
//! A handle is shared by every component that received it, so multi-step
//! exchanges go through [`DriverHandle::transaction`], which holds the bus
//! mutex for exactly the duration of the closure.

use crate::error::{DataflowError, Result};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Which kind of bus a driver implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceKind {
    I2c,
    Spi,
    Uart,
    SdSpi,
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterfaceKind::I2c => "I2C",
            InterfaceKind::Spi => "SPI",
            InterfaceKind::Uart => "UART",
            InterfaceKind::SdSpi => "SD-SPI",
        };
        f.write_str(name)
    }
}

/// Byte-level access to a hardware bus.
#[cfg_attr(test, mockall::automock)]
pub trait BusDriver: Send {
    /// The bus this driver talks to.
    fn kind(&self) -> InterfaceKind;

    /// Write `bytes` to the device at `address`.
    fn write(&mut self, address: u16, bytes: &[u8]) -> Result<()>;

    /// Fill `buffer` from the device at `address`.
    fn read(&mut self, address: u16, buffer: &mut [u8]) -> Result<()>;
}

/// Shared, lockable reference to a bus driver.
///
/// Cloning the handle shares the same driver. Two handles compare equal when
/// they refer to the same driver instance.
#[derive(Clone)]
pub struct DriverHandle {
    kind: InterfaceKind,
    bus: Arc<Mutex<Box<dyn BusDriver>>>,
}

impl DriverHandle {
    pub fn new<B: BusDriver + 'static>(bus: B) -> Self {
        Self {
            kind: bus.kind(),
            bus: Arc::new(Mutex::new(Box::new(bus))),
        }
    }

    /// The bus kind, readable without taking the lock.
    pub fn kind(&self) -> InterfaceKind {
        self.kind
    }

    /// Run `f` with exclusive access to the bus.
    ///
    /// The lock is released as soon as `f` returns, so a component never holds
    /// the bus across its own blocking receive.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut dyn BusDriver) -> Result<R>) -> Result<R> {
        let mut bus = self
            .bus
            .lock()
            .map_err(|_| DataflowError::Bus(format!("{} bus lock poisoned", self.kind)))?;
        f(bus.as_mut())
    }
}

impl PartialEq for DriverHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bus, &other.bus)
    }
}

impl fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DriverHandle({})", self.kind)
    }
}
