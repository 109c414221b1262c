//! Dataflow demo - simulated weather station
//!
//! Wires a small pipeline against a simulated I2C sensor:
//!
//! ```text
//! [i2c0] ──interface──► [sensor] ──out──► [log]
//!                          ▲         ├──► [prepare] ──► [uplink]
//! [button] ─► [debounce] ──┘         └──► [watchdog] ──► [sleep]
//! ```
//!
//! A timer thread plays the part of a GPIO interrupt and presses the button a
//! few times. When the readings stop, the watchdog fires, the retained state
//! is saved and the program exits.

use anyhow::Context;
use dataflow_rt::components::{
    Debounce, Debug, Function, InterfaceProvider, InterruptInput, Watchdog, INTERFACE,
};
use dataflow_rt::config::{config_dir, RuntimeConfig};
use dataflow_rt::dataflow::{BusDriver, InterfaceKind, PortSet};
use dataflow_rt::{Component, DataflowError, DriverHandle, Message, RetainedState, Runtime};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SENSOR_ADDRESS: u16 = 0x76;
const BUTTON_PRESSES: usize = 5;

/// Temperature/pressure/humidity sensor that drifts a little on every read.
struct SimulatedBus {
    register: u8,
    tick: u32,
}

impl BusDriver for SimulatedBus {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::I2c
    }

    fn write(&mut self, address: u16, bytes: &[u8]) -> dataflow_rt::Result<()> {
        if address != SENSOR_ADDRESS {
            return Err(DataflowError::Bus(format!("no device at 0x{:02x}", address)));
        }
        self.register = bytes.first().copied().unwrap_or(0);
        Ok(())
    }

    fn read(&mut self, address: u16, buffer: &mut [u8]) -> dataflow_rt::Result<()> {
        if address != SENSOR_ADDRESS {
            return Err(DataflowError::Bus(format!("no device at 0x{:02x}", address)));
        }
        self.tick += 1;
        // Values in hundredths, big endian
        let raw: u32 = match self.register {
            0xFA => 2_150 + self.tick * 7,
            0xF7 => 10_132_500 - self.tick * 40,
            _ => 4_000 + self.tick * 11,
        };
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = raw.to_be_bytes().get(i).copied().unwrap_or(0);
        }
        Ok(())
    }
}

fn read_register(bus: &mut dyn BusDriver, register: u8) -> dataflow_rt::Result<f64> {
    bus.write(SENSOR_ADDRESS, &[register])?;
    let mut raw = [0u8; 4];
    bus.read(SENSOR_ADDRESS, &mut raw)?;
    Ok(u32::from_be_bytes(raw) as f64 / 100.0)
}

fn init_logging(config: &RuntimeConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));

    match &config.logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "dataflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}

fn state_path(config: &RuntimeConfig) -> PathBuf {
    config
        .state
        .path
        .clone()
        .or_else(|| config_dir().map(|dir| dir.join("retained.json")))
        .unwrap_or_else(|| std::env::temp_dir().join("dataflow-retained.json"))
}

/// Lock the retained tree, keeping its contents if a task panicked while
/// holding the lock.
fn lock_retained(retained: &Mutex<Message>) -> MutexGuard<'_, Message> {
    retained.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Retained state lock poisoned, continuing with its last contents");
        poisoned.into_inner()
    })
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::load(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => RuntimeConfig::load_or_default(),
    };
    let _log_guard = init_logging(&config);

    tracing::info!("Starting dataflow demo");

    // Restore what the previous run left behind
    let state_path = state_path(&config);
    let mut retained = RetainedState::load_or_default(&state_path)
        .message()
        .context("restoring retained state")?;
    let boots = retained.child("boots").and_then(|n| n.get::<i64>()).unwrap_or(0) + 1;
    retained.child_mut("boots").set(boots);
    tracing::info!("Boot #{} (state at {:?})", boots, state_path);
    let retained = Arc::new(Mutex::new(retained));

    // ── Components ──

    let capacity = config.runtime.default_queue_capacity;

    let bus = DriverHandle::new(SimulatedBus { register: 0, tick: 0 });
    let provider = InterfaceProvider::new("i2c0", bus);

    let button = InterruptInput::new("button", {
        let mut level = 0;
        move || {
            level ^= 1;
            level
        }
    });
    let button_irq = button.notifier();
    let debounce = Debounce::with_capacity("debounce", Duration::from_millis(50), capacity);

    let mut sensor_ports = PortSet::with_default_capacity(capacity);
    sensor_ports.add_input(INTERFACE, 1);
    sensor_ports.add_input_default("trigger");
    sensor_ports.add_output("out");
    let mut bus_handle: Option<DriverHandle> = None;
    let sensor = Function::with_ports("sensor", sensor_ports, move |ports, _ctx| {
        let bus = match bus_handle.clone() {
            Some(bus) => bus,
            None => {
                let handle = ports.get(INTERFACE)?.receive()?.get::<DriverHandle>()?;
                bus_handle = Some(handle.clone());
                handle
            }
        };

        ports.get("trigger")?.receive()?;
        let (temperature, pressure, humidity) = bus.transaction(|bus| {
            Ok((
                read_register(bus, 0xFA)?,
                read_register(bus, 0xF7)?,
                read_register(bus, 0xFD)?,
            ))
        })?;

        let mut reading = Message::named("reading");
        reading.add_with("temperature", temperature);
        reading.add_with("pressure", pressure);
        reading.add_with("humidity", humidity);
        ports.get("out")?.send(&reading)
    });

    let log = Debug::with_capacity("log", capacity);

    let prepare = Function::with_capacity("prepare", capacity, {
        let retained = Arc::clone(&retained);
        move |ports, _ctx| {
            let reading = ports.get("in")?.receive()?;
            let mut update = Message::named("update");
            for (index, field) in ["temperature", "pressure", "humidity"].iter().enumerate() {
                let value = reading.child(field)?.get::<f64>()?;
                update.child_mut("update").child_at_mut(index).set(value);
            }
            {
                let mut state = lock_retained(&retained);
                let mut last = state.child_mut("last");
                last.clear();
                for node in reading.root().children() {
                    last.add_with(node.name(), node.value().clone());
                }
            }
            ports.get("out")?.send(&update)
        }
    });

    let uplink = Debug::with_capacity("uplink", capacity);
    let watchdog = Watchdog::with_capacity("watchdog", Duration::from_secs(1), capacity);

    let (sleep_tx, sleep_rx) = crossbeam_channel::bounded::<()>(1);
    let sleep = Function::with_capacity("sleep", capacity, move |ports, _ctx| {
        let alarm = ports.get("in")?.receive()?;
        tracing::info!("Received '{}', preparing to sleep", alarm.name());
        sleep_tx
            .send(())
            .map_err(|_| DataflowError::Disconnected("sleep".to_string()))
    });

    // ── Wiring ──

    let _ = provider.query(INTERFACE) >> sensor.query(INTERFACE);
    let _ = button.query("out") >> debounce.query("in");
    let _ = debounce.query("out") >> sensor.query("trigger");
    let _ = sensor.query("out") >> log.query("in");
    let _ = sensor.query("out") >> prepare.query("in");
    let _ = sensor.query("out") >> watchdog.query("in");
    let _ = prepare.query("out") >> uplink.query("in");
    let _ = watchdog.query("out") >> sleep.query("in");

    // Take one reading straight away, before any button press
    sensor
        .query("trigger")
        .send_initial_message(&Message::new())
        .context("seeding sensor trigger")?;

    // ── Run ──

    let mut runtime = Runtime::with_config(config.clone());
    runtime.add_component(provider);
    runtime.add_component(button);
    runtime.add_component(debounce);
    runtime.add_component(sensor);
    runtime.add_component(log);
    runtime.add_component(prepare);
    runtime.add_component(uplink);
    runtime.add_component(watchdog);
    runtime.add_component(sleep);
    let handle = runtime.start().context("starting runtime")?;

    // Simulated GPIO edges
    let irq = thread::spawn(move || {
        for _ in 0..BUTTON_PRESSES {
            thread::sleep(Duration::from_millis(300));
            button_irq.notify();
        }
    });

    sleep_rx.recv().context("sleep component went away")?;
    let _ = irq.join();

    let snapshot = lock_retained(&retained).clone();
    RetainedState::capture(&snapshot)?.save(&state_path)?;
    tracing::info!("Retained state saved to {:?}", state_path);

    for name in handle.task_names() {
        tracing::debug!(
            "{}: {} invocation(s)",
            name,
            handle.invocations(name).unwrap_or(0)
        );
    }
    handle.cancel();
    tracing::info!("Shutting down...");
    Ok(())
}
