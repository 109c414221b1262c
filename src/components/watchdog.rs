//! Watchdog: reports when its input has been quiet for too long.

use super::{IN, OUT};
use crate::dataflow::component::Component;
use crate::dataflow::message::Message;
use crate::dataflow::port::{PortSet, DEFAULT_QUEUE_CAPACITY};
use crate::dataflow::runtime::TaskContext;
use crate::error::{DataflowError, Result};
use std::time::Duration;

/// Name of the message sent when the timer expires.
pub const WATCHDOG_MESSAGE: &str = "watchdog";

/// One-shot timer re-armed by every message on `in`.
///
/// The timer is armed when the task starts. If `period` passes without input,
/// a message named `"watchdog"` is sent on `out` and the timer stays disarmed
/// until the next input arrives.
pub struct Watchdog {
    name: String,
    ports: PortSet,
    period: Duration,
}

impl Watchdog {
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self::with_capacity(name, period, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(name: impl Into<String>, period: Duration, capacity: usize) -> Self {
        let mut ports = PortSet::with_default_capacity(capacity);
        ports.add_input_default(IN);
        ports.add_output(OUT);
        Self {
            name: name.into(),
            ports,
            period,
        }
    }
}

impl Component for Watchdog {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn process(&mut self, _ctx: &TaskContext) -> Result<()> {
        let input = self.ports.get(IN)?;
        let output = self.ports.get(OUT)?;
        let mut armed = true;
        loop {
            if armed {
                match input.receive_timeout(self.period) {
                    Ok(_) => {}
                    Err(DataflowError::Timeout(_)) => {
                        tracing::debug!("{}: expired after {:?}", self.name, self.period);
                        output.send(&Message::named(WATCHDOG_MESSAGE))?;
                        armed = false;
                    }
                    Err(e) => return Err(e),
                }
            } else {
                input.receive()?;
                armed = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::port::Port;
    use crate::dataflow::runtime::Runtime;
    use std::thread;

    fn start(period: Duration) -> (Port, Port, crate::dataflow::runtime::RuntimeHandle) {
        let watchdog = Watchdog::new("watchdog", period);
        let feed = Port::output("feed");
        let alarms = Port::input("alarms", 10);
        Port::connect(&feed, &watchdog.ports()[IN]);
        Port::connect(&watchdog.ports()[OUT], &alarms);

        let mut runtime = Runtime::new();
        runtime.add_component(watchdog);
        (feed, alarms, runtime.start().unwrap())
    }

    #[test]
    fn test_fires_once_when_quiet() {
        let (_feed, alarms, handle) = start(Duration::from_millis(30));

        let alarm = alarms.receive_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(alarm.name(), WATCHDOG_MESSAGE);

        // Disarmed until fed again
        assert!(alarms.receive_timeout(Duration::from_millis(150)).is_err());
        handle.cancel();
    }

    #[test]
    fn test_feeding_keeps_it_quiet() {
        let (feed, alarms, handle) = start(Duration::from_millis(200));

        for _ in 0..10 {
            feed.send(&Message::new()).unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        assert!(alarms.try_receive().unwrap().is_none());

        // Stop feeding: it fires
        let alarm = alarms.receive_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(alarm.name(), WATCHDOG_MESSAGE);
        handle.cancel();
    }

    #[test]
    fn test_rearmed_by_input_after_firing() {
        let (feed, alarms, handle) = start(Duration::from_millis(30));

        alarms.receive_timeout(Duration::from_secs(5)).unwrap();
        feed.send(&Message::new()).unwrap();
        let second = alarms.receive_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(second.name(), WATCHDOG_MESSAGE);
        handle.cancel();
    }
}
