#![allow(dead_code)]

pub mod containers;

use anyhow::Result;
use std::sync::{Arc, Mutex};

use dbreplicator::drivers::BackendDriver;
use dbreplicator::error::DriverError;
use dbreplicator::registry::Slot;
use dbreplicator::utils::process::{CommandRunner, ToolCommand, ToolStatus};

/// Shared, ordered log of every lifecycle call across drivers.
pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

/// Driver with scripted connect/replicate outcomes.
pub struct MockDriver {
    pub name: &'static str,
    pub slot: Slot,
    pub connect: Result<(), DriverError>,
    pub replicate: Result<(), DriverError>,
    pub events: Events,
}

impl MockDriver {
    pub fn new(name: &'static str, slot: Slot, events: &Events) -> Self {
        Self {
            name,
            slot,
            connect: Ok(()),
            replicate: Ok(()),
            events: events.clone(),
        }
    }

    pub fn connect_with(mut self, result: Result<(), DriverError>) -> Self {
        self.connect = result;
        self
    }

    pub fn replicate_with(mut self, result: Result<(), DriverError>) -> Self {
        self.replicate = result;
        self
    }

    fn record(&self, stage: &str) {
        self.events.lock().unwrap().push(format!("{}:{}", self.name, stage));
    }
}

impl BackendDriver for MockDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn slot(&self) -> Slot {
        self.slot
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        self.record("connect");
        self.connect.clone()
    }

    fn replicate(&mut self) -> Result<(), DriverError> {
        self.record("replicate");
        self.replicate.clone()
    }

    fn close(&mut self) {
        self.record("close");
    }
}

/// Records tool invocations and answers with scripted statuses, then success.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    pub calls: Arc<Mutex<Vec<ToolCommand>>>,
    pub statuses: Arc<Mutex<Vec<ToolStatus>>>,
}

impl ScriptedRunner {
    pub fn answering(statuses: Vec<ToolStatus>) -> Self {
        let runner = ScriptedRunner::default();
        *runner.statuses.lock().unwrap() = statuses;
        runner
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&mut self, command: &ToolCommand) -> Result<ToolStatus> {
        self.calls.lock().unwrap().push(command.clone());
        let mut statuses = self.statuses.lock().unwrap();
        Ok(if statuses.is_empty() {
            ToolStatus::Success
        } else {
            statuses.remove(0)
        })
    }
}

/// Wraps a driver whose endpoints are treated as already reachable,
/// so replication can be exercised without live servers.
pub struct Preconnected<D>(pub D);

impl<D: BackendDriver> BackendDriver for Preconnected<D> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn slot(&self) -> Slot {
        self.0.slot()
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn replicate(&mut self) -> Result<(), DriverError> {
        self.0.replicate()
    }

    fn close(&mut self) {
        self.0.close()
    }
}
