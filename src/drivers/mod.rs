use tracing::debug;

use crate::config::Config;
use crate::error::{DriverError, RegistryError};
use crate::registry::{Registry, Slot};

pub mod mongo;
pub mod postgres;

pub trait BackendDriver: Send {
    fn name(&self) -> &'static str;

    fn slot(&self) -> Slot;

    /// Open both the origin and the target connection.
    /// Must leave the driver in a state where `close` is safe, whatever the outcome.
    fn connect(&mut self) -> Result<(), DriverError>;

    /// Perform one full replication pass from origin into target.
    fn replicate(&mut self) -> Result<(), DriverError>;

    /// Release both connections. Safe to call on handles that were never opened.
    fn close(&mut self);
}

type Constructor = fn(&Config) -> Box<dyn BackendDriver>;

/// Every known driver, in the order they are registered and run.
const CONSTRUCTORS: &[(Slot, Constructor)] = &[
    (Slot::Relational, construct_postgres),
    (Slot::Document, construct_mongo),
];

fn construct_postgres(config: &Config) -> Box<dyn BackendDriver> {
    Box::new(postgres::PostgresDriver::new(config.postgres.clone()))
}

fn construct_mongo(config: &Config) -> Box<dyn BackendDriver> {
    Box::new(mongo::MongoDriver::new(config.mongo.clone()))
}

/// Construct and register the drivers selected by `only` (all of them when empty).
pub fn register_drivers(
    config: &Config,
    registry: &mut Registry,
    only: &[Slot],
) -> Result<(), RegistryError> {
    for (slot, construct) in CONSTRUCTORS {
        if !only.is_empty() && !only.contains(slot) {
            debug!(slot = %slot, "Skipping driver not selected for this run");
            continue;
        }
        registry.register(*slot, construct(config))?;
    }
    Ok(())
}
