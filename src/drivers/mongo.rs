use mongodb::bson::{Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ReplaceOptions;
use mongodb::sync::{Client, Database};
use tracing::{debug, info, warn};

use super::BackendDriver;
use crate::config::{BackupMode, MongoConfig};
use crate::error::DriverError;
use crate::registry::Slot;
use crate::utils::uri::DocumentUri;

pub const SCHEME: &str = "mongodb";

/// Database the liveness check is issued against.
const ADMIN_DB: &str = "admin";

pub struct MongoDriver {
    conf: MongoConfig,
    origin_client: Option<Client>,
    target_client: Option<Client>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CopyStats {
    collections: usize,
    documents: u64,
}

impl MongoDriver {
    pub fn new(conf: MongoConfig) -> Self {
        if conf.enabled {
            info!(database = %conf.origin.database, "Summary of MongoDB database");
        }
        Self {
            conf,
            origin_client: None,
            target_client: None,
        }
    }

    pub fn origin_uri(&self) -> DocumentUri {
        DocumentUri::from_endpoint(SCHEME, &self.conf.origin)
    }

    pub fn target_uri(&self) -> DocumentUri {
        DocumentUri::from_endpoint(SCHEME, &self.conf.target)
    }

    pub fn connection_state(&self) -> (bool, bool) {
        (self.origin_client.is_some(), self.target_client.is_some())
    }

    fn client_for(&self, uri: &DocumentUri, side: &str) -> Result<Client, DriverError> {
        debug!(side, uri = ?uri, "Creating MongoDB client");
        Client::with_uri_str(uri.connection_string(self.conf.timeouts.connect()))
            .map_err(|err| DriverError::ConnectFailed(format!("{} client: {}", side, err)))
    }
}

impl BackendDriver for MongoDriver {
    fn name(&self) -> &'static str {
        "mongo"
    }

    fn slot(&self) -> Slot {
        Slot::Document
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        self.origin_client = None;
        self.target_client = None;

        if !self.conf.enabled {
            return Err(DriverError::NotEnabled);
        }

        self.origin_client = Some(self.client_for(&self.origin_uri(), "origin")?);
        self.target_client = Some(self.client_for(&self.target_uri(), "target")?);

        let mut ping_failure = None;
        let sides = [("origin", &self.origin_client), ("target", &self.target_client)];
        for (side, client) in sides {
            let Some(client) = client else { continue };
            match ping(client) {
                Ok(()) => debug!(side, "Pinged MongoDB deployment"),
                Err(err) if is_unreachable(&err) => {
                    return Err(DriverError::ConnectFailed(format!(
                        "{} unreachable: {}",
                        side, err
                    )));
                }
                Err(err) => {
                    warn!(side, error = %err, "MongoDB liveness check failed");
                    ping_failure
                        .get_or_insert(DriverError::PingFailed(format!("{}: {}", side, err)));
                }
            }
        }

        match ping_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn replicate(&mut self) -> Result<(), DriverError> {
        let (Some(origin), Some(target)) = (&self.origin_client, &self.target_client) else {
            return Err(DriverError::CopyFailed("not connected".into()));
        };

        let source = origin.database(&self.conf.origin.database);
        let dest = target.database(&self.conf.target.database);
        let stats = copy_database(&source, &dest, self.conf.backup)?;

        info!(
            database = %self.conf.origin.database,
            collections = stats.collections,
            documents = stats.documents,
            "Replication of MongoDB database was successful"
        );
        Ok(())
    }

    fn close(&mut self) {
        self.origin_client.take();
        self.target_client.take();
    }
}

fn ping(client: &Client) -> Result<(), MongoError> {
    client
        .database(ADMIN_DB)
        .run_command(doc! { "ping": 1 }, None)
        .map(|_| ())
}

/// No server answered at all, as opposed to a server rejecting the command.
fn is_unreachable(err: &MongoError) -> bool {
    matches!(*err.kind, ErrorKind::ServerSelection { .. })
}

fn copy_failed(context: &str) -> impl Fn(MongoError) -> DriverError + '_ {
    move |err| DriverError::CopyFailed(format!("{}: {}", context, err))
}

/// Every origin collection ends up present on the target, even an empty one.
fn copy_database(
    source: &Database,
    dest: &Database,
    mode: BackupMode,
) -> Result<CopyStats, DriverError> {
    let names = source
        .list_collection_names(None)
        .map_err(copy_failed("listing origin collections"))?;
    let existing = dest
        .list_collection_names(None)
        .map_err(copy_failed("listing target collections"))?;

    let mut stats = CopyStats::default();
    for name in names.iter().filter(|n| !n.starts_with("system.")) {
        if !existing.contains(name) {
            dest.create_collection(name, None)
                .map_err(copy_failed(name))?;
        }
        if mode == BackupMode::Full {
            stats.documents += copy_collection(source, dest, name)?;
        }
        stats.collections += 1;
    }
    Ok(stats)
}

/// Upserts every document by `_id`, so a rerun converges on the same target state.
fn copy_collection(source: &Database, dest: &Database, name: &str) -> Result<u64, DriverError> {
    let from = source.collection::<Document>(name);
    let to = dest.collection::<Document>(name);
    let upsert = ReplaceOptions::builder().upsert(true).build();

    let mut copied = 0;
    for document in from.find(None, None).map_err(copy_failed(name))? {
        let document = document.map_err(copy_failed(name))?;
        match document.get("_id") {
            Some(id) => {
                to.replace_one(doc! { "_id": id.clone() }, &document, upsert.clone())
                    .map_err(copy_failed(name))?;
            }
            None => {
                to.insert_one(&document, None).map_err(copy_failed(name))?;
            }
        }
        copied += 1;
    }
    debug!(collection = name, documents = copied, "Copied collection");
    Ok(copied)
}
