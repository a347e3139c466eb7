//! Testcontainers setup for MongoDB.

use mongodb::bson::{Document, doc};
use mongodb::sync::Client;
use std::thread;
use std::time::Duration;
use testcontainers::{Container, GenericImage, clients::Cli, core::WaitFor};

use dbreplicator::config::{Endpoint, MongoConfig, Timeouts};

const MONGO_PORT: u16 = 27017;
pub const ROOT_USER: &str = "root";
pub const ROOT_PASSWORD: &str = "root-secret";
pub const APP_USER: &str = "app";
pub const APP_PASSWORD: &str = "app-secret";

/// Official mongo:7 image with a root account.
///
/// The entrypoint runs a private mongod for the init scripts before the real
/// one starts, so "Waiting for connections" shows up twice. Use
/// [`MongoServer::start`] to wait for the second one.
pub fn mongo_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("mongo", "7")
        .with_exposed_port(MONGO_PORT)
        .with_env_var("MONGO_INITDB_ROOT_USERNAME", ROOT_USER)
        .with_env_var("MONGO_INITDB_ROOT_PASSWORD", ROOT_PASSWORD)
        .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"));
    docker.run(image)
}

/// A running server plus a root client for seeding and inspection.
pub struct MongoServer<'a> {
    #[allow(dead_code)] // Kept alive for container lifetime
    container: Container<'a, GenericImage>,
    pub port: u16,
    pub root: Client,
}

impl<'a> MongoServer<'a> {
    pub fn start(docker: &'a Cli) -> Self {
        let container = mongo_container(docker);
        let port = container.get_host_port_ipv4(MONGO_PORT);
        let uri = format!(
            "mongodb://{}:{}@127.0.0.1:{}/?serverSelectionTimeoutMS=1000",
            ROOT_USER, ROOT_PASSWORD, port
        );
        let root = Client::with_uri_str(uri).expect("root client");

        let mut attempts = 0;
        while let Err(err) = root.database("admin").run_command(doc! { "ping": 1 }, None) {
            attempts += 1;
            assert!(attempts < 60, "mongod never became ready: {}", err);
            thread::sleep(Duration::from_millis(500));
        }

        Self {
            container,
            port,
            root,
        }
    }

    /// Creates the application account inside `database`, which is also the
    /// database the driver authenticates against.
    pub fn create_app_user(&self, database: &str) {
        self.root
            .database(database)
            .run_command(
                doc! {
                    "createUser": APP_USER,
                    "pwd": APP_PASSWORD,
                    "roles": [{ "role": "readWrite", "db": database }],
                },
                None,
            )
            .expect("createUser");
    }

    pub fn endpoint(&self, database: &str, password: &str) -> Endpoint {
        Endpoint {
            host: "127.0.0.1".into(),
            user: APP_USER.into(),
            password: password.into(),
            port: self.port.to_string(),
            database: database.into(),
        }
    }

    pub fn config(&self, origin: Endpoint, target: Endpoint) -> MongoConfig {
        MongoConfig {
            enabled: true,
            origin,
            target,
            timeouts: Timeouts {
                connect_secs: Some(5),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn collection(&self, database: &str, name: &str) -> mongodb::sync::Collection<Document> {
        self.root.database(database).collection::<Document>(name)
    }
}
