use postgres::{Client, NoTls};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::BackendDriver;
use crate::config::{BackupMode, Endpoint, PostgresConfig};
use crate::error::DriverError;
use crate::registry::Slot;
use crate::utils::io;
use crate::utils::process::{CommandRunner, SystemRunner, ToolCommand, ToolStatus};

pub const PG_DUMP: &str = "pg_dump";
pub const PG_RESTORE: &str = "pg_restore";

/// Replicates through `pg_dump` / `pg_restore` via an intermediate backup file.
/// The client connections are only used to prove both endpoints are reachable.
pub struct PostgresDriver {
    conf: PostgresConfig,
    origin_conn: Option<Client>,
    target_conn: Option<Client>,
    runner: Box<dyn CommandRunner>,
    /// Fixed tool directory; `None` resolves it from the environment on replicate.
    tool_dir: Option<PathBuf>,
    backup_path: Option<PathBuf>,
}

impl PostgresDriver {
    pub fn new(conf: PostgresConfig) -> Self {
        Self::with_runner(conf, Box::new(SystemRunner))
    }

    pub fn with_runner(conf: PostgresConfig, runner: Box<dyn CommandRunner>) -> Self {
        if conf.enabled {
            info!(database = %conf.origin.database, "Summary of Postgres database");
        }
        Self {
            conf,
            origin_conn: None,
            target_conn: None,
            runner,
            tool_dir: None,
            backup_path: io::backup_path_from_env(),
        }
    }

    pub fn tool_dir(mut self, dir: PathBuf) -> Self {
        self.tool_dir = Some(dir);
        self
    }

    pub fn backup_path(mut self, path: Option<PathBuf>) -> Self {
        self.backup_path = path;
        self
    }

    /// Whether the (origin, target) handles are currently open.
    pub fn connection_state(&self) -> (bool, bool) {
        (self.origin_conn.is_some(), self.target_conn.is_some())
    }

    fn run_tool(&mut self, command: &ToolCommand) -> Result<(), String> {
        debug!(command = ?command, "Running tool");
        match self.runner.run(command) {
            Ok(ToolStatus::Success) => Ok(()),
            Ok(status) => {
                error!(program = command.program, status = %status, "Tool failed");
                Err(format!("`{}` {}", command.program, status))
            }
            Err(err) => {
                error!(
                    program = command.program,
                    error = %format!("{:#}", err),
                    "Tool could not be run"
                );
                Err(format!("{:#}", err))
            }
        }
    }
}

impl BackendDriver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn slot(&self) -> Slot {
        Slot::Relational
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        self.origin_conn = None;
        self.target_conn = None;

        if !self.conf.enabled {
            return Err(DriverError::NotEnabled);
        }

        let timeout = self.conf.timeouts.connect();
        let origin = ConnectParams::from_endpoint(&self.conf.origin);
        let target = ConnectParams::from_endpoint(&self.conf.target);

        self.origin_conn = Some(open(&origin, timeout, "origin")?);
        debug!("Origin-database connection: success");

        self.target_conn = Some(open(&target, timeout, "target")?);
        debug!("Target-database connection: success");

        Ok(())
    }

    fn replicate(&mut self) -> Result<(), DriverError> {
        let backup = self.backup_path.clone().ok_or_else(|| {
            DriverError::DumpFailed("HOME is not set; no place for the backup file".into())
        })?;
        let tool_dir = self.tool_dir.clone().unwrap_or_else(io::tool_dir_from_env);

        let dump = dump_command(&self.conf, &backup, &tool_dir);
        self.run_tool(&dump).map_err(DriverError::DumpFailed)?;

        let restore = restore_command(&self.conf, &backup, &tool_dir);
        self.run_tool(&restore).map_err(DriverError::RestoreFailed)?;

        info!(
            database = %self.conf.origin.database,
            "Replication of Postgres database was successful"
        );
        Ok(())
    }

    fn close(&mut self) {
        let sides = [
            ("origin", self.origin_conn.take()),
            ("target", self.target_conn.take()),
        ];
        for (side, conn) in sides {
            if let Some(client) = conn {
                if let Err(err) = client.close() {
                    warn!(side, error = %err, "Failed to close Postgres connection cleanly");
                }
            }
        }
    }
}

fn open(
    params: &ConnectParams,
    timeout: Option<Duration>,
    side: &str,
) -> Result<Client, DriverError> {
    let config = params.to_config(timeout)?;
    config.connect(NoTls).map_err(|err| {
        error!(side, error = %err, "Could not connect to Postgres");
        DriverError::ConnectFailed(format!("{} database: {}", side, err))
    })
}

/// The keyword/value set used to open one connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub user: String,
    pub password: String,
    pub port: String,
    pub dbname: String,
}

impl ConnectParams {
    pub fn from_endpoint(endpoint: &Endpoint) -> Self {
        Self {
            host: endpoint.host.clone(),
            user: endpoint.user.clone(),
            password: endpoint.password.clone(),
            port: endpoint.port.clone(),
            dbname: endpoint.database.clone(),
        }
    }

    pub fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("host", &self.host),
            ("user", &self.user),
            ("password", &self.password),
            ("port", &self.port),
            ("dbname", &self.dbname),
        ]
    }

    pub fn to_config(
        &self,
        connect_timeout: Option<Duration>,
    ) -> Result<postgres::Config, DriverError> {
        let port: u16 = self
            .port
            .trim()
            .parse()
            .map_err(|_| DriverError::ConnectFailed(format!("invalid port '{}'", self.port)))?;

        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .user(&self.user)
            .password(&self.password)
            .port(port)
            .dbname(&self.dbname);
        if let Some(limit) = connect_timeout {
            config.connect_timeout(limit);
        }
        Ok(config)
    }
}

/// `pg_dump -h H -F custom -p P -U U -d D -f FILE -v [-s]` against the origin.
pub fn dump_command(conf: &PostgresConfig, backup_path: &Path, tool_dir: &Path) -> ToolCommand {
    let origin = &conf.origin;
    let cmd = ToolCommand::new(PG_DUMP, tool_dir.to_path_buf())
        .arg("-h")
        .arg(&origin.host)
        .arg("-F")
        .arg("custom")
        .arg("-p")
        .arg(&origin.port)
        .arg("-U")
        .arg(&origin.user)
        .arg("-d")
        .arg(&origin.database)
        .arg("-f")
        .arg(backup_path.to_string_lossy())
        .arg("-v")
        .env("PGPASSWORD", &origin.password)
        .timeout(conf.timeouts.tool());

    match conf.backup {
        BackupMode::Schema => cmd.arg("-s"),
        BackupMode::Full => cmd,
    }
}

/// `pg_restore -h H -p P -U U -d D FILE -v` against the target.
pub fn restore_command(conf: &PostgresConfig, backup_path: &Path, tool_dir: &Path) -> ToolCommand {
    let target = &conf.target;
    ToolCommand::new(PG_RESTORE, tool_dir.to_path_buf())
        .arg("-h")
        .arg(&target.host)
        .arg("-p")
        .arg(&target.port)
        .arg("-U")
        .arg(&target.user)
        .arg("-d")
        .arg(&target.database)
        .arg(backup_path.to_string_lossy())
        .arg("-v")
        .env("PGPASSWORD", &target.password)
        .timeout(conf.timeouts.tool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn endpoint(n: u8) -> Endpoint {
        Endpoint {
            host: format!("h{}", n),
            user: format!("u{}", n),
            password: format!("p{}", n),
            port: "5432".into(),
            database: format!("d{}", n),
        }
    }

    fn conf(enabled: bool, backup: BackupMode) -> PostgresConfig {
        PostgresConfig {
            enabled,
            backup,
            origin: endpoint(1),
            target: endpoint(2),
            ..Default::default()
        }
    }

    /// Records every command and answers with scripted statuses.
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<ToolCommand>>>,
        statuses: Arc<Mutex<Vec<ToolStatus>>>,
    }

    impl Recorder {
        fn answering(statuses: Vec<ToolStatus>) -> Self {
            let rec = Recorder::default();
            *rec.statuses.lock().unwrap() = statuses;
            rec
        }

        fn programs(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().iter().map(|c| c.program).collect()
        }
    }

    impl CommandRunner for Recorder {
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

    fn driver(conf: PostgresConfig, runner: Recorder) -> PostgresDriver {
        PostgresDriver::with_runner(conf, Box::new(runner))
            .tool_dir(PathBuf::from("/opt/pg/bin"))
            .backup_path(Some(PathBuf::from("/home/ops/replicator_backup.dump")))
    }

    #[test]
    fn test_disabled_connect_leaves_handles_unset() {
        let mut pg = driver(conf(false, BackupMode::Full), Recorder::default());
        assert_eq!(pg.connect(), Err(DriverError::NotEnabled));
        assert_eq!(pg.connection_state(), (false, false));
    }

    #[test]
    fn test_params_do_not_mix_origin_and_target() {
        let c = conf(true, BackupMode::Full);
        let origin = ConnectParams::from_endpoint(&c.origin);
        let target = ConnectParams::from_endpoint(&c.target);

        let keys: Vec<&str> = origin.pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["host", "user", "password", "port", "dbname"]);

        for (_, value) in origin.pairs() {
            if value != "5432" {
                assert!(value.ends_with('1'));
                assert!(!target.pairs().iter().any(|(_, v)| *v == value));
            }
        }
        for (_, value) in target.pairs() {
            if value != "5432" {
                assert!(value.ends_with('2'));
            }
        }
    }

    #[test]
    fn test_invalid_port_fails_connect() {
        let mut c = conf(true, BackupMode::Full);
        c.origin.port = "not-a-port".into();
        let mut pg = driver(c, Recorder::default());
        assert!(matches!(pg.connect(), Err(DriverError::ConnectFailed(_))));
        assert_eq!(pg.connection_state(), (false, false));
        pg.close();
        pg.close();
    }

    #[test]
    fn test_unreachable_origin_fails_connect() {
        let mut c = conf(true, BackupMode::Full);
        c.origin.host = "127.0.0.1".into();
        c.origin.port = "1".into();
        c.timeouts.connect_secs = Some(2);
        let mut pg = driver(c, Recorder::default());
        match pg.connect() {
            Err(DriverError::ConnectFailed(reason)) => assert!(reason.starts_with("origin")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(pg.connection_state(), (false, false));
        pg.close();
    }

    #[test]
    fn test_dump_argv_full_backup() {
        let c = conf(true, BackupMode::Full);
        let backup = Path::new("/home/ops/replicator_backup.dump");
        let cmd = dump_command(&c, backup, Path::new("/usr/bin"));
        assert_eq!(
            cmd.argv(),
            vec![
                "pg_dump", "-h", "h1", "-F", "custom", "-p", "5432", "-U", "u1", "-d", "d1", "-f",
                "/home/ops/replicator_backup.dump", "-v",
            ]
        );
        assert_eq!(cmd.env_value("PGPASSWORD"), Some("p1"));
        assert_eq!(cmd.env_value("PATH"), Some("/usr/bin"));
        assert!(!cmd.argv().contains(&"p1"));
    }

    #[test]
    fn test_dump_argv_schema_only() {
        let c = conf(true, BackupMode::Schema);
        let cmd = dump_command(&c, Path::new("/tmp/b.dump"), Path::new("/usr/bin"));
        assert_eq!(cmd.argv().last(), Some(&"-s"));
    }

    #[test]
    fn test_restore_argv() {
        let c = conf(true, BackupMode::Schema);
        let cmd = restore_command(&c, Path::new("/tmp/b.dump"), Path::new("/usr/bin"));
        assert_eq!(
            cmd.argv(),
            vec![
                "pg_restore", "-h", "h2", "-p", "5432", "-U", "u2", "-d", "d2", "/tmp/b.dump", "-v",
            ]
        );
        assert_eq!(cmd.env_value("PGPASSWORD"), Some("p2"));
    }

    #[test]
    fn test_tool_timeout_is_forwarded() {
        let mut c = conf(true, BackupMode::Full);
        c.timeouts.tool_secs = Some(30);
        let cmd = restore_command(&c, Path::new("/tmp/b.dump"), Path::new("/usr/bin"));
        assert_eq!(cmd.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_replicate_runs_dump_then_restore() {
        let rec = Recorder::default();
        let mut pg = driver(conf(true, BackupMode::Full), rec.clone());
        assert_eq!(pg.replicate(), Ok(()));
        assert_eq!(rec.programs(), vec![PG_DUMP, PG_RESTORE]);
        let calls = rec.calls.lock().unwrap();
        assert!(calls.iter().all(|c| c.search_dir == PathBuf::from("/opt/pg/bin")));
    }

    #[test]
    fn test_dump_failure_skips_restore() {
        let rec = Recorder::answering(vec![ToolStatus::Failed(Some(1))]);
        let mut pg = driver(conf(true, BackupMode::Full), rec.clone());
        match pg.replicate() {
            Err(DriverError::DumpFailed(reason)) => assert!(reason.contains("status 1")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(rec.programs(), vec![PG_DUMP]);
    }

    #[test]
    fn test_restore_failure() {
        let rec = Recorder::answering(vec![ToolStatus::Success, ToolStatus::Failed(Some(2))]);
        let mut pg = driver(conf(true, BackupMode::Full), rec.clone());
        assert!(matches!(pg.replicate(), Err(DriverError::RestoreFailed(_))));
        assert_eq!(rec.programs(), vec![PG_DUMP, PG_RESTORE]);
    }

    #[test]
    fn test_missing_home_fails_dump() {
        let rec = Recorder::default();
        let mut pg = driver(conf(true, BackupMode::Full), rec.clone()).backup_path(None);
        assert!(matches!(pg.replicate(), Err(DriverError::DumpFailed(_))));
        assert!(rec.programs().is_empty());
    }

    #[test]
    fn test_close_without_connect_is_noop() {
        let mut pg = driver(conf(true, BackupMode::Full), Recorder::default());
        pg.close();
        pg.close();
        assert_eq!(pg.connection_state(), (false, false));
    }

    proptest! {
        /// `-s` appears in the dump argv exactly when the backup is schema-only.
        #[test]
        fn schema_flag_iff_schema_mode(
            schema in any::<bool>(),
            host in "[a-z][a-z0-9]{0,11}",
            db in "[a-z_]{1,12}",
        ) {
            let mut c = conf(true, if schema { BackupMode::Schema } else { BackupMode::Full });
            c.origin.host = host;
            c.origin.database = db;
            let cmd = dump_command(&c, Path::new("/tmp/b.dump"), Path::new("/usr/bin"));
            prop_assert_eq!(cmd.args.iter().any(|a| a == "-s"), schema);
        }
    }
}
