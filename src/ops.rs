use anyhow::{Context, Result};
use colored::*;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use std::path::Path;
use tracing::{debug, error, info, info_span, warn};

use crate::config::{Config, Endpoint};
use crate::drivers::{BackendDriver, register_drivers};
use crate::error::{DriverError, Severity};
use crate::registry::{Registry, Slot};
use crate::report::{BackendReport, RunReport, Stage};

/// Drive every registered backend through connect, replicate and close.
/// A failing backend never stops the others.
pub fn run_backends(registry: Registry) -> RunReport {
    let mut report = RunReport::default();
    for (slot, mut driver) in registry.into_active() {
        report.backends.push(run_backend(slot, driver.as_mut()));
    }
    report.finished_at = Some(chrono::Local::now());
    report
}

fn run_backend(slot: Slot, driver: &mut dyn BackendDriver) -> BackendReport {
    let backend = driver.name();
    let span = info_span!("backend", slot = %slot, driver = backend);
    let _guard = span.enter();

    let connected = driver.connect();
    let connect = Stage::from_result(&connected);

    // Nothing was opened, so there is nothing to close.
    if connected == Err(DriverError::NotEnabled) {
        info!("Backend is not enabled; skipping");
        return BackendReport {
            slot,
            backend: backend.to_string(),
            connect,
            replicate: Stage::Skipped,
        };
    }

    let replicate = match &connected {
        Ok(()) | Err(DriverError::PingFailed(_)) => {
            info!("Replicating");
            let replicated = driver.replicate();
            if let Err(err) = &replicated {
                error!(error = %err, "Replication failed");
            }
            Stage::from_result(&replicated)
        }
        Err(err) => {
            error!(error = %err, "Could not connect; skipping replication");
            Stage::Skipped
        }
    };

    driver.close();
    debug!("Closed connections");

    BackendReport {
        slot,
        backend: backend.to_string(),
        connect,
        replicate,
    }
}

pub fn do_run(config: &Config, only: &[Slot], report_path: Option<&Path>) -> Result<RunReport> {
    let mut registry = Registry::new();
    register_drivers(config, &mut registry, only).context("failed to register drivers")?;

    if registry.is_empty() {
        warn!("No backends selected for this run");
    }

    let report = run_backends(registry);
    print_summary(&report);

    if let Some(path) = report_path {
        let json = report.to_json().context("failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write run report to {}", path.display()))?;
        info!(path = %path.display(), "Wrote run report");
    }

    Ok(report)
}

fn print_summary(report: &RunReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Backend").add_attribute(Attribute::Bold),
            Cell::new("Slot").add_attribute(Attribute::Bold),
            Cell::new("Connect").add_attribute(Attribute::Bold),
            Cell::new("Replicate").add_attribute(Attribute::Bold),
            Cell::new("Detail").add_attribute(Attribute::Bold),
        ]);

    for b in &report.backends {
        let detail = [&b.connect, &b.replicate]
            .into_iter()
            .find_map(|stage| match stage {
                Stage::Warning { reason, .. } | Stage::Failed { reason, .. } => {
                    Some(reason.clone())
                }
                _ => None,
            })
            .unwrap_or_else(|| {
                if b.not_enabled() {
                    "not enabled".to_string()
                } else {
                    String::new()
                }
            });
        table.add_row(vec![
            Cell::new(&b.backend),
            Cell::new(b.slot.name()),
            stage_cell(&b.connect),
            stage_cell(&b.replicate),
            Cell::new(detail),
        ]);
    }

    println!("{}", table);

    match report.status() {
        Severity::Success | Severity::Skipped => println!(
            "{} {}",
            "✔".green().bold(),
            "Replication finished".green()
        ),
        Severity::Warning => println!(
            "{} {}",
            "!".yellow().bold(),
            "Replication finished with warnings".yellow()
        ),
        Severity::Failure => eprintln!(
            "{} {}",
            "✖".red().bold(),
            "Replication failed for at least one backend".red()
        ),
    }
}

fn stage_cell(stage: &Stage) -> Cell {
    match stage {
        Stage::Ok => Cell::new("ok").fg(Color::Green),
        Stage::Skipped => Cell::new("skipped"),
        Stage::Warning { kind, .. } => Cell::new(format!("{:?}", kind)).fg(Color::Yellow),
        Stage::Failed { kind, .. } => Cell::new(format!("{:?}", kind)).fg(Color::Red),
    }
}

pub fn do_backends(config: &Config) -> Result<()> {
    let mut registry = Registry::new();
    register_drivers(config, &mut registry, &[]).context("failed to register drivers")?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Slot", "Driver", "Enabled", "Origin", "Target"]);
    for (slot, driver) in registry.iter() {
        let (enabled, origin, target) = match slot {
            Slot::Relational => (
                config.postgres.enabled,
                &config.postgres.origin,
                &config.postgres.target,
            ),
            Slot::Document => (
                config.mongo.enabled,
                &config.mongo.origin,
                &config.mongo.target,
            ),
        };
        table.add_row(vec![
            slot.name().to_string(),
            driver.name().to_string(),
            if enabled { "yes" } else { "no" }.to_string(),
            describe(origin),
            describe(target),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn describe(endpoint: &Endpoint) -> String {
    if endpoint.host.is_empty() {
        return "-".to_string();
    }
    format!(
        "{}@{}:{}/{}",
        endpoint.user, endpoint.host, endpoint.port, endpoint.database
    )
}

pub fn do_version() {
    println!("{} {}", "dbreplicator".bold(), env!("CARGO_PKG_VERSION").cyan());
}
