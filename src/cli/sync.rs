//! Sync commands: pull, push, sync, resolve, watch and test.
//!
//! The snapshot file named on the command line is the local store. It is
//! rewritten only when an operation hands back a snapshot to adopt.

use std::path::Path;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::{debug, warn};

use super::context::{load_snapshot, save_snapshot, CliContext};
use super::output::{or_dash, print_field, print_header, print_hints, print_ok, print_warn};
use crate::backend::BackendType;
use crate::models::ConflictData;
use crate::sync::{Resolution, SyncOutcome};

pub fn handle_pull_command(ctx: &CliContext, file: &Path) -> Result<()> {
    ctx.unlock()?;
    let local = load_snapshot(file)?;
    let outcome = ctx.runtime.block_on(ctx.manager.pull(&local))?;
    report_outcome(&outcome, file)
}

pub fn handle_push_command(ctx: &CliContext, file: &Path) -> Result<()> {
    ctx.unlock()?;
    let local = load_snapshot(file)?;
    let outcome = ctx.runtime.block_on(ctx.manager.push(&local))?;
    report_outcome(&outcome, file)
}

pub fn handle_sync_command(ctx: &CliContext, file: &Path) -> Result<()> {
    ctx.unlock()?;
    let local = load_snapshot(file)?;
    let outcome = ctx.runtime.block_on(ctx.manager.sync(&local))?;
    report_outcome(&outcome, file)
}

pub fn handle_resolve_command(ctx: &CliContext, resolution: Resolution, file: &Path) -> Result<()> {
    ctx.unlock()?;
    let local = load_snapshot(file)?;
    let outcome = ctx
        .runtime
        .block_on(ctx.manager.resolve_conflict(resolution, &local))?;
    report_outcome(&outcome, file)
}

/// Sync `file` on every auto-sync tick until Ctrl-C.
pub fn handle_watch_command(ctx: &CliContext, file: &Path) -> Result<()> {
    ctx.unlock()?;
    let minutes = ctx.manager.get_config().sync_interval_minutes;
    println!("Syncing {} every {} minute(s). Press Ctrl-C to stop.", file.display(), minutes);

    let mut events = ctx.manager.subscribe();
    ctx.runtime.spawn(async move {
        while let Ok(event) = events.recv().await {
            debug!(status = %event.status, message = ?event.message, "Sync status");
        }
    });

    ctx.runtime.block_on(async {
        let mut ticks = ctx.manager.start_auto_sync();
        loop {
            tokio::select! {
                tick = ticks.recv() => {
                    let Some(tick) = tick else { break };
                    debug!(sequence = tick.sequence, "Auto-sync tick");
                    let result = match load_snapshot(file) {
                        Ok(local) => ctx.manager.sync(&local).await,
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(outcome) => {
                            if let Err(e) = report_outcome(&outcome, file) {
                                warn!(error = %e, "Auto-sync needs attention");
                            }
                        }
                        Err(e) => print_warn(&format!("Sync failed: {}", e.user_message())),
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        ctx.manager.stop_auto_sync();
    });
    Ok(())
}

pub fn handle_test_command(ctx: &CliContext, backend: Option<BackendType>) -> Result<()> {
    let status = ctx.runtime.block_on(ctx.manager.test_connection(backend))?;
    let target = backend.unwrap_or(ctx.manager.get_config().backend_type);

    print_header(&format!("BACKEND {}", target.as_str().to_uppercase()));
    if !status.connected {
        print_warn("Reachable, but not usable with the current settings");
        return Err(eyre!("Connection test failed"));
    }
    print_ok("Connected");
    print_field("Remote data", if status.has_data { "yes" } else { "no" });
    print_field("Last updated", or_dash(status.last_updated.as_deref()));
    print_field("Pushed by", or_dash(status.device_id.as_deref()));
    if let Some(version) = status.version {
        print_field("Format version", &version.to_string());
    }
    Ok(())
}

/// Print an outcome and write any adopted snapshot to `file`.
fn report_outcome(outcome: &SyncOutcome, file: &Path) -> Result<()> {
    let file_arg = file.display().to_string();
    match outcome {
        SyncOutcome::NoRemoteData => {
            print_ok("Nothing stored remotely yet");
            print_hints(&[&format!("Run: keysync push {}", file_arg)]);
        }
        SyncOutcome::InSync => print_ok("Already in sync"),
        SyncOutcome::LocalAhead => {
            print_ok("Remote unchanged since the last sync; local file has newer changes");
            print_hints(&[&format!("Run: keysync push {}", file_arg)]);
        }
        SyncOutcome::Pushed { timestamp } => print_ok(&format!("Pushed at {}", timestamp)),
        SyncOutcome::Conflict { conflict } => {
            print_conflict(conflict);
            print_hints(&[
                &format!("keysync resolve local {}   keep this file", file_arg),
                &format!("keysync resolve remote {}  take the remote copy", file_arg),
                &format!("keysync resolve merge {}   combine both", file_arg),
            ]);
            return Err(eyre!("Sync conflict must be resolved"));
        }
        SyncOutcome::Resolved {
            resolution,
            snapshot,
            timestamp,
        } => {
            if *resolution != Resolution::Local {
                save_snapshot(file, snapshot)?;
                print_ok(&format!("Wrote {} keys to {}", snapshot.key_count(), file_arg));
            }
            match timestamp {
                Some(ts) => print_ok(&format!("Resolved with {}, pushed at {}", resolution, ts)),
                None => print_ok(&format!("Resolved with {}", resolution)),
            }
        }
    }
    Ok(())
}

fn print_conflict(conflict: &ConflictData) {
    print_header("CONFLICT");
    for (label, version) in [
        ("Local", &conflict.local_version),
        ("Remote", &conflict.remote_version),
    ] {
        print_field(
            label,
            &format!(
                "{} keys, {} (device {})",
                version.key_count, version.timestamp, version.device_id
            ),
        );
    }
}
