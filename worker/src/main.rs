use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use slog::{error, info, o, warn};

use reportomat_common::{make_log, Config, EventSink, LogEventSink, SystemClock, SystemJitter};
use reportomat_core::Core;
use reportomat_database::{Database, JobRepository};
use reportomat_llm::build_adapter;
use reportomat_storage::S3Store;
use reportomat_types::{JobId, WorkerId};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    let log = make_log("reportomat-worker", config.log_format, config.log_level);

    let db = Database::connect(&config.database_url, config.db_statement_timeout)
        .context("connecting to database")?;
    let repo = JobRepository::new(db);
    let storage = Arc::new(S3Store::connect(&config.storage).await);
    let llm = build_adapter(&config.llm);

    let core = Arc::new(Core::new(
        repo,
        storage,
        config.storage.bucket.clone(),
        llm,
        config.worker.llm_timeout,
        Arc::new(SystemClock),
        Arc::new(SystemJitter),
        Arc::new(LogEventSink::new(log.new(o!("component" => "events")))) as Arc<dyn EventSink>,
        log.new(o!("component" => "core")),
    ));

    let shutting_down = Arc::new(AtomicBool::new(false));

    let mut slots = Vec::new();
    for slot in 0..config.worker.concurrency {
        let core = Arc::clone(&core);
        let worker_id = config.worker.worker_id.clone();
        let shutting_down = Arc::clone(&shutting_down);
        let poll_interval = config.worker.poll_interval;
        let lock_ttl = config.worker.lock_ttl;
        let slot_log = log.new(o!("component" => "slot", "slot" => slot as i64));
        slots.push(tokio::task::spawn(async move {
            run_slot(core, worker_id, shutting_down, poll_interval, lock_ttl, slot_log).await;
        }));
    }

    wait_for_shutdown_signal(log.new(o!("component" => "signal"))).await;
    info!(log, "shutdown signal received; draining in-flight work");
    shutting_down.store(true, Ordering::SeqCst);

    for slot in slots {
        if let Err(e) = slot.await {
            error!(log, "worker slot task panicked"; "error" => %e);
        }
    }

    info!(log, "worker shut down cleanly");
    Ok(())
}

/// One claim/process/finalize cycle per slot, per §4.8's state machine
/// (`idle -> claimed -> running -> finalizing -> idle`). The heartbeat
/// ticker runs alongside the processor and is aborted once it returns,
/// mirroring the way the teacher spawns a dedicated background task
/// per concern (`server/src/main.rs`'s `t_assign`/`t_workers` tasks)
/// rather than interleaving everything in one loop.
async fn run_slot(
    core: Arc<Core>,
    worker_id: WorkerId,
    shutting_down: Arc<AtomicBool>,
    poll_interval: Duration,
    lock_ttl: Duration,
    log: slog::Logger,
) {
    while !shutting_down.load(Ordering::SeqCst) {
        let claimed = match core.repo.claim(&worker_id, core.clock.now()) {
            Ok(Some(c)) => c,
            Ok(None) => {
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            Err(e) => {
                error!(log, "claim failed"; "error" => %e);
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        let heartbeat_core = Arc::clone(&core);
        let heartbeat_worker_id = worker_id.clone();
        let heartbeat_interval = lock_ttl / 3;
        let heartbeat_job_id = claimed.job.id.clone();
        let heartbeat_log = log.clone();

        let heartbeat_handle = tokio::task::spawn(async move {
            loop {
                tokio::time::sleep(heartbeat_interval).await;
                let jid: JobId = match heartbeat_job_id.parse() {
                    Ok(j) => j,
                    Err(_) => break,
                };
                match heartbeat_core.repo.heartbeat(
                    jid,
                    &heartbeat_worker_id,
                    heartbeat_core.clock.now(),
                ) {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(heartbeat_log, "lease lost; aborting heartbeat");
                        break;
                    }
                    Err(e) => {
                        error!(heartbeat_log, "heartbeat failed"; "error" => %e);
                        break;
                    }
                }
            }
        });

        reportomat_core::process_claimed_job(&core, claimed).await;
        heartbeat_handle.abort();
    }
}

async fn wait_for_shutdown_signal(log: slog::Logger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("installing a SIGTERM handler cannot fail");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!(log, "received SIGINT"),
            _ = sigterm.recv() => info!(log, "received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!(log, "received ctrl-c");
    }
}
