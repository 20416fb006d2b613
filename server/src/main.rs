use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use dropshot::{ApiDescription, ConfigDropshot, HttpServerStarter};
use slog::{info, o};

use reportomat_common::{make_log, Config, EventSink, LogEventSink, SystemClock, SystemJitter};
use reportomat_core::Core;
use reportomat_database::{Database, JobRepository};
use reportomat_llm::build_adapter;
use reportomat_storage::S3Store;
use reportomat_types::MAX_FILE_SIZE_BYTES;

mod api;

/// Headroom above the app-level size check (§4.6 step 2) so dropshot's
/// own body cap never trips first -- otherwise `UploadError::FileTooLarge`
/// could never actually fire over HTTP.
const REQUEST_BODY_HEADROOM_BYTES: u64 = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    let log = make_log("reportomat-server", config.log_format, config.log_level);

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
        config.llm.timeout,
        Arc::new(SystemClock),
        Arc::new(SystemJitter),
        Arc::new(LogEventSink::new(log.new(o!("component" => "events")))) as Arc<dyn EventSink>,
        log.new(o!("component" => "core")),
    ));

    let mut ad = ApiDescription::new();
    ad.register(api::files::upload_file)
        .map_err(|e| anyhow!("registering upload_file: {e}"))?;
    ad.register(api::files::get_file_report)
        .map_err(|e| anyhow!("registering get_file_report: {e}"))?;

    let bind_address = config
        .http_bind_address
        .parse()
        .context("parsing HTTP_BIND_ADDRESS")?;

    let server = HttpServerStarter::new(
        &ConfigDropshot {
            request_body_max_bytes: (MAX_FILE_SIZE_BYTES + REQUEST_BODY_HEADROOM_BYTES) as usize,
            bind_address,
            ..Default::default()
        },
        ad,
        core,
        &log,
    )
    .map_err(|e| anyhow!("server startup failure: {:?}", e))?;

    info!(log, "listening"; "bind_address" => %config.http_bind_address);
    server.start().await.map_err(|e| anyhow!("server stopped: {e}"))
}
