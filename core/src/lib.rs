use std::sync::Arc;

use reportomat_common::{Clock, EventSink, Jitter};
use reportomat_database::JobRepository;
use reportomat_llm::LlmAdapter;
use reportomat_storage::ObjectStore;

pub mod pipeline;
pub mod report_reader;
pub mod upload;

pub use pipeline::process_claimed_job;
pub use report_reader::{get_report, ReportError, ReportView};
pub use upload::{enqueue_upload, UploadError, UploadOutcome, UploadRequest};

/// The component struct every entry point (HTTP handlers, the worker
/// loop) is built around -- the generalization of the teacher's
/// `Central`, but with its ambient `s3`/`db` fields replaced by traits
/// so a caller can assemble it from either real adapters or the fakes
/// in each crate's `testing` feature.
#[derive(Clone)]
pub struct Core {
    pub repo: JobRepository,
    pub storage: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub llm: Arc<dyn LlmAdapter>,
    pub llm_timeout: std::time::Duration,
    pub clock: Arc<dyn Clock>,
    pub jitter: Arc<dyn Jitter>,
    pub events: Arc<dyn EventSink>,
    pub log: slog::Logger,
}

impl Core {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: JobRepository,
        storage: Arc<dyn ObjectStore>,
        bucket: String,
        llm: Arc<dyn LlmAdapter>,
        llm_timeout: std::time::Duration,
        clock: Arc<dyn Clock>,
        jitter: Arc<dyn Jitter>,
        events: Arc<dyn EventSink>,
        log: slog::Logger,
    ) -> Core {
        Core { repo, storage, bucket, llm, llm_timeout, clock, jitter, events, log }
    }
}
