pub mod error;
pub mod models;
mod pool;
mod repository;
pub mod schema;

pub use error::{classify_diesel_error, OResult, OperationError};
pub use models::{ClaimedJob, FileRow, NewFile, NewProcessingJob, ProcessingJobRow};
pub use pool::{Database, PgPool, PgPooled};
pub use repository::{EnqueueOutcome, FileContext, JobRepository};
