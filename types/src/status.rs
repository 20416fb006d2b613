use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A file's lifecycle state. `uploading` and `processing_run` are kept
/// as distinct names (see DESIGN.md's resolution of the spec's open
/// question) so neither is ever confused with the other in logs.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploading,
    Queued,
    ProcessingRun,
    Succeeded,
    Failed,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        use FileStatus::*;
        match self {
            Uploading => "uploading",
            Queued => "queued",
            ProcessingRun => "processing_run",
            Succeeded => "succeeded",
            Failed => "failed",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A file's on-disk extension, the only two the upload enqueuer
/// accepts.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum FileExtension {
    Txt,
    Vtt,
}

impl FileExtension {
    pub fn as_str(self) -> &'static str {
        match self {
            FileExtension::Txt => "txt",
            FileExtension::Vtt => "vtt",
        }
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(FileExtension::Txt),
            "vtt" => Some(FileExtension::Vtt),
            _ => None,
        }
    }
}

/// A processing job's lifecycle state.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        use JobStatus::*;
        match self {
            Queued => "queued",
            Processing => "processing",
            Succeeded => "succeeded",
            Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
