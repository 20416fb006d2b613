use std::time::Duration;

use anyhow::{bail, Result};

use crate::log::LogFormat;
use reportomat_types::WorkerId;

/// Storage (S3-compatible object store) configuration, enumerated per
/// §6. All five fields are required.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub request_timeout: Duration,
}

/// LLM provider configuration, enumerated per §4.3/§6.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Fake,
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(LlmProvider::OpenAi),
            "fake" => Ok(LlmProvider::Fake),
            other => {
                Err(format!("invalid LLM_PROVIDER {:?}; expected \"openai\" or \"fake\"", other))
            }
        }
    }
}

/// Worker pool configuration, enumerated per §4.8.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub worker_id: WorkerId,
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub llm_timeout: Duration,
    pub lock_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_statement_timeout: Duration,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub worker: WorkerConfig,
    pub log_format: LogFormat,
    pub log_level: slog::Level,
    pub http_bind_address: String,
}

/// `LOG_FORMAT`'s default when unset: human-readable in development,
/// machine-parseable bunyan JSON once built for release.
fn default_log_format() -> LogFormat {
    if cfg!(debug_assertions) {
        LogFormat::Term
    } else {
        LogFormat::Bunyan
    }
}

/// Accumulates every missing or invalid environment variable so
/// `Config::from_env` can fail fast with one error naming all of them,
/// rather than bailing on the first problem the way a chain of `?`
/// would. Mirrors the teacher's `config::load`, which collects context
/// via `anyhow::Context` rather than panicking deep in a handler.
struct EnvReader {
    problems: Vec<String>,
}

impl EnvReader {
    fn new() -> Self {
        EnvReader { problems: Vec::new() }
    }

    fn required(&mut self, key: &str) -> Option<String> {
        match std::env::var(key) {
            Ok(v) if !v.is_empty() => Some(v),
            Ok(_) => {
                self.problems.push(format!("{key} is set but empty"));
                None
            }
            Err(_) => {
                self.problems.push(format!("{key} is not set"));
                None
            }
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn optional_parsed<T: std::str::FromStr>(&mut self, key: &str) -> Option<T> {
        let raw = self.optional(key)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.problems.push(format!("{key}={raw:?} is not valid"));
                None
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.problems.is_empty() {
            Ok(())
        } else {
            bail!(
                "configuration is invalid; missing or bad environment variables:\n  - {}",
                self.problems.join("\n  - ")
            )
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let mut r = EnvReader::new();

        let database_url = r.required("DATABASE_URL");
        let _pepper = r.required("TOKEN_HASH_PEPPER");

        let endpoint = r.required("S3_ENDPOINT");
        let region = r.required("S3_REGION");
        let bucket = r.required("S3_BUCKET");
        let access_key_id = r.required("S3_ACCESS_KEY_ID");
        let secret_access_key = r.required("S3_SECRET_ACCESS_KEY");

        let provider = r
            .optional("LLM_PROVIDER")
            .map(|v| {
                v.parse::<LlmProvider>()
                    .map_err(|e| r_push(&mut r, e))
                    .unwrap_or(LlmProvider::OpenAi)
            })
            .unwrap_or(LlmProvider::OpenAi);

        let model = r
            .optional("LLM_MODEL")
            .unwrap_or_else(|| "gpt-5-mini".to_string());

        let api_key = r.optional("LLM_API_KEY");
        if provider == LlmProvider::OpenAi && api_key.is_none() {
            r.problems.push("LLM_API_KEY is not set (required unless LLM_PROVIDER=fake)".into());
        }
        if provider == LlmProvider::Fake && !cfg!(any(test, feature = "testing")) {
            r.problems.push(
                "LLM_PROVIDER=fake is not permitted outside test builds".into(),
            );
        }

        let llm_timeout_ms: u64 =
            r.optional_parsed("LLM_TIMEOUT_MS").unwrap_or(60_000);

        let worker_id = r
            .optional("WORKER_ID")
            .map(WorkerId)
            .unwrap_or_else(WorkerId::from_hostname_pid);
        let concurrency: usize =
            r.optional_parsed("WORKER_CONCURRENCY").unwrap_or(2);
        let poll_ms: u64 = r.optional_parsed("WORKER_POLL_MS").unwrap_or(1000);
        let worker_llm_timeout_ms: u64 = r
            .optional_parsed("WORKER_LLM_TIMEOUT_MS")
            .unwrap_or(llm_timeout_ms);

        let log_format = r
            .optional("LOG_FORMAT")
            .map(|v| {
                v.parse::<LogFormat>()
                    .map_err(|e| r_push(&mut r, e))
                    .unwrap_or_else(|_| default_log_format())
            })
            .unwrap_or_else(default_log_format);

        let log_level = r
            .optional("RUST_LOG")
            .map(|v| {
                v.parse::<slog::Level>()
                    .map_err(|_| {
                        r_push(
                            &mut r,
                            format!(
                                "RUST_LOG={v:?} is not a valid level; expected one of \
                                 critical|error|warning|info|debug|trace"
                            ),
                        )
                    })
                    .unwrap_or(slog::Level::Info)
            })
            .unwrap_or(slog::Level::Info);

        let http_bind_address = r
            .optional("HTTP_BIND_ADDRESS")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string());

        let db_statement_timeout_ms: u64 = r
            .optional_parsed("DB_STATEMENT_TIMEOUT_MS")
            .unwrap_or(worker_llm_timeout_ms + 5000);
        let s3_request_timeout_ms: u64 =
            r.optional_parsed("S3_REQUEST_TIMEOUT_MS").unwrap_or(30_000);

        r.finish()?;

        Ok(Config {
            database_url: database_url.unwrap(),
            db_statement_timeout: Duration::from_millis(db_statement_timeout_ms),
            storage: StorageConfig {
                endpoint: endpoint.unwrap(),
                region: region.unwrap(),
                bucket: bucket.unwrap(),
                access_key_id: access_key_id.unwrap(),
                secret_access_key: secret_access_key.unwrap(),
                request_timeout: Duration::from_millis(s3_request_timeout_ms),
            },
            llm: LlmConfig {
                provider,
                model,
                api_key,
                timeout: Duration::from_millis(llm_timeout_ms),
            },
            worker: WorkerConfig {
                worker_id,
                concurrency,
                poll_interval: Duration::from_millis(poll_ms),
                llm_timeout: Duration::from_millis(worker_llm_timeout_ms),
                lock_ttl: Duration::from_secs(
                    reportomat_types::defaults::LOCK_TTL_SECONDS as u64,
                ),
            },
            log_format,
            log_level,
            http_bind_address,
        })
    }
}

/// Helper so the `.map(...)` closures above can push a problem onto the
/// (borrowed-elsewhere) `EnvReader` without fighting the borrow checker
/// over a `&mut self` method call inside `.map`.
fn r_push(r: &mut EnvReader, problem: String) {
    r.problems.push(problem);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_both_values() {
        assert_eq!("bunyan".parse::<LogFormat>().unwrap(), LogFormat::Bunyan);
        assert_eq!("term".parse::<LogFormat>().unwrap(), LogFormat::Term);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn llm_provider_rejects_unknown_values() {
        assert!("bedrock".parse::<LlmProvider>().is_err());
    }
}
