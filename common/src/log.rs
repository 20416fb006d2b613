use slog::Drain;

/// Which drain backs the process logger. Production wants bunyan-format
/// JSON lines (machine-parseable); local development wants the
/// human-readable term format. Mirrors the teacher's `make_log` helper,
/// generalized to take the format as a parameter instead of hard-coding
/// bunyan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Bunyan,
    Term,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bunyan" => Ok(LogFormat::Bunyan),
            "term" => Ok(LogFormat::Term),
            other => Err(format!(
                "invalid LOG_FORMAT {:?}; expected \"bunyan\" or \"term\"",
                other
            )),
        }
    }
}

/// Builds the process-wide logger. `level` (read from `RUST_LOG` by
/// `Config::from_env`) filters records before they reach the drain, the
/// way the teacher's `make_log` is the single place a process decides
/// how and how much it logs.
pub fn make_log(name: &str, format: LogFormat, level: slog::Level) -> slog::Logger {
    match format {
        LogFormat::Bunyan => {
            let drain = slog_bunyan::default(std::io::stdout()).fuse();
            let drain = slog::LevelFilter::new(drain, level).fuse();
            let drain = slog_async::Async::new(drain).build().fuse();
            slog::Logger::root(drain, slog::o!("name" => name.to_string()))
        }
        LogFormat::Term => {
            let decorator = slog_term::TermDecorator::new().build();
            let drain = slog_term::FullFormat::new(decorator).build().fuse();
            let drain = slog::LevelFilter::new(drain, level).fuse();
            let drain = slog_async::Async::new(drain).build().fuse();
            slog::Logger::root(drain, slog::o!("name" => name.to_string()))
        }
    }
}
