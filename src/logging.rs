use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

pub struct LogGuard {
    log_file: Option<Utf8PathBuf>,
    _file_guard: Option<WorkerGuard>,
}

impl LogGuard {
    pub fn log_file(&self) -> Option<&Utf8Path> {
        self.log_file.as_deref()
    }
}

pub fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("crunchy_{}.log", now.format("%Y%m%d_%H%M%S"))
}

pub fn init(log_dir: &Utf8Path, verbose: bool) -> LogGuard {
    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let console_filter = EnvFilter::builder()
        .with_default_directive(console_level.into())
        .from_env_lossy();
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let mut guard = LogGuard {
        log_file: None,
        _file_guard: None,
    };
    let mut setup_warning = None;

    let file_layer = match fs::create_dir_all(log_dir.as_std_path()) {
        Ok(()) => {
            let file_name = log_file_name(chrono::Local::now());
            let appender = tracing_appender::rolling::never(log_dir.as_std_path(), &file_name);
            let (writer, file_guard) = tracing_appender::non_blocking(appender);
            guard.log_file = Some(log_dir.join(&file_name));
            guard._file_guard = Some(file_guard);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        Err(err) => {
            setup_warning = Some(format!("could not create log directory {log_dir}: {err}"));
            None
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    if let Some(message) = setup_warning {
        tracing::warn!("{message}");
    }
    guard
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn log_file_name_is_timestamped() {
        let now = chrono::Local
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .single()
            .unwrap();
        assert_eq!(log_file_name(now), "crunchy_20240309_070501.log");
    }
}
