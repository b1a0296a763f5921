use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialise logging. Without `debug` the level is pinned to `info`; with it
/// the default is `debug` and `RUST_LOG` may override it.
///
/// When `log_file` is given, events are also written to that file through a
/// non-blocking writer that lives for the rest of the process.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    let file = log_file.and_then(|path| {
        let name = path.file_name()?.to_owned();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        if let Err(err) = std::fs::create_dir_all(&dir) {
            eprintln!("cannot create log directory {}: {err}", dir.display());
            return None;
        }
        Some(tracing_appender::non_blocking(
            tracing_appender::rolling::never(dir, name),
        ))
    });

    match file {
        Some((writer, guard)) => {
            let _ = FILE_GUARD.set(guard);
            let _ = registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init();
        }
        None => {
            let _ = registry.try_init();
        }
    }
}
