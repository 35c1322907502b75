pub mod config;
pub mod endpoints;
pub mod generation;
pub mod history;
pub mod inference;
pub mod telemetry;

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "MODELCURL_DATA_DIR";

/// Return the directory holding endpoints, history, config and logs.
///
/// - `$MODELCURL_DATA_DIR` when set
/// - otherwise the platform config directory + `modelcurl`
///   (`~/.config/modelcurl` on Linux, `~/Library/Application Support/modelcurl` on macOS)
///
/// Falls back to `~/.modelcurl/` only if none of the above can be resolved.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(config::expand_tilde(&dir));
        }
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("modelcurl");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".modelcurl")
}

/// Path of the request-history database (creates the data directory).
pub fn resolve_history_path() -> std::io::Result<String> {
    history_path_in(&data_dir())
}

fn history_path_in(dir: &Path) -> std::io::Result<String> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.join("history.db").to_string_lossy().into_owned())
}

/// Initialize the tracing subscriber, writing structured logs to the data directory.
///
/// On each startup:
/// 1. Rotates existing logs (modelcurl.log → .1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh modelcurl.log with a line-flushing writer.
/// 3. Logs a startup banner with the data directory path.
///
/// `RUST_LOG` wins over `log_filter`; the default is `modelcurl=info,warn`.
/// Returns the log file path.
pub fn init_tracing(log_filter: Option<&str>) -> std::io::Result<PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir();
    std::fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("modelcurl.log");
    rotate_log_file(&log_path, 3);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(log_filter.unwrap_or("modelcurl=info,warn"))
            .unwrap_or_else(|_| EnvFilter::new("modelcurl=info,warn"))
    });

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(FlushingWriter::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| std::io::Error::other(format!("tracing already initialized: {e}")))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %log_dir.display(),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== ModelCurl starting ==="
    );
    Ok(log_path)
}

/// Rotate log files: `modelcurl.log` → `modelcurl.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    // Shift: .{n-1} → .{n}
    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write, so
/// each log line is on disk even if the process dies mid-stream.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_rotate_log_file_shifts_and_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("modelcurl.log");
        for (suffix, body) in [("", "current"), (".1", "one"), (".2", "two"), (".3", "three")] {
            std::fs::write(format!("{}{suffix}", base.display()), body).unwrap();
        }

        rotate_log_file(&base, 3);

        assert!(!base.exists());
        let read = |suffix: &str| std::fs::read_to_string(format!("{}{suffix}", base.display())).unwrap();
        assert_eq!(read(".1"), "current");
        assert_eq!(read(".2"), "one");
        assert_eq!(read(".3"), "two");
    }

    #[test]
    fn test_rotate_log_file_with_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("modelcurl.log");
        std::fs::write(&base, "current").unwrap();

        rotate_log_file(&base, 3);

        let rotated = std::fs::read_to_string(format!("{}.1", base.display())).unwrap();
        assert_eq!(rotated, "current");
    }

    #[test]
    fn test_history_path_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("nested").join("modelcurl");
        let path = history_path_in(&data).unwrap();
        assert!(data.is_dir());
        assert!(path.ends_with("history.db"));
    }

    #[test]
    fn test_history_path_reports_unwritable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        assert!(history_path_in(&blocker.join("modelcurl")).is_err());
    }

    #[test]
    fn test_flushing_writer_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = FlushingWriter::new(file);
        writer.write_all(b"line\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line\n");
    }
}
