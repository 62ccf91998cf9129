//! Process-wide `tracing` setup: stderr plus a size-rotated desktop log file.

use std::{
    env,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use tracing_subscriber::{
    fmt::{self, format::Writer, time::FormatTime, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{
    runtime_paths::resolve_desktop_log_path, DESKTOP_LOG_FILE, DESKTOP_LOG_FILTER_ENV,
    DESKTOP_LOG_MAX_BYTES, LOG_BACKUP_COUNT,
};

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// First non-empty value of the desktop filter variable, then `RUST_LOG`.
pub fn filter_directives<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    [DESKTOP_LOG_FILTER_ENV, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|error| {
        eprintln!("invalid log filter {directives:?}: {error}; using {DEFAULT_LOG_FILTER}");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}

/// Installs the global subscriber. Returns the log file path when file
/// logging could be set up.
pub fn init_logging(root_dir: Option<PathBuf>) -> Option<PathBuf> {
    let directives = filter_directives(|key| env::var(key).ok());
    let log_path = resolve_desktop_log_path(root_dir, DESKTOP_LOG_FILE);

    let file_writer =
        match RotatingFileWriter::open(&log_path, DESKTOP_LOG_MAX_BYTES, LOG_BACKUP_COUNT) {
            Ok(writer) => Some(writer),
            Err(error) => {
                eprintln!(
                    "failed to open desktop log {}: {error}; logging to stderr only",
                    log_path.display()
                );
                None
            }
        };
    let file_enabled = file_writer.is_some();
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_ansi(false)
            .with_timer(LocalTimestamp)
            .with_writer(writer)
    });
    let stderr_layer = fmt::layer()
        .with_timer(LocalTimestamp)
        .with_writer(io::stderr);

    if let Err(error) = tracing_subscriber::registry()
        .with(build_filter(&directives))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("logging was already initialized: {error}");
        return None;
    }

    file_enabled.then_some(log_path)
}

#[derive(Debug)]
struct RotatingFile {
    path: PathBuf,
    file: Option<File>,
    written: u64,
    max_bytes: u64,
    backups: usize,
}

impl RotatingFile {
    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;
        if self.backups > 0 {
            for index in (1..self.backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            match fs::rename(&self.path, self.backup_path(1)) {
                Ok(()) => {}
                // Removed or moved away from under us; nothing to keep.
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => return Err(error),
            }
        }
        self.file = Some(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?,
        );
        self.written = 0;
        Ok(())
    }

    fn write_record(&mut self, buf: &[u8]) -> io::Result<()> {
        let incoming = buf.len() as u64;
        if self.written > 0 && self.written.saturating_add(incoming) > self.max_bytes {
            if let Err(error) = self.rotate() {
                eprintln!(
                    "failed to rotate desktop log {}: {error}; appending instead",
                    self.path.display()
                );
                self.written = 0;
                self.file = None;
            }
        }
        if self.file.is_none() {
            self.file = Some(open_append(&self.path)?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        self.written = self.written.saturating_add(incoming);
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append-only log file that starts over once it exceeds `max_bytes`,
/// keeping `backups` older generations as `<name>.1` (newest) to `<name>.N`.
#[derive(Debug, Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl RotatingFileWriter {
    pub fn open(path: &Path, max_bytes: u64, backups: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            inner: Arc::new(Mutex::new(RotatingFile {
                path: path.to_path_buf(),
                file: Some(file),
                written,
                max_bytes: max_bytes.max(1),
                backups,
            })),
        })
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_record(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .file
            .as_mut()
        {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_prefers_desktop_variable_then_rust_log() {
        let both = |key: &str| match key {
            "TALLY_DESKTOP_LOG" => Some("startup=debug".to_string()),
            "RUST_LOG" => Some("warn".to_string()),
            _ => None,
        };
        assert_eq!(filter_directives(both), "startup=debug");

        let rust_log_only = |key: &str| (key == "RUST_LOG").then(|| "warn".to_string());
        assert_eq!(filter_directives(rust_log_only), "warn");

        let blank = |_: &str| Some("  ".to_string());
        assert_eq!(filter_directives(blank), "info");
    }

    #[test]
    fn rotation_keeps_a_bounded_number_of_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("desktop.log");
        let mut writer = RotatingFileWriter::open(&path, 16, 2).unwrap();

        for line in ["first line 0001\n", "second line 002\n", "third line 0003\n", "fourth line 004\n"] {
            writer.write_all(line.as_bytes()).unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "fourth line 004\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("logs").join("desktop.log.1")).unwrap(),
            "third line 0003\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("logs").join("desktop.log.2")).unwrap(),
            "second line 002\n"
        );
        assert!(!dir.path().join("logs").join("desktop.log.3").exists());
    }

    #[test]
    fn writing_resumes_after_log_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desktop.log");
        let mut writer = RotatingFileWriter::open(&path, 8, 2).unwrap();

        writer.write_all(b"first\n").unwrap();
        fs::remove_file(&path).unwrap();
        for line in ["second\n", "third\n", "fourth\n"] {
            writer.write_all(line.as_bytes()).unwrap();
        }

        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "fourth\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("desktop.log.1")).unwrap(),
            "third\n"
        );
    }

    #[test]
    fn reopening_continues_from_existing_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desktop.log");
        fs::write(&path, "0123456789").unwrap();

        let mut writer = RotatingFileWriter::open(&path, 12, 1).unwrap();
        writer.write_all(b"abc").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "abc");
        assert_eq!(
            fs::read_to_string(dir.path().join("desktop.log.1")).unwrap(),
            "0123456789"
        );
    }
}
