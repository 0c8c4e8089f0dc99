//! # Logging Setup
//!
//! Server side: a `tracing` subscriber writing INFO and above both to the
//! console and to a fresh `<output_filename>_server.txt` file. Client side:
//! a plain append-mode text file the client writes its own lines into.

use crate::config::FedConfig;
use crate::utils::naming::{create_unique, ensure_dir};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_EXT: &str = ".txt";

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("A global logger is already installed: {0}")]
    AlreadyInitialized(#[from] TryInitError),
}

/// Builds the server subscriber without installing it: console output on
/// stderr plus `log_path`, opened for appending. `RUST_LOG` overrides the
/// default `info` filter.
pub fn server_subscriber(log_path: &Path) -> Result<impl Subscriber + Send + Sync + 'static, LoggingError> {
    let log_file = OpenOptions::new().create(true).append(true).open(log_path)?;
    Ok(server_subscriber_with_console(log_file, io::stderr))
}

/// Same as [`server_subscriber`] with an already open log file and a
/// caller-chosen console writer.
pub fn server_subscriber_with_console<W>(log_file: File, console: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(console)
                .with_target(false)
                .with_thread_ids(false)
                .compact(),
        )
        .with(
            fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_target(false),
        )
}

/// Creates a unique server log file under `cfg.output_dirname`, installs
/// the stderr + file subscriber globally and returns the log file path.
///
/// The file is created before installation, so a second call leaves a new
/// empty file behind and fails with [`LoggingError::AlreadyInitialized`].
pub fn create_custom_logger(cfg: &FedConfig) -> Result<PathBuf, LoggingError> {
    ensure_dir(&cfg.output_dirname)?;
    let stem = format!("{}_server", cfg.output_filename);
    let (log_path, log_file) = create_unique(&cfg.output_dirname, &stem, LOG_FILE_EXT)?;

    server_subscriber_with_console(log_file, io::stderr).try_init()?;
    tracing::info!(path = %log_path.display(), "server log initialized");
    Ok(log_path)
}

/// A client's own log file, opened for appending.
#[derive(Debug)]
pub struct ClientLog {
    path: PathBuf,
    file: File,
}

impl ClientLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_file(self) -> File {
        self.file
    }
}

impl Write for ClientLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Creates `dir` if needed and opens a unique `<output_filename>.txt` in it.
pub fn client_log(dir: impl AsRef<Path>, output_filename: &str) -> Result<ClientLog, LoggingError> {
    let dir = dir.as_ref();
    ensure_dir(dir)?;
    let (path, file) = create_unique(dir, output_filename, LOG_FILE_EXT)?;
    tracing::debug!(path = %path.display(), "opened client log");
    Ok(ClientLog { path, file })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn client_logs_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("clients");

        let mut first = client_log(&log_dir, "client_0").unwrap();
        writeln!(first, "round 1").unwrap();
        let second = client_log(&log_dir, "client_0").unwrap();

        assert_eq!(first.path(), log_dir.join("client_0.txt"));
        assert_eq!(second.path(), log_dir.join("client_0_1.txt"));
        assert_eq!(fs::read_to_string(first.path()).unwrap(), "round 1\n");
    }

    #[test]
    fn server_subscriber_writes_to_file() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("result_server.txt");
        let subscriber = server_subscriber(&log_path).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("aggregation finished");
        });

        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("aggregation finished"));
        assert!(!content.contains('\u{1b}'));
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn console_and_file_both_receive_events() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("run_server.txt");
        let file = File::create(&log_path).unwrap();
        let console = SharedBuf::default();
        let writer = console.clone();
        let subscriber = server_subscriber_with_console(file, move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(round = 4, "round complete");
            tracing::debug!("below the default level");
        });

        let console_text = String::from_utf8(console.0.lock().unwrap().clone()).unwrap();
        let file_text = fs::read_to_string(&log_path).unwrap();
        if std::env::var_os("RUST_LOG").is_none() {
            for text in [&console_text, &file_text] {
                assert!(text.contains("round complete"));
                assert!(!text.contains("below the default level"));
            }
        }
    }

    #[test]
    fn client_log_skips_files_created_by_others() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("client_2.txt"), "earlier run\n").unwrap();

        let mut log = client_log(dir.path(), "client_2").unwrap();
        writeln!(log, "fresh").unwrap();

        assert_eq!(log.path(), dir.path().join("client_2_1.txt"));
        assert_eq!(fs::read_to_string(dir.path().join("client_2.txt")).unwrap(), "earlier run\n");
    }
}
