//! Session logger. One optional log file per session, truncated on every
//! start, plus an optional mirror to stderr for `--verbose` runs.
//!
//! Default file location:
//!   Windows:  `%APPDATA%\PixelsEditor\pixels-editor.log`
//!   Linux:    `~/.local/share/pixels-editor/pixels-editor.log`
//!   macOS:    `~/Library/Application Support/PixelsEditor/pixels-editor.log`
//!
//! Use the `log_debug!` / `log_info!` / `log_warn!` / `log_err!` macros
//! anywhere in the crate. Before [`init`] they are silent no-ops, so the
//! library can be embedded without a sink.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

struct Sink {
    file: Option<Mutex<File>>,
    path: Option<PathBuf>,
    echo_stderr: bool,
}

static SINK: OnceLock<Sink> = OnceLock::new();

/// Where log lines go.
#[derive(Clone, Debug, Default)]
pub struct LogOptions {
    /// Log file, truncated at init. `None` disables file output.
    pub file: Option<PathBuf>,
    /// Mirror every line to stderr.
    pub echo_stderr: bool,
}

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static Path> {
    SINK.get().and_then(|s| s.path.as_deref())
}

/// Write a line to the session log. I/O errors are ignored so logging never
/// takes down an edit.
pub fn write_line(line: &str) {
    let Some(sink) = SINK.get() else { return };
    if let Some(mutex) = &sink.file
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
    if sink.echo_stderr {
        eprintln!("{}", line);
    }
}

/// Write a timestamped, level-tagged line to the session log.
pub fn write(level: &str, msg: &str) {
    if SINK.get().is_none() {
        return;
    }
    write_line(&format!("[{}] [{}] {}", timestamp(), level, msg));
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::write("DEBUG", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Initialise the session logger. Only the first call has any effect.
///
/// * Creates (or truncates) the log file, if one is configured.
/// * Installs a panic hook that writes the panic message to the log before
///   handing over to the previous hook.
pub fn init(options: LogOptions) {
    if SINK.get().is_some() {
        return;
    }

    let mut file = None;
    let mut path = None;
    if let Some(p) = options.file {
        if let Some(parent) = p.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).write(true).truncate(true).open(&p) {
            Ok(f) => {
                file = Some(Mutex::new(f));
                path = Some(p);
            }
            Err(e) => {
                // Not fatal: keep going with stderr only.
                eprintln!("[logger] Failed to open log file {:?}: {}", p, e);
            }
        }
    }

    let sink = Sink { file, path, echo_stderr: options.echo_stderr };
    if SINK.set(sink).is_err() {
        return;
    }

    write_line(&format!("=== pixels-editor session started {} ===", human_timestamp()));
    if let Some(p) = log_path() {
        write_line(&format!("Log file: {}", p.display()));
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", timestamp(), info));
        prev(info);
    }));
}

/// Default per-user log file.
pub fn default_log_path() -> PathBuf {
    let dir = if cfg!(target_os = "linux") { "pixels-editor" } else { "PixelsEditor" };
    data_dir().join(dir).join("pixels-editor.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            let h = (secs % 86400) / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            format!("{:02}:{:02}:{:02}", h, m, s)
        }
        Err(_) => "??:??:??".to_string(),
    }
}

fn human_timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => format!("(unix {})", d.as_secs()),
        Err(_) => "(unknown time)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
        assert_eq!(ts.as_bytes()[5], b':');
    }

    #[test]
    fn default_path_names_the_app() {
        let path = default_log_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("pixels-editor.log"));
    }
}
