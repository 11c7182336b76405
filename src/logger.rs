use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

static LOG_FILE: OnceLock<Arc<Mutex<File>>> = OnceLock::new();

/// Routes subsequent `log_warn`/`log_error` calls to `path` as well as stderr.
///
/// # Errors
///
/// Returns an error if `path` cannot be opened for appending.
pub fn set_log_file(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = LOG_FILE.set(Arc::new(Mutex::new(file)));
    Ok(())
}

fn write_line(prefix: &str, message: &str) {
    eprintln!("{prefix}: {message}");
    if let Some(file) = LOG_FILE.get() {
        if let Ok(mut f) = file.lock() {
            let _ = writeln!(f, "{prefix}: {message}");
        }
    }
}

pub fn log_warn(message: &str) {
    write_line("warning", message);
}

pub fn log_error(message: &str) {
    write_line("error", message);
}

pub fn log_info(message: &str) {
    write_line("info", message);
}
