use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

/// Location of the command history file, when a home directory exists.
pub fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tinydb_history"))
}

/// Appends a line to the history file, creating it when missing.
///
/// History is best-effort: callers ignore the result rather than let a
/// history failure interrupt the session.
pub fn append_history(line: &str, path: &PathBuf) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format!("{}\n", line.trim()).as_bytes())?;
    Ok(())
}
