use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use lotel_core::error::{LotelError, Result};

/// Streams a JSON-lines file, invoking `handle` once per trimmed non-empty
/// line. Lines are read incrementally so the collector may keep appending
/// mid-read, and the buffer grows past the nominal 10 MB per-line floor
/// without a whole-file parse.
pub fn each_line(path: &Path, mut handle: impl FnMut(&str)) -> Result<()> {
    let file = File::open(path)
        .map_err(|e| LotelError::Io(format!("opening {}: {e}", path.display())))?;
    let mut reader = BufReader::with_capacity(1024 * 1024, file);

    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| LotelError::Io(format!("reading {}: {e}", path.display())))?;
        if read == 0 {
            return Ok(());
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            handle(trimmed);
        }
    }
}
