// src/output.rs
use anyhow::Context;
use csv::{Terminator, Writer, WriterBuilder};
use serde::Serialize;
use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::error::{ControlError, ControlResult};

pub type CsvOut = Writer<BufWriter<File>>;

/// `<path>.tmp`, next to the final file so the rename stays on one filesystem.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Remove a leftover tmp file after a failed write.
fn discard_tmp(tmp: &Path) {
    match fs::remove_file(tmp) {
        Ok(()) => {}
        // never created
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(tmp = %tmp.display(), "could not remove temporary file: {}", e),
    }
}

/// Create the parent directories of `path` if it has any.
pub fn ensure_parent_dir(path: &Path) -> ControlResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| ControlError::io(dir, e))?;
    }
    Ok(())
}

/// Write a CSV file atomically.
///
/// `write` receives a writer over `<path>.tmp`. Once it returns `Ok` the
/// writer is flushed and the tmp file renamed over `path`. On any error the
/// tmp file is removed and `path` is left untouched.
pub fn write_csv_atomically<F>(path: &Path, write: F) -> ControlResult<()>
where
    F: FnOnce(&mut CsvOut) -> ControlResult<()>,
{
    ensure_parent_dir(path)?;
    let tmp = tmp_path_for(path);

    let result = (|| {
        let file = File::create(&tmp).map_err(|e| ControlError::io(&tmp, e))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(BufWriter::new(file));
        write(&mut writer)?;
        writer.flush().map_err(|e| ControlError::io(&tmp, e))?;
        let inner = writer
            .into_inner()
            .map_err(|e| {
                ControlError::io(&tmp, std::io::Error::new(e.error().kind(), e.error().to_string()))
            })?;
        let file = inner
            .into_inner()
            .map_err(|e| ControlError::io(&tmp, e.into_error()))?;
        file.sync_all().map_err(|e| ControlError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| ControlError::io(path, e))
    })();

    if result.is_err() {
        discard_tmp(&tmp);
    } else {
        debug!(path = %path.display(), "wrote file");
    }
    result
}

/// Copy `from` to `to` byte for byte, using the same tmp + rename dance.
pub fn copy_atomically(from: &Path, to: &Path) -> ControlResult<()> {
    ensure_parent_dir(to)?;
    let tmp = tmp_path_for(to);
    let result = fs::copy(from, &tmp)
        .map_err(|e| ControlError::io(from, e))
        .and_then(|_| fs::rename(&tmp, to).map_err(|e| ControlError::io(to, e)));
    if result.is_err() {
        discard_tmp(&tmp);
    }
    result
}

/// Pretty-print `value` as JSON to `path` via `<path>.tmp`, with a trailing newline.
pub fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    ensure_parent_dir(path)?;
    let tmp = tmp_path_for(path);

    let result = (|| -> anyhow::Result<()> {
        // 1) serialize into the tmp file
        let mut file = File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        serde_json::to_writer_pretty(&mut file, value)
            .with_context(|| format!("serializing JSON to {}", tmp.display()))?;
        file.write_all(b"\n")?;
        file.sync_all()?;

        // 2) rename into place
        fs::rename(&tmp, path).with_context(|| {
            format!("failed to rename `{}` to `{}`", tmp.display(), path.display())
        })
    })();

    if result.is_err() {
        discard_tmp(&tmp);
    }
    result
}
