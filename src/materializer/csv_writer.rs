//! CSV output for result sets - header row then one line per row

use super::writer_backend::{MaterializeError, ResultSinkBackend};
use super::ResultSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Serialize `set` as CSV into `writer`. NULL cells become empty fields.
pub fn write_csv_to<W: Write>(set: &ResultSet, writer: W) -> Result<(), MaterializeError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(set.columns.iter().map(|c| c.name.as_str()))?;
    for row in &set.rows {
        csv_writer.write_record(row.iter().map(|cell| cell.to_text()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write `set` to `path` through a sibling temp file renamed into place, so
/// an interrupted write never leaves a truncated file at `path`.
pub fn write_csv(set: &ResultSet, path: impl AsRef<Path>) -> Result<(), MaterializeError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path);
    let result = File::create(&tmp_path)
        .map_err(MaterializeError::from)
        .and_then(|file| write_csv_to(set, BufWriter::new(file)));

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, path)?;
    log::info!("Extracted {} ({} rows) to CSV file: {}", set.name, set.len(), path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    sibling_path(path, ".bak")
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Result sets fully written to temp files next to their targets, not yet
/// visible under their final names.
///
/// [`StagedCsv::commit`] moves every file into place or none of them.
/// Dropping an uncommitted stage removes the temp files.
#[derive(Debug)]
pub struct StagedCsv {
    files: Vec<(PathBuf, PathBuf)>,
}

impl StagedCsv {
    /// Rename every temp file over its target.
    ///
    /// Existing targets are moved aside first. If any step fails, targets
    /// already placed are removed, the moved-aside files are put back and
    /// the error is returned.
    pub fn commit(mut self) -> Result<(), MaterializeError> {
        let files = std::mem::take(&mut self.files);
        let mut placed: Vec<(&Path, Option<PathBuf>)> = Vec::with_capacity(files.len());

        for (tmp, final_path) in &files {
            match place(tmp, final_path) {
                Ok(backup) => placed.push((final_path.as_path(), backup)),
                Err(e) => {
                    log::warn!("Rolling back CSV output after failing on {}: {}", final_path.display(), e);
                    restore(&placed);
                    for (tmp, _) in &files {
                        let _ = std::fs::remove_file(tmp);
                    }
                    return Err(e.into());
                }
            }
        }

        for (final_path, backup) in &placed {
            if let Some(backup) = backup {
                let _ = std::fs::remove_file(backup);
            }
            log::info!("📝 Wrote {}", final_path.display());
        }
        Ok(())
    }
}

impl Drop for StagedCsv {
    fn drop(&mut self) {
        for (tmp, _) in &self.files {
            let _ = std::fs::remove_file(tmp);
        }
    }
}

/// Move `tmp` to `final_path`, keeping any previous file as a backup.
fn place(tmp: &Path, final_path: &Path) -> std::io::Result<Option<PathBuf>> {
    let backup = if final_path.exists() {
        let backup = backup_path(final_path);
        std::fs::rename(final_path, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = std::fs::rename(tmp, final_path) {
        if let Some(backup) = &backup {
            let _ = std::fs::rename(backup, final_path);
        }
        return Err(e);
    }
    Ok(backup)
}

/// Undo [`place`] for every placed file, newest first.
fn restore(placed: &[(&Path, Option<PathBuf>)]) {
    for (final_path, backup) in placed.iter().rev() {
        let _ = std::fs::remove_file(final_path);
        if let Some(backup) = backup {
            let _ = std::fs::rename(backup, final_path);
        }
    }
}

/// Writes each result set to `<dir>/<name>.csv`.
pub struct CsvDirectoryWriter {
    dir: PathBuf,
}

impl CsvDirectoryWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, set: &ResultSet) -> PathBuf {
        self.dir.join(format!("{}.csv", set.name))
    }

    /// Write every set to a temp file. Nothing is visible under a final
    /// name until the returned stage is committed.
    pub fn stage(&self, sets: &[&ResultSet]) -> Result<StagedCsv, MaterializeError> {
        std::fs::create_dir_all(&self.dir)?;

        let mut staged = StagedCsv {
            files: Vec::with_capacity(sets.len()),
        };
        for set in sets {
            let final_path = self.path_for(set);
            let tmp_path = temp_path(&final_path);
            let written = File::create(&tmp_path)
                .map_err(MaterializeError::from)
                .and_then(|file| write_csv_to(set, BufWriter::new(file)));

            // registered before the check so the drop below cleans it up too
            staged.files.push((tmp_path, final_path));
            written?;
        }

        log::debug!("Staged {} CSV files in {}", staged.files.len(), self.dir.display());
        Ok(staged)
    }
}

impl ResultSinkBackend for CsvDirectoryWriter {
    fn write_all(&mut self, sets: &[&ResultSet]) -> Result<(), MaterializeError> {
        self.stage(sets)?.commit()
    }

    fn backend_type(&self) -> &'static str {
        "CSV"
    }
}
