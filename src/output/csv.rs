//! CSV writer for the per-year dataset
//!
//! Fields are quoted only when they contain the separator, a quote, or a line
//! break; embedded quotes are doubled. Every row is padded to the header width.

use crate::output::Dataset;
use crate::record::COLUMNS;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const SEPARATOR: char = ',';

/// Location of a year's dataset inside the output directory
pub fn dataset_path(directory: &Path, year: i32) -> PathBuf {
    directory.join(format!("asn_accidents_{}.csv", year))
}

fn needs_quotes(field: &str) -> bool {
    field.contains(SEPARATOR) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Writes one row to any writer
pub fn write_row<W: Write>(w: &mut W, row: &[String]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{}", SEPARATOR)?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Writes the header and every record to any writer
pub fn write_csv<W: Write>(w: &mut W, dataset: &Dataset) -> io::Result<()> {
    let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    write_row(w, &header)?;

    for record in &dataset.records {
        let mut row = record.to_row();
        row.resize(COLUMNS.len(), String::new());
        write_row(w, &row)?;
    }
    Ok(())
}

/// Writes the dataset to `path`, replacing any previous file atomically
///
/// The rows go to a sibling temp file which is synced and then renamed over
/// the target, so readers never observe a half-written dataset.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        write_csv(&mut writer, dataset)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    tracing::debug!("Wrote {} rows to {}", dataset.len(), path.display());
    Ok(())
}
