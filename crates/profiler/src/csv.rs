use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ProfilerError;

/// One line of CSV output, built field by field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    fields: Vec<String>,
}

impl CsvRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Display) {
        self.fields.push(value.to_string());
    }

    /// Empty field, used where a value is undefined for this row
    pub fn push_empty(&mut self) {
        self.fields.push(String::new());
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Comma-separated line without the trailing newline
    pub fn to_line(&self) -> String {
        self.fields
            .iter()
            .map(|field| escape(field))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn escape(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Append-only CSV file.
///
/// The header is only due when the file was missing or empty when the sink
/// was opened, so restarting against an existing file never repeats it.
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
    needs_header: bool,
}

impl CsvSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProfilerError> {
        let path = path.as_ref().to_path_buf();
        let open_error = |source| ProfilerError::CsvOpen {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_error)?;
        let needs_header = file.metadata().map_err(open_error)?.len() == 0;

        log::debug!(
            "Opened CSV file {:?} (header {})",
            path,
            if needs_header { "pending" } else { "present" }
        );

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            needs_header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn needs_header(&self) -> bool {
        self.needs_header
    }

    /// Writes the header if it is still due; no-op afterwards.
    pub fn write_header(&mut self, header: &CsvRecord) -> Result<(), ProfilerError> {
        if !self.needs_header {
            return Ok(());
        }
        self.write_line(header)?;
        self.needs_header = false;
        Ok(())
    }

    pub fn append(&mut self, row: &CsvRecord) -> Result<(), ProfilerError> {
        self.write_line(row)
    }

    fn write_line(&mut self, record: &CsvRecord) -> Result<(), ProfilerError> {
        writeln!(self.writer, "{}", record.to_line())
            .and_then(|_| self.writer.flush())
            .map_err(|source| ProfilerError::CsvWrite {
                path: self.path.clone(),
                source,
            })
    }
}
