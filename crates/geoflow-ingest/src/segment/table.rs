//! In-memory tab-separated table
//!
//! Cell values are kept as the exact strings read from the file; nothing is
//! type-converted, so a table written back out differs from its source only in
//! quoting and padding.

use geoflow_common::{PipelineError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        check_unique(&columns)?;
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(PipelineError::parse(
                format!("row {}", i + 1),
                format!("{} fields, expected {}", row.len(), columns.len()),
            ));
        }
        Ok(Self { columns, rows })
    }

    /// Parse tab-separated text whose first non-blank line is the header
    ///
    /// Rows shorter than the header are padded with empty cells; rows longer
    /// than the header are an error. Blank lines are ignored. Text with no
    /// header line at all is an error.
    pub fn from_tsv(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut columns: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| PipelineError::parse(format!("line {}", index + 1), e))?;
            if record.len() == 1 && record[0].is_empty() {
                continue;
            }

            let fields: Vec<String> = record.iter().map(str::to_string).collect();
            let Some(header) = columns.as_ref() else {
                check_unique(&fields)?;
                columns = Some(fields);
                continue;
            };

            if fields.len() > header.len() {
                let line = record.position().map(|p| p.line()).unwrap_or(index as u64 + 1);
                return Err(PipelineError::parse(
                    format!("line {}", line),
                    format!("expected {} fields, saw {}", header.len(), fields.len()),
                ));
            }

            let mut row = fields;
            row.resize(header.len(), String::new());
            rows.push(row);
        }

        let Some(columns) = columns else {
            return Err(PipelineError::parse("header", "no header line"));
        };
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at (`row`, `column` name)
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    /// One row as (column, value) pairs in column order
    pub fn record(&self, row: usize) -> Option<impl Iterator<Item = (&str, &str)> + '_> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(values.iter().map(String::as_str)),
        )
    }

    /// Copy of this table without the named columns
    ///
    /// Every named column must exist; `table` names the table in the error.
    pub fn drop_columns(&self, names: &[&str], table: &str) -> Result<Table> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| self.column_index(n).is_none())
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Schema {
                table: table.to_string(),
                missing,
            });
        }

        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.contains(&self.columns[i].as_str()))
            .collect();

        Ok(Table {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    pub fn write_tsv_to<W: Write>(&self, writer: W) -> Result<()> {
        if self.columns.is_empty() {
            return Ok(());
        }

        let mut out = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);

        out.write_record(&self.columns).map_err(write_error)?;
        for row in &self.rows {
            out.write_record(row).map_err(write_error)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        self.write_tsv_to(file)
    }

    pub fn to_tsv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_tsv_to(&mut buf)?;
        String::from_utf8(buf).map_err(|e| PipelineError::parse("tsv output", e))
    }
}

fn check_unique(columns: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(PipelineError::parse(
                "header",
                format!("duplicate column name '{}'", column),
            ));
        }
    }
    Ok(())
}

fn write_error(e: csv::Error) -> PipelineError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => PipelineError::Io(io),
        other => PipelineError::parse("tsv output", format!("{:?}", other)),
    }
}
