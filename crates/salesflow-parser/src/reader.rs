use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ByteRecordsIntoIter, ReaderBuilder};

use crate::errors::ParserError;
use crate::model::Record;
use crate::schema::SALES_COLUMNS;

/// Lazily yields typed records from a headed CSV source, one row per `next` call.
///
/// The header is checked when the reader is built. A row that cannot be tokenized or whose
/// field count differs from the schema ends the stream with an error. Fields are decoded one
/// at a time, so a field that is not valid UTF-8 becomes null instead of failing its row.
pub struct RecordReader<R: Read> {
    rows: ByteRecordsIntoIter<R>,
    failed: bool,
}

pub fn read_records(path: impl AsRef<Path>) -> Result<RecordReader<File>, ParserError> {
    RecordReader::from_path(path)
}

impl RecordReader<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParserError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ParserError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read> RecordReader<R> {
    pub fn from_reader(reader: R) -> Result<Self, ParserError> {
        let mut csv = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header = csv
            .byte_headers()
            .map_err(|source| ParserError::Csv { line: 1, source })?
            .clone();
        validate_header(&header)?;

        Ok(Self {
            rows: csv.into_byte_records(),
            failed: false,
        })
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(source) => {
                self.failed = true;
                let line = source.position().map(|pos| pos.line()).unwrap_or_default();
                return Some(Err(ParserError::Csv { line, source }));
            }
        };

        if row.len() != SALES_COLUMNS.len() {
            self.failed = true;
            let line = row.position().map(|pos| pos.line()).unwrap_or_default();
            return Some(Err(ParserError::ColumnCount {
                line,
                expected: SALES_COLUMNS.len(),
                found: row.len(),
            }));
        }

        Some(Ok(Record::from_row(&row)))
    }
}

fn validate_header(header: &ByteRecord) -> Result<(), ParserError> {
    if header.is_empty() {
        return Err(ParserError::MissingHeader);
    }

    let found: Vec<String> = header
        .iter()
        .map(|name| {
            String::from_utf8_lossy(name)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect();

    let matches = found.len() == SALES_COLUMNS.len()
        && found
            .iter()
            .zip(SALES_COLUMNS)
            .all(|(name, expected)| name.eq_ignore_ascii_case(expected));

    if matches {
        Ok(())
    } else {
        Err(ParserError::HeaderMismatch {
            expected: SALES_COLUMNS.to_vec(),
            found,
        })
    }
}
