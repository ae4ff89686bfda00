//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over inbound events from a CSV event log.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row errors are yielded as `Err` items carrying the line number
//!
//! Rows are read one at a time; memory use does not grow with the file.

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::io::csv_format::{convert_event_record, EventRecord};
use crate::types::{InboundEvent, MarketError, MarketResult};

#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Open an event log
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` - Ready to iterate
    /// * `Err(MarketError::IoError)` - The file could not be opened
    pub fn new(path: &Path) -> MarketResult<Self> {
        let file = File::open(path).map_err(|e| MarketError::IoError {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = MarketResult<InboundEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<EventRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;

        Some(match row {
            Ok(record) => convert_event_record(record)
                .map_err(|e| MarketError::parse_error(Some(self.line_num), e)),
            Err(e) => Err(MarketError::from(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Command, Input};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_sync_reader_reads_events_in_order() {
        let file = create_temp_csv(
            "user,name,kind,payload\n\
             2,Bo,command,menu:topup\n\
             2,Bo,text,500\n\
             3,,command,buy:1\n",
        );

        let events: Vec<_> = SyncReader::new(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[1].input, Input::Text("500".to_string()));
        assert_eq!(events[2].input, Input::Command(Command::Buy(1)));
        assert_eq!(events[2].display_name, None);
    }

    #[test]
    fn test_sync_reader_reports_bad_rows_and_continues() {
        let file = create_temp_csv(
            "user,name,kind,payload\n\
             2,Bo,command,buy:abc\n\
             2,Bo,text,hello\n",
        );

        let results: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[0],
            Err(MarketError::ParseError { line: Some(2), .. })
        ));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_sync_reader_rejects_non_numeric_user() {
        let file = create_temp_csv("user,name,kind,payload\nbob,Bo,text,hi\n");

        let results: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert!(matches!(&results[0], Err(MarketError::ParseError { .. })));
    }

    #[test]
    fn test_sync_reader_missing_file() {
        let result = SyncReader::new(Path::new("/nonexistent/events.csv"));
        assert!(matches!(result, Err(MarketError::IoError { .. })));
    }
}
