use crate::domain::history::HistoryRecord;
use crate::error::{PlanError, Result};
use std::io::Read;

/// Reads historical delivery reporting from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<HistoryRecord>`. It handles whitespace trimming and flexible
/// record lengths automatically; malformed rows surface as per-row errors
/// so callers can skip them without aborting the stream.
pub struct HistoryReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> HistoryReader<R> {
    /// Creates a new `HistoryReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes records.
    pub fn records(self) -> impl Iterator<Item = Result<HistoryRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PlanError::from))
    }
}
