//! Asynchronous CSV reader with batch interface
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of InboundEvents
//!                  ↓
//!           csv_format module
//!           (EventRecord, convert_event_record)
//! ```
//!
//! Rows that fail to parse are logged and skipped.

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

use crate::io::csv_format::{convert_event_record, EventRecord};
use crate::types::InboundEvent;

pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` events; an empty batch means end of input
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<InboundEvent> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<EventRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => match convert_event_record(record) {
                    Ok(event) => batch.push(event),
                    Err(e) => warn!(error = %e, "Skipping event"),
                },
                Some(Err(e)) => warn!(error = %e, "Skipping unreadable row"),
                None => break,
            }
        }

        batch
    }
}
