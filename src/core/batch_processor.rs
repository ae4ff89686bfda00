//! Batch processing with per-user partitioning
//!
//! Events from different users are independent unless an admin is involved:
//! admin decisions (approvals, request resolutions, credits) are what make
//! one user's events visible to or affect another user. A batch is therefore
//! cut into segments. Runs of ordinary events are partitioned by user and
//! processed concurrently, one task per user, in arrival order within each
//! user. Every admin event is a barrier processed alone, after everything
//! before it and before everything after it.
//!
//! This keeps replay results identical to strictly sequential processing.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use super::marketplace::Marketplace;
use crate::types::{InboundEvent, MarketResult, UserId};

/// Result of handling a single event
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The event that was handled
    pub event: InboundEvent,

    pub result: MarketResult<()>,
}

/// One slice of a batch
#[derive(Debug, PartialEq)]
enum Segment {
    /// Ordinary events, grouped per user in arrival order
    Users(HashMap<UserId, Vec<InboundEvent>>),
    /// A single admin event
    Barrier(InboundEvent),
}

/// Batch processor with per-user partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    market: Arc<Marketplace>,
}

impl BatchProcessor {
    pub fn new(market: Arc<Marketplace>) -> Self {
        Self { market }
    }

    /// Group events by user, preserving each user's order
    pub fn partition_by_user(
        &self,
        events: Vec<InboundEvent>,
    ) -> HashMap<UserId, Vec<InboundEvent>> {
        let mut partitions: HashMap<UserId, Vec<InboundEvent>> = HashMap::new();

        for event in events {
            partitions.entry(event.user).or_default().push(event);
        }

        partitions
    }

    fn segments(&self, batch: Vec<InboundEvent>) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut run = Vec::new();

        for event in batch {
            if self.market.is_admin(event.user) {
                if !run.is_empty() {
                    segments.push(Segment::Users(
                        self.partition_by_user(std::mem::take(&mut run)),
                    ));
                }
                segments.push(Segment::Barrier(event));
            } else {
                run.push(event);
            }
        }

        if !run.is_empty() {
            segments.push(Segment::Users(self.partition_by_user(run)));
        }

        segments
    }

    /// Handle one user's events sequentially
    pub async fn process_user_events(&self, events: Vec<InboundEvent>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(events.len());

        for event in events {
            let result = self.market.handle(event.clone()).await;
            results.push(ProcessingResult { event, result });
        }

        results
    }

    /// Process a batch: user partitions concurrently, admin events alone
    pub async fn process_batch(&self, batch: Vec<InboundEvent>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(batch.len());

        for segment in self.segments(batch) {
            match segment {
                Segment::Barrier(event) => {
                    results.extend(self.process_user_events(vec![event]).await);
                }
                Segment::Users(partitions) => {
                    let tasks: Vec<_> = partitions
                        .into_values()
                        .map(|events| {
                            let processor = self.clone();
                            tokio::spawn(async move { processor.process_user_events(events).await })
                        })
                        .collect();

                    for task in tasks {
                        match task.await {
                            Ok(user_results) => results.extend(user_results),
                            Err(e) => error!(error = %e, "Partition task panicked"),
                        }
                    }
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::TestMarket;
    use crate::types::Input;

    const ADMIN: UserId = TestMarket::ADMIN;

    fn event(user: UserId, data: &str) -> InboundEvent {
        InboundEvent::command(user, data.parse().unwrap())
    }

    #[test]
    fn test_partition_keeps_user_order() {
        let processor = BatchProcessor::new(TestMarket::new().market);

        let partitions = processor.partition_by_user(vec![
            event(2, "menu:topup"),
            event(3, "menu:balance"),
            InboundEvent::text(2, "100"),
        ]);

        assert_eq!(partitions.len(), 2);
        let user_two = &partitions[&2];
        assert_eq!(user_two.len(), 2);
        assert!(matches!(user_two[1].input, Input::Text(_)));
    }

    #[test]
    fn test_admin_events_split_segments() {
        let processor = BatchProcessor::new(TestMarket::new().market);

        let segments = processor.segments(vec![
            event(2, "menu:topup"),
            event(3, "menu:topup"),
            event(ADMIN, "topup:approve:1"),
            event(2, "menu:balance"),
        ]);

        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[0], Segment::Users(p) if p.len() == 2));
        assert!(matches!(&segments[1], Segment::Barrier(e) if e.user == ADMIN));
        assert!(matches!(&segments[2], Segment::Users(p) if p.len() == 1));
    }

    #[test]
    fn test_empty_batch_has_no_segments() {
        let processor = BatchProcessor::new(TestMarket::new().market);
        assert!(processor.segments(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_process_batch_returns_every_result() {
        let test = TestMarket::new();
        let processor = BatchProcessor::new(test.market.clone());

        let results = processor
            .process_batch(vec![
                event(2, "menu:topup"),
                InboundEvent::text(2, "100"),
                InboundEvent::text(2, "transfer #1"),
                event(3, "buy:99"),
                event(ADMIN, "topup:approve:1"),
                event(2, "menu:balance"),
            ])
            .await;

        assert_eq!(results.len(), 6);
        let failures: Vec<_> = results.iter().filter(|r| r.result.is_err()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].event.user, 3);
        assert_eq!(test.balance(2), rust_decimal::Decimal::from(100));
    }
}
