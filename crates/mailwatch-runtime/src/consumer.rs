//! Batch consumer: merges arrival batches from push and polling into one
//! inbox view. The two sources are not coordinated and may report the same
//! message independently, so ingestion de-duplicates by message id with a
//! bounded seen-window.

use std::collections::{HashSet, VecDeque};

use mailwatch_core::types::{ArrivalBatch, MessageSummary};

/// Message ids remembered for cross-source de-duplication.
const SEEN_ID_CAPACITY: usize = 1024;

pub struct BatchConsumer {
    seen_ids: VecDeque<String>,
    seen_set: HashSet<String>,
    /// Inbox view, newest first.
    inbox: Vec<MessageSummary>,
}

impl BatchConsumer {
    pub fn new() -> Self {
        Self {
            seen_ids: VecDeque::new(),
            seen_set: HashSet::new(),
            inbox: Vec::new(),
        }
    }

    pub fn inbox(&self) -> &[MessageSummary] {
        &self.inbox
    }

    /// Ingest one batch independently of ordering across sources. Returns
    /// the summaries that were actually new to this consumer.
    pub fn ingest(&mut self, batch: &ArrivalBatch) -> Vec<MessageSummary> {
        let mut fresh = Vec::new();
        for summary in &batch.emails {
            if self.mark_seen(&summary.id) {
                fresh.push(summary.clone());
            }
        }
        // Ids without summaries still count as seen so a later summarized
        // delivery of the same message is not treated as new mail twice.
        for id in &batch.message_ids {
            self.mark_seen(id);
        }
        for summary in fresh.iter().rev() {
            self.inbox.insert(0, summary.clone());
        }
        fresh
    }

    fn mark_seen(&mut self, id: &str) -> bool {
        if !self.seen_set.insert(id.to_string()) {
            return false;
        }
        self.seen_ids.push_back(id.to_string());
        while self.seen_ids.len() > SEEN_ID_CAPACITY {
            if let Some(old) = self.seen_ids.pop_front() {
                self.seen_set.remove(&old);
            }
        }
        true
    }
}

impl Default for BatchConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid RFC3339")
    }

    fn summary(id: &str) -> MessageSummary {
        MessageSummary {
            id: id.into(),
            subject: format!("subject {id}"),
            from_name: "Sender".into(),
            from_address: "sender@example.com".into(),
            preview: String::new(),
            badges: vec![],
            received_at: ts("2026-03-01T10:00:00Z"),
        }
    }

    fn batch(ids: &[&str], with_summaries: bool) -> ArrivalBatch {
        ArrivalBatch {
            email_address: "ada@example.com".into(),
            count: ids.len() as u32,
            message_ids: ids.iter().map(|s| s.to_string()).collect(),
            emails: if with_summaries {
                ids.iter().map(|id| summary(id)).collect()
            } else {
                vec![]
            },
        }
    }

    #[test]
    fn fresh_messages_enter_inbox_newest_first() {
        let mut consumer = BatchConsumer::new();
        let fresh = consumer.ingest(&batch(&["m1", "m2"], true));
        assert_eq!(fresh.len(), 2);
        assert_eq!(consumer.inbox()[0].id, "m1");

        consumer.ingest(&batch(&["m3"], true));
        assert_eq!(consumer.inbox()[0].id, "m3");
        assert_eq!(consumer.inbox().len(), 3);
    }

    #[test]
    fn same_message_from_both_sources_counted_once() {
        let mut consumer = BatchConsumer::new();
        // Push delivers first...
        let fresh = consumer.ingest(&batch(&["m1"], true));
        assert_eq!(fresh.len(), 1);
        // ...then the next poll tick reports the same message.
        let fresh = consumer.ingest(&batch(&["m1"], true));
        assert!(fresh.is_empty());
        assert_eq!(consumer.inbox().len(), 1);
    }

    #[test]
    fn id_only_batch_blocks_later_summarized_duplicate() {
        let mut consumer = BatchConsumer::new();
        consumer.ingest(&batch(&["m1"], false));
        let fresh = consumer.ingest(&batch(&["m1"], true));
        assert!(fresh.is_empty());
    }

    #[test]
    fn distinct_ids_are_not_deduplicated() {
        let mut consumer = BatchConsumer::new();
        consumer.ingest(&batch(&["m1"], true));
        let fresh = consumer.ingest(&batch(&["m2"], true));
        assert_eq!(fresh.len(), 1);
    }
}
