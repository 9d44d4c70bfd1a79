//! Authoritative record table and query handler.

use dnssd_core::{
    first_label, names_equal, Inbound, Packet, Record, RecordData, RecordKind, Transport,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const RESPONDED_CHANNEL_CAPACITY: usize = 64;

/// Outcome of one response transmission.
#[derive(Debug, Clone)]
pub struct Responded {
    pub answers: Vec<Record>,
    pub additionals: Vec<Record>,
    /// Transport error message, when the transmit failed.
    pub error: Option<String>,
}

/// Holds this host's authoritative records and answers inbound queries.
///
/// Records are kept in per-type buckets. All publishers of one endpoint
/// share a single responder.
pub struct Responder {
    transport: Arc<dyn Transport>,
    records: Mutex<BTreeMap<RecordKind, Vec<Record>>>,
    responded: broadcast::Sender<Responded>,
}

impl Responder {
    pub fn new(transport: Arc<dyn Transport>) -> Responder {
        let (responded, _) = broadcast::channel(RESPONDED_CHANNEL_CAPACITY);
        Responder {
            transport,
            records: Mutex::new(BTreeMap::new()),
            responded,
        }
    }

    /// Start answering inbound queries until `cancel` fires.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) {
        let responder = Arc::clone(self);
        let mut inbound = responder.transport.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = inbound.recv() => match event {
                        Ok(Inbound::Query(packet)) => responder.respond_to(&packet).await,
                        Ok(Inbound::Response(..)) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("responder lagged behind inbound traffic, missed {missed} packets");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    /// Add records, skipping any entry (same type, name and data) already
    /// present.
    pub fn register(&self, records: &[Record]) {
        let mut table = self.records.lock().unwrap();
        for record in records {
            let bucket = table.entry(record.kind()).or_default();
            if !bucket.iter().any(|existing| existing.same_entry(record)) {
                bucket.push(record.clone());
            }
        }
    }

    /// Remove, within each given record's type bucket, every record whose
    /// name matches (case-insensitively). Empty buckets are dropped.
    pub fn unregister(&self, records: &[Record]) {
        let mut table = self.records.lock().unwrap();
        for record in records {
            if let Some(bucket) = table.get_mut(&record.kind()) {
                bucket.retain(|existing| !names_equal(&existing.name, &record.name));
                if bucket.is_empty() {
                    table.remove(&record.kind());
                }
            }
        }
    }

    /// Snapshot of all held records.
    pub fn records(&self) -> Vec<Record> {
        let table = self.records.lock().unwrap();
        table.values().flatten().cloned().collect()
    }

    /// Notifications for every transmitted response.
    pub fn subscribe_responded(&self) -> broadcast::Receiver<Responded> {
        self.responded.subscribe()
    }

    /// Answer each question of a query independently. Questions with no
    /// matching records are ignored; one response is sent per answered
    /// question, without deduplication across questions.
    pub async fn respond_to(&self, packet: &Packet) {
        for question in &packet.questions {
            let answers = self.matching(question.kind, &question.name);
            if answers.is_empty() {
                continue;
            }
            let additionals = if question.kind == RecordKind::Any {
                Vec::new()
            } else {
                self.additionals_for(&answers)
            };

            debug!(
                "answering {:?} with {} answers, {} additionals",
                question.name,
                answers.len(),
                additionals.len()
            );
            let result = self
                .transport
                .respond(answers.clone(), additionals.clone())
                .await;
            if let Err(e) = &result {
                warn!("failed to answer query for {:?}: {e}", question.name);
            }
            let _ = self.responded.send(Responded {
                answers,
                additionals,
                error: result.err().map(|e| e.to_string()),
            });
        }
    }

    /// Records selected by a question under "loose" name comparison: a
    /// dotted question name compares against the full record name, a bare
    /// one against the record name's first label.
    fn matching(&self, kind: RecordKind, name: &str) -> Vec<Record> {
        let full_name = name.contains('.');
        let table = self.records.lock().unwrap();
        table
            .iter()
            .filter(|(bucket_kind, _)| kind.matches(**bucket_kind))
            .flat_map(|(_, bucket)| bucket.iter())
            .filter(|record| {
                if full_name {
                    names_equal(&record.name, name)
                } else {
                    names_equal(first_label(&record.name), name)
                }
            })
            .cloned()
            .collect()
    }

    /// Transitive resolution: SRV and TXT records for each PTR answer's
    /// target, then A/AAAA records for each SRV target found that way.
    fn additionals_for(&self, answers: &[Record]) -> Vec<Record> {
        let mut additionals = Vec::new();
        for answer in answers {
            if let RecordData::Ptr(target) = &answer.data {
                additionals.extend(self.matching(RecordKind::Srv, target));
                additionals.extend(self.matching(RecordKind::Txt, target));
            }
        }

        let targets: Vec<String> = additionals
            .iter()
            .filter_map(|record| match &record.data {
                RecordData::Srv { target, .. } => Some(target.clone()),
                _ => None,
            })
            .collect();
        for target in targets {
            additionals.extend(self.matching(RecordKind::A, &target));
            additionals.extend(self.matching(RecordKind::Aaaa, &target));
        }
        additionals
    }
}
