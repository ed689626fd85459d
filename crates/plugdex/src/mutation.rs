//! Per-plugin FIFO queue for category and tag writes.
//!
//! Writes to the same plugin must reach the server in the order the user
//! made them, so each plugin gets a chain: one write on the wire, the rest
//! queued behind it. The next write dispatches only after the previous
//! completion has been observed. Chains for different plugins are
//! independent, and a failed write never blocks the writes queued after it.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use plugdex_protocol::{MutationPayload, TransportError};
use tracing::{debug, warn};

use crate::transport::CatalogTransport;

/// A finished write, reported once from `tick`.
#[derive(Debug)]
pub struct MutationOutcome {
    pub slug: String,
    pub payload: MutationPayload,
    pub result: Result<(), TransportError>,
}

struct InFlightMutation {
    payload: MutationPayload,
    rx: mpsc::Receiver<Result<(), TransportError>>,
}

#[derive(Default)]
struct Chain {
    in_flight: Option<InFlightMutation>,
    queue: VecDeque<MutationPayload>,
}

/// Dispatches plugin writes, one at a time per plugin.
pub struct MutationQueue {
    transport: Arc<dyn CatalogTransport>,
    chains: HashMap<String, Chain>,
}

impl MutationQueue {
    pub fn new(transport: Arc<dyn CatalogTransport>) -> Self {
        Self {
            transport,
            chains: HashMap::new(),
        }
    }

    /// Queue a write for `slug`. Goes on the wire immediately if the chain
    /// is idle, otherwise waits its turn.
    pub fn enqueue(&mut self, slug: impl Into<String>, payload: MutationPayload) {
        let slug = slug.into();
        let chain = self.chains.entry(slug.clone()).or_default();
        if chain.in_flight.is_none() {
            chain.in_flight = Some(spawn_mutation(&self.transport, slug, payload));
        } else {
            debug!(%slug, queued = chain.queue.len() + 1, "write queued behind in-flight");
            chain.queue.push_back(payload);
        }
    }

    /// Collect finished writes and dispatch the next queued write on each
    /// chain that just freed up.
    pub fn tick(&mut self) -> Vec<MutationOutcome> {
        let mut outcomes = Vec::new();
        for (slug, chain) in &mut self.chains {
            let Some(finished) = chain.in_flight.take() else {
                continue;
            };
            let result = match finished.rx.try_recv() {
                Ok(result) => result,
                Err(mpsc::TryRecvError::Empty) => {
                    chain.in_flight = Some(finished);
                    continue;
                }
                Err(mpsc::TryRecvError::Disconnected) => {
                    Err(TransportError::Network("write worker disconnected".into()))
                }
            };
            if let Err(err) = &result {
                warn!(%slug, error = %err, "plugin write failed");
            }
            outcomes.push(MutationOutcome {
                slug: slug.clone(),
                payload: finished.payload,
                result,
            });
            if let Some(next) = chain.queue.pop_front() {
                chain.in_flight = Some(spawn_mutation(&self.transport, slug.clone(), next));
            }
        }
        self.chains
            .retain(|_, chain| chain.in_flight.is_some() || !chain.queue.is_empty());
        outcomes
    }

    /// Writes not yet completed for `slug` (in-flight plus queued).
    pub fn pending_for(&self, slug: &str) -> usize {
        self.chains.get(slug).map_or(0, |chain| {
            usize::from(chain.in_flight.is_some()) + chain.queue.len()
        })
    }

    /// True while any write is in flight or queued.
    pub fn is_busy(&self) -> bool {
        !self.chains.is_empty()
    }
}

fn spawn_mutation(
    transport: &Arc<dyn CatalogTransport>,
    slug: String,
    payload: MutationPayload,
) -> InFlightMutation {
    let (tx, rx) = mpsc::sync_channel(1);
    let transport = Arc::clone(transport);
    let worker_payload = payload.clone();
    thread::spawn(move || {
        let result = match &worker_payload {
            MutationPayload::Category { id } => transport.set_category(&slug, id),
            MutationPayload::Tags { tags } => transport.set_tags(&slug, tags),
        };
        let _ = tx.send(result);
    });
    InFlightMutation { payload, rx }
}
