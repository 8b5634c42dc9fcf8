use crate::config::IndexConfig;
use crate::document::{DocumentEvent, DocumentRef, DocumentStore, Link};
use crate::error::Result;
use crate::link_parser::scan;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// document path -> links found in that document (one per distinct URL)
pub type DocumentLinks = HashMap<String, Vec<Link>>;

/// URL -> documents containing at least one link to it
pub type UrlDocuments = HashMap<String, BTreeSet<DocumentRef>>;

// ---------------------------------------------------------------------------
// Indices — the pure, synchronous aggregate
// ---------------------------------------------------------------------------

/// The two derived mappings, kept mutually consistent.
///
/// Both maps sit behind `Arc` so snapshots are cheap; mutation goes through
/// `Arc::make_mut`, which copies only while an older snapshot is still alive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Indices {
    document_to_links: Arc<DocumentLinks>,
    url_to_documents: Arc<UrlDocuments>,
    prune_empty_urls: bool,
}

impl Indices {
    pub fn new(prune_empty_urls: bool) -> Self {
        Self {
            prune_empty_urls,
            ..Self::default()
        }
    }

    pub fn document_to_links(&self) -> &DocumentLinks {
        &self.document_to_links
    }

    pub fn url_to_documents(&self) -> &UrlDocuments {
        &self.url_to_documents
    }

    /// Install `links` as the complete link set of `document`.
    ///
    /// Any prior entry for the same path is removed first, so this is a full
    /// replace. Only the first link per URL is kept, in scan order.
    pub fn add_document(&mut self, document: &DocumentRef, links: Vec<Link>) {
        self.remove_document(&document.path);

        let links = dedupe_by_url(links);
        let url_to_documents = Arc::make_mut(&mut self.url_to_documents);
        for link in &links {
            url_to_documents
                .entry(link.url.clone())
                .or_default()
                .replace(document.clone());
        }

        Arc::make_mut(&mut self.document_to_links).insert(document.path.clone(), links);
    }

    /// Remove every trace of the document at `path`.
    ///
    /// Returns false (and leaves both maps untouched) if the path was never
    /// indexed.
    pub fn remove_document(&mut self, path: &str) -> bool {
        if !self.document_to_links.contains_key(path) {
            return false;
        }
        let old_links = Arc::make_mut(&mut self.document_to_links)
            .remove(path)
            .unwrap_or_default();

        let url_to_documents = Arc::make_mut(&mut self.url_to_documents);
        let gone = DocumentRef::new(path);
        for link in &old_links {
            let Some(documents) = url_to_documents.get_mut(&link.url) else {
                continue;
            };
            documents.remove(&gone);
            if documents.is_empty() && self.prune_empty_urls {
                url_to_documents.remove(&link.url);
            }
        }
        true
    }

    /// Read-only view of the current maps, tagged with `version`.
    pub fn snapshot(&self, version: u64) -> IndexSnapshot {
        IndexSnapshot {
            version,
            document_to_links: Arc::clone(&self.document_to_links),
            url_to_documents: Arc::clone(&self.url_to_documents),
        }
    }

    /// Move the entry at `old_path` to `document`, replacing its links.
    pub fn rename_document(&mut self, old_path: &str, document: &DocumentRef, links: Vec<Link>) {
        self.remove_document(old_path);
        self.add_document(document, links);
    }
}

/// Keep the first link for each distinct URL.
fn dedupe_by_url(links: Vec<Link>) -> Vec<Link> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Read-only view of both mappings at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSnapshot {
    /// Increases by one with every committed mutation.
    pub version: u64,
    pub document_to_links: Arc<DocumentLinks>,
    pub url_to_documents: Arc<UrlDocuments>,
}

impl IndexSnapshot {
    /// Links stored for a document; empty if it is not indexed.
    pub fn links_for(&self, path: &str) -> &[Link] {
        self.document_to_links
            .get(path)
            .map(|links| links.as_slice())
            .unwrap_or_default()
    }

    /// Documents referencing `url`, in path order.
    pub fn documents_for(&self, url: &str) -> Vec<&DocumentRef> {
        self.url_to_documents
            .get(url)
            .map(|docs| docs.iter().collect())
            .unwrap_or_default()
    }

    pub fn contains_document(&self, path: &str) -> bool {
        self.document_to_links.contains_key(path)
    }

    /// All URLs with at least one referencing document, sorted.
    pub fn urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self
            .url_to_documents
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(url, _)| url.as_str())
            .collect();
        urls.sort_unstable();
        urls
    }

    pub fn document_count(&self) -> usize {
        self.document_to_links.len()
    }

    pub fn url_count(&self) -> usize {
        self.url_to_documents
            .values()
            .filter(|docs| !docs.is_empty())
            .count()
    }
}

// ---------------------------------------------------------------------------
// LinkIndex — async service driven by document events
// ---------------------------------------------------------------------------

type Listener = Arc<dyn Fn(&IndexSnapshot) + Send + Sync>;

/// Handle returned by `LinkIndex::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct IndexState {
    indices: Indices,
    version: u64,
}

impl IndexState {
    fn snapshot(&self) -> IndexSnapshot {
        self.indices.snapshot(self.version)
    }
}

/// Live link index over a document store.
///
/// Each event does its content read outside any lock, then applies
/// remove-then-install under the state lock and publishes a snapshot.
/// Events for different documents interleave freely; for the same document
/// the last mutation to commit wins.
pub struct LinkIndex {
    store: Arc<dyn DocumentStore>,
    config: IndexConfig,
    state: Mutex<IndexState>,
    listeners: DashMap<SubscriptionId, Listener>,
    next_listener_id: AtomicU64,
    /// Highest snapshot version handed to listeners so far.
    delivered: Mutex<u64>,
}

impl LinkIndex {
    pub fn new(store: Arc<dyn DocumentStore>, config: IndexConfig) -> Self {
        let indices = Indices::new(config.prune_empty_urls);
        Self {
            store,
            config,
            state: Mutex::new(IndexState {
                indices,
                version: 0,
            }),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(0),
            delivered: Mutex::new(0),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Channel sized by `event_buffer`, for feeding `run_worker`.
    pub fn event_channel(&self) -> (mpsc::Sender<DocumentEvent>, mpsc::Receiver<DocumentEvent>) {
        mpsc::channel(self.config.event_buffer.max(1))
    }

    /// Register a listener invoked with the full snapshot after every publish.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&IndexSnapshot) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, Arc::new(listener));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Current state, without waiting for a publish.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot()
    }

    /// Build the index from every document in the store.
    ///
    /// Reads run concurrently (bounded by `scan_concurrency`); documents that
    /// fail to read are skipped. Publishes exactly once, after all scans finish.
    /// Returns the number of documents indexed.
    pub async fn trigger_full_scan(&self) -> Result<usize> {
        let documents = self.store.list_documents().await?;
        let total = documents.len();
        tracing::info!("Full scan started: {} documents", total);

        let scanned: Vec<(DocumentRef, Vec<Link>)> = stream::iter(documents)
            .map(|document| async move {
                let links = self.read_and_scan(&document).await?;
                Some((document, links))
            })
            .buffer_unordered(self.config.effective_concurrency())
            .filter_map(|result| async move { result })
            .collect()
            .await;

        let indexed = scanned.len();
        let snapshot = self.commit(|indices| {
            for (document, links) in scanned {
                indices.add_document(&document, links);
            }
            true
        });
        if let Some(snapshot) = snapshot {
            tracing::info!(
                "Full scan complete: {} of {} documents indexed, {} distinct URLs",
                indexed,
                total,
                snapshot.url_count()
            );
            self.publish(snapshot);
        }
        Ok(indexed)
    }

    /// Apply one document lifecycle event.
    pub async fn handle_event(&self, event: DocumentEvent) {
        let snapshot = match event {
            DocumentEvent::Created(document) | DocumentEvent::Modified(document) => {
                let Some(links) = self.read_and_scan(&document).await else {
                    return;
                };
                self.commit(|indices| {
                    indices.add_document(&document, links);
                    true
                })
            }
            DocumentEvent::Renamed { document, old_path } => {
                let Some(links) = self.read_and_scan(&document).await else {
                    return;
                };
                tracing::debug!("Renamed {} -> {}", old_path, document.path);
                self.commit(|indices| {
                    indices.rename_document(&old_path, &document, links);
                    true
                })
            }
            DocumentEvent::Deleted(document) => {
                self.commit(|indices| indices.remove_document(&document.path))
            }
        };

        if let Some(snapshot) = snapshot {
            self.publish(snapshot);
        }
    }

    /// Background worker: handles each received event on its own task so a
    /// slow read never holds up other documents. Returns once the channel is
    /// closed and every in-flight event has been applied.
    pub async fn run_worker(self: Arc<Self>, mut rx: mpsc::Receiver<DocumentEvent>) {
        tracing::info!("Link index worker started");
        let mut in_flight = JoinSet::new();
        loop {
            match rx.recv().await {
                Some(event) => {
                    let index = Arc::clone(&self);
                    in_flight.spawn(async move { index.handle_event(event).await });
                    while let Some(finished) = in_flight.try_join_next() {
                        if let Err(e) = finished {
                            tracing::error!("Link index event task failed: {}", e);
                        }
                    }
                }
                None => break,
            }
        }
        while let Some(finished) = in_flight.join_next().await {
            if let Err(e) = finished {
                tracing::error!("Link index event task failed: {}", e);
            }
        }
        tracing::info!("Link index worker stopped");
    }

    /// Read and scan one document. Read failures are logged and yield None so
    /// the caller leaves that document's entry unchanged.
    async fn read_and_scan(&self, document: &DocumentRef) -> Option<Vec<Link>> {
        match self.store.read_content(document).await {
            Ok(content) => {
                let links = scan(&content, document);
                tracing::debug!(
                    "Doc {}: content length={}, links={}",
                    document.path,
                    content.len(),
                    links.len()
                );
                Some(links)
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", document.path, e);
                None
            }
        }
    }

    /// Run `mutate` under the state lock. If it reports a change, bump the
    /// version and return the new snapshot.
    fn commit<F>(&self, mutate: F) -> Option<IndexSnapshot>
    where
        F: FnOnce(&mut Indices) -> bool,
    {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !mutate(&mut state.indices) {
            return None;
        }
        state.version += 1;
        Some(state.snapshot())
    }

    /// Hand `snapshot` to every listener unless a newer one already went out.
    fn publish(&self, snapshot: IndexSnapshot) {
        let mut delivered = self.delivered.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.version <= *delivered {
            tracing::debug!(
                "Dropping stale snapshot v{} (v{} already published)",
                snapshot.version,
                *delivered
            );
            return;
        }
        *delivered = snapshot.version;

        // Clone out of the map so listeners may (un)subscribe re-entrantly.
        let listeners: Vec<Listener> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
