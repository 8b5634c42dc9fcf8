use crate::error::{ExtLinksError, Result};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Handle to a document owned by an external store.
///
/// Identity is the path alone: two refs with the same path are the same
/// document no matter what label they carry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Store-relative path, e.g. "Notes/Reading List.md"
    pub path: String,
    /// Human-readable name, e.g. "Reading List"
    pub label: String,
}

impl DocumentRef {
    /// Build a ref whose label is the basename of `path` without its extension.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let label = derive_label(&path);
        Self { path, label }
    }

    pub fn with_label(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }
}

/// "Notes/Reading List.md" -> "Reading List"
fn derive_label(path: &str) -> String {
    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match basename.rfind('.') {
        Some(dot) if dot > 0 => basename[..dot].to_string(),
        _ => basename.to_string(),
    }
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for DocumentRef {}

impl Hash for DocumentRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for DocumentRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DocumentRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

/// A classified link occurrence. Only the scanner creates these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Markdown label, or the URL itself for bare and file links
    pub display_text: String,
    pub url: String,
    pub document: DocumentRef,
}

/// Lifecycle notifications emitted by a document store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentEvent {
    Created(DocumentRef),
    Modified(DocumentRef),
    /// `document` is the ref under its new path.
    Renamed {
        document: DocumentRef,
        old_path: String,
    },
    Deleted(DocumentRef),
}

impl DocumentEvent {
    /// The document the event is about (new ref for renames).
    pub fn document(&self) -> &DocumentRef {
        match self {
            DocumentEvent::Created(doc)
            | DocumentEvent::Modified(doc)
            | DocumentEvent::Deleted(doc) => doc,
            DocumentEvent::Renamed { document, .. } => document,
        }
    }
}

/// The external collaborator that owns document contents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document currently in the corpus.
    async fn list_documents(&self) -> Result<Vec<DocumentRef>>;

    /// Current content of one document.
    async fn read_content(&self, document: &DocumentRef) -> Result<String>;
}

/// In-process document store backed by a concurrent map.
///
/// Useful for embedding the index in hosts that already hold document text,
/// and for driving the index deterministically in tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: DashMap<String, (DocumentRef, String)>,
    failing: DashSet<String>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a document, returning its ref.
    pub fn insert(&self, path: &str, content: &str) -> DocumentRef {
        let doc = DocumentRef::new(path);
        self.docs
            .insert(path.to_string(), (doc.clone(), content.to_string()));
        doc
    }

    pub fn remove(&self, path: &str) -> Option<DocumentRef> {
        self.docs.remove(path).map(|(_, (doc, _))| doc)
    }

    /// Move a document to a new path, keeping its content.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Option<DocumentRef> {
        let (_, (_, content)) = self.docs.remove(old_path)?;
        Some(self.insert(new_path, &content))
    }

    /// Make subsequent reads of `path` fail until `clear_failure` is called.
    pub fn fail_reads(&self, path: &str) {
        self.failing.insert(path.to_string());
    }

    pub fn clear_failure(&self, path: &str) {
        self.failing.remove(path);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_documents(&self) -> Result<Vec<DocumentRef>> {
        let mut docs: Vec<DocumentRef> = self.docs.iter().map(|e| e.value().0.clone()).collect();
        docs.sort();
        Ok(docs)
    }

    async fn read_content(&self, document: &DocumentRef) -> Result<String> {
        if self.failing.contains(&document.path) {
            return Err(ExtLinksError::Read {
                path: document.path.clone(),
                source: std::io::Error::other("simulated read failure"),
            });
        }
        self.docs
            .get(&document.path)
            .map(|entry| entry.value().1.clone())
            .ok_or_else(|| ExtLinksError::NotFound(document.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn label_is_basename_without_extension() {
        assert_eq!(DocumentRef::new("Notes/Reading List.md").label, "Reading List");
        assert_eq!(DocumentRef::new("top.md").label, "top");
        assert_eq!(DocumentRef::new("dir/.hidden").label, ".hidden");
        assert_eq!(DocumentRef::new("no_extension").label, "no_extension");
    }

    #[test]
    fn identity_is_path_only() {
        let a = DocumentRef::with_label("a.md", "First");
        let b = DocumentRef::with_label("a.md", "Second");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);

        assert_ne!(DocumentRef::new("a.md"), DocumentRef::new("b.md"));
    }

    #[test]
    fn event_exposes_document() {
        let doc = DocumentRef::new("new.md");
        let event = DocumentEvent::Renamed {
            document: doc.clone(),
            old_path: "old.md".into(),
        };
        assert_eq!(event.document(), &doc);
    }

    #[tokio::test]
    async fn memory_store_reads_and_lists() {
        let store = MemoryDocumentStore::new();
        store.insert("b.md", "second");
        let a = store.insert("a.md", "first");

        let listed = store.list_documents().await.unwrap();
        assert_eq!(
            listed.iter().map(|d| d.path.as_str()).collect::<Vec<_>>(),
            vec!["a.md", "b.md"]
        );
        assert_eq!(store.read_content(&a).await.unwrap(), "first");
    }

    #[tokio::test]
    async fn memory_store_rename_keeps_content() {
        let store = MemoryDocumentStore::new();
        store.insert("old.md", "body");
        let renamed = store.rename("old.md", "new.md").unwrap();
        assert_eq!(renamed.path, "new.md");
        assert_eq!(store.read_content(&renamed).await.unwrap(), "body");
        assert!(matches!(
            store.read_content(&DocumentRef::new("old.md")).await,
            Err(ExtLinksError::NotFound(_))
        ));
        assert!(store.rename("missing.md", "x.md").is_none());
    }

    #[tokio::test]
    async fn memory_store_simulated_failures() {
        let store = MemoryDocumentStore::new();
        let doc = store.insert("flaky.md", "content");
        store.fail_reads("flaky.md");
        assert!(matches!(
            store.read_content(&doc).await,
            Err(ExtLinksError::Read { .. })
        ));
        store.clear_failure("flaky.md");
        assert_eq!(store.read_content(&doc).await.unwrap(), "content");
    }
}
