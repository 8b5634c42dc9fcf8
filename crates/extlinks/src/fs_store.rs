use async_trait::async_trait;
use extlinks_core::{DocumentRef, DocumentStore, ExtLinksError, IndexConfig};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Document store over a directory tree of text files.
///
/// Document paths are root-relative with `/` separators, e.g. "Projects/Ideas.md".
pub struct FsDocumentStore {
    root: PathBuf,
    config: IndexConfig,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>, config: IndexConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a filesystem path to the document it represents, if it is an
    /// indexable file under the root and outside ignored directories.
    ///
    /// Accepts absolute paths (as reported by watchers) or root-relative ones.
    pub fn document_for(&self, path: &Path) -> Option<DocumentRef> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root).ok()?
        } else {
            path
        };
        if !self.config.is_indexable(relative) {
            return None;
        }

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_string_lossy();
                    if self.config.is_ignored_dir(&name) {
                        return None;
                    }
                    segments.push(name.into_owned());
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }
        Some(DocumentRef::new(segments.join("/")))
    }

    /// Absolute path of a document.
    pub fn path_of(&self, document: &DocumentRef) -> PathBuf {
        document
            .path
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn walk(&self) -> Vec<DocumentRef> {
        let mut documents: Vec<DocumentRef> = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self
                        .config
                        .is_ignored_dir(&entry.file_name().to_string_lossy())
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                self.document_for(relative)
            })
            .collect();
        documents.sort();
        documents
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn list_documents(&self) -> extlinks_core::Result<Vec<DocumentRef>> {
        if !self.root.is_dir() {
            return Err(ExtLinksError::Enumerate {
                root: self.root.clone(),
                reason: "not a directory".to_string(),
            });
        }
        // Directory walking is blocking; keep it off the async workers.
        let store = FsDocumentStore::new(self.root.clone(), self.config.clone());
        tokio::task::spawn_blocking(move || store.walk())
            .await
            .map_err(|e| ExtLinksError::Enumerate {
                root: self.root.clone(),
                reason: e.to_string(),
            })
    }

    async fn read_content(&self, document: &DocumentRef) -> extlinks_core::Result<String> {
        let path = self.path_of(document);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => ExtLinksError::NotFound(document.path.clone()),
                _ => ExtLinksError::Read {
                    path: document.path.clone(),
                    source,
                },
            })
    }
}
