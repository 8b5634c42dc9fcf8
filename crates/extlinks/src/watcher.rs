//! Filesystem watching: turns `notify` events into document lifecycle events.

use crate::fs_store::FsDocumentStore;
use extlinks_core::DocumentEvent;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Translate one raw filesystem event into zero or more document events.
///
/// Paths that are not indexable documents are dropped. Platforms that report
/// a rename as separate "from" and "to" halves produce a delete and a create;
/// platforms that pair them produce a single rename.
pub fn translate(event: &Event, store: &FsDocumentStore) -> Vec<DocumentEvent> {
    let doc = |path: &Path| store.document_for(path);

    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter_map(|p| doc(p.as_path()))
            .map(DocumentEvent::Created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let (Some(from), Some(to)) = (event.paths.first(), event.paths.get(1)) else {
                return Vec::new();
            };
            match (doc(from.as_path()), doc(to.as_path())) {
                (Some(old), Some(new)) => vec![DocumentEvent::Renamed {
                    document: new,
                    old_path: old.path,
                }],
                (Some(old), None) => vec![DocumentEvent::Deleted(old)],
                (None, Some(new)) => vec![DocumentEvent::Created(new)],
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .filter_map(|p| doc(p.as_path()))
            .map(DocumentEvent::Deleted)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .filter_map(|p| doc(p.as_path()))
            .map(DocumentEvent::Created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter_map(|p| {
                let document = doc(p.as_path())?;
                Some(if p.exists() {
                    DocumentEvent::Created(document)
                } else {
                    DocumentEvent::Deleted(document)
                })
            })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter_map(|p| doc(p.as_path()))
            .map(DocumentEvent::Modified)
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter_map(|p| doc(p.as_path()))
            .map(DocumentEvent::Deleted)
            .collect(),
        _ => Vec::new(),
    }
}

/// Watch the store's root recursively, forwarding document events to `tx`.
///
/// Watching stops when the returned watcher is dropped.
pub fn watch(
    store: Arc<FsDocumentStore>,
    tx: mpsc::Sender<DocumentEvent>,
) -> anyhow::Result<RecommendedWatcher> {
    let root = store.root().to_path_buf();
    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| match result {
            Ok(event) => {
                for document_event in translate(&event, &store) {
                    tracing::debug!("Document event: {:?}", document_event);
                    if let Err(e) = tx.blocking_send(document_event) {
                        tracing::error!(
                            "Document event channel closed (index worker gone?): {}",
                            e
                        );
                        return;
                    }
                }
            }
            Err(e) => tracing::error!("Watch error: {}", e),
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!("Watching {} for changes", root.display());
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use extlinks_core::{DocumentRef, IndexConfig};
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use std::path::PathBuf;

    fn store() -> FsDocumentStore {
        FsDocumentStore::new("/vault", IndexConfig::default())
    }

    fn at(relative: &str) -> PathBuf {
        PathBuf::from("/vault").join(relative)
    }

    #[test]
    fn create_becomes_created() {
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(at("new.md"));
        assert_eq!(
            translate(&event, &store()),
            vec![DocumentEvent::Created(DocumentRef::new("new.md"))]
        );
    }

    #[test]
    fn content_change_becomes_modified() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(at("dir/a.md"));
        assert_eq!(
            translate(&event, &store()),
            vec![DocumentEvent::Modified(DocumentRef::new("dir/a.md"))]
        );
    }

    #[test]
    fn remove_becomes_deleted() {
        let event = Event::new(EventKind::Remove(RemoveKind::File)).add_path(at("a.md"));
        assert_eq!(
            translate(&event, &store()),
            vec![DocumentEvent::Deleted(DocumentRef::new("a.md"))]
        );
    }

    #[test]
    fn paired_rename_becomes_renamed() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(at("old.md"))
            .add_path(at("archive/new.md"));
        assert_eq!(
            translate(&event, &store()),
            vec![DocumentEvent::Renamed {
                document: DocumentRef::new("archive/new.md"),
                old_path: "old.md".into(),
            }]
        );
    }

    #[test]
    fn rename_to_non_document_becomes_deleted() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(at("note.md"))
            .add_path(at("note.md.bak"));
        assert_eq!(
            translate(&event, &store()),
            vec![DocumentEvent::Deleted(DocumentRef::new("note.md"))]
        );
    }

    #[test]
    fn rename_halves_become_delete_and_create() {
        let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(at("a.md"));
        let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(at("b.md"));
        assert_eq!(
            translate(&from, &store()),
            vec![DocumentEvent::Deleted(DocumentRef::new("a.md"))]
        );
        assert_eq!(
            translate(&to, &store()),
            vec![DocumentEvent::Created(DocumentRef::new("b.md"))]
        );
    }

    #[test]
    fn non_documents_are_ignored() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(at("image.png"))
            .add_path(at(".git/index.md"))
            .add_path(PathBuf::from("/elsewhere/x.md"));
        assert!(translate(&event, &store()).is_empty());
    }

    #[test]
    fn access_events_are_ignored() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(at("a.md"));
        assert!(translate(&event, &store()).is_empty());
    }
}
