//! Per-page index of persisted threads.

use crate::thread::AnnotationThread;
use annotation_model::ThreadId;
use std::collections::BTreeMap;

/// Threads organized by the page they are anchored on.
///
/// A thread's page never changes, so every thread lives under exactly one key.
/// Order within a page is insertion order.
#[derive(Debug, Default)]
pub struct PageIndex {
    by_page: BTreeMap<u32, Vec<AnnotationThread>>,
}

impl PageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a thread, returning the handle it replaces if one with the same
    /// id was already indexed. The new handle goes to the end of its page.
    pub fn insert(&mut self, thread: AnnotationThread) -> Option<AnnotationThread> {
        let replaced = self.remove(thread.page(), &thread.id());
        self.by_page.entry(thread.page()).or_default().push(thread);
        replaced
    }

    /// Remove a thread by id from the given page.
    pub fn remove(&mut self, page: u32, thread_id: &ThreadId) -> Option<AnnotationThread> {
        let threads = self.by_page.get_mut(&page)?;
        let index = threads.iter().position(|thread| &thread.id() == thread_id)?;
        let removed = threads.remove(index);
        if threads.is_empty() {
            self.by_page.remove(&page);
        }
        Some(removed)
    }

    pub fn get(&self, thread_id: &ThreadId) -> Option<&AnnotationThread> {
        self.by_page.values().flatten().find(|thread| &thread.id() == thread_id)
    }

    /// Threads on one page, cloned handles.
    pub fn page(&self, page: u32) -> Vec<AnnotationThread> {
        self.by_page.get(&page).cloned().unwrap_or_default()
    }

    pub fn all(&self) -> Vec<AnnotationThread> {
        self.by_page.values().flatten().cloned().collect()
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_page.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_page.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_page.is_empty()
    }

    /// Drop every entry, returning the threads that were indexed.
    pub fn drain(&mut self) -> Vec<AnnotationThread> {
        std::mem::take(&mut self.by_page).into_values().flatten().collect()
    }
}
