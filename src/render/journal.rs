use crate::clip::stack::ClipStack;
use crate::driver::Quad;

/// A logged quad and the clip it was drawn under.
#[derive(Clone, Debug)]
pub struct JournalEntry {
    /// Eye-space quad.
    pub quad: Quad,
    /// Clip stack current when the quad was logged.
    pub clip: ClipStack,
}

/// Deferred quads waiting to be drawn in batches.
///
/// Quads are stored already transformed by the modelview that was current
/// when they were logged, so modelview changes don't require a flush. Each
/// entry keeps its clip stack alive until the journal is flushed.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// An empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing is waiting to be drawn.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of logged quads.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append a quad drawn under `clip`.
    pub fn log(&mut self, quad: Quad, clip: ClipStack) {
        self.entries.push(JournalEntry { quad, clip });
    }

    /// Logged entries, oldest first.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Remove every entry, leaving the journal empty.
    pub fn take(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.entries)
    }
}

/// Split entries into runs that share one clip stack.
pub fn batches(entries: &[JournalEntry]) -> impl Iterator<Item = &[JournalEntry]> {
    entries.chunk_by(|a, b| a.clip.ptr_eq(&b.clip))
}

#[cfg(test)]
#[path = "../../tests/unit/render/journal.rs"]
mod tests;
