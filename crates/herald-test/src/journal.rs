//! Append-only call journal shared by test handlers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Whether a journal entry marks the start or the end of a handler call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The handler was entered.
    Enter,
    /// The handler returned (successfully or not).
    Exit,
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Position in the journal, starting at 0.
    pub seq: usize,
    /// Tag of the handler that wrote the entry.
    pub tag: String,
    /// Event being handled.
    pub event: String,
    /// Enter or exit.
    pub phase: Phase,
}

/// Append-only log of handler enter/exit events.
///
/// Clones share the same journal, so one instance can be handed to every
/// handler of a test and inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl CallJournal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, tag: &str, event: &str, phase: Phase) {
        let mut entries = self.lock();
        let seq = entries.len();
        entries.push(JournalEntry {
            seq,
            tag: tag.to_string(),
            event: event.to_string(),
            phase,
        });
    }

    /// Record that handler `tag` was entered for `event`.
    pub fn enter(&self, tag: &str, event: &str) {
        self.push(tag, event, Phase::Enter);
    }

    /// Record that handler `tag` finished handling `event`.
    pub fn exit(&self, tag: &str, event: &str) {
        self.push(tag, event, Phase::Exit);
    }

    /// Snapshot of every entry, in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().clone()
    }

    /// Tags of handlers in the order they were entered.
    #[must_use]
    pub fn entered(&self) -> Vec<String> {
        self.tags_for(Phase::Enter)
    }

    /// Tags of handlers in the order they finished.
    #[must_use]
    pub fn exited(&self) -> Vec<String> {
        self.tags_for(Phase::Exit)
    }

    fn tags_for(&self, phase: Phase) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.phase == phase)
            .map(|e| e.tag.clone())
            .collect()
    }

    /// Whether every call was entered and exited before the next one was
    /// entered (strict `enter, exit, enter, exit, ...` alternation with
    /// matching tags).
    #[must_use]
    pub fn is_serialized(&self) -> bool {
        self.lock().chunks(2).all(|pair| match pair {
            [enter, exit] => {
                enter.phase == Phase::Enter && exit.phase == Phase::Exit && enter.tag == exit.tag
            },
            _ => false,
        })
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the journal has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every entry.
    pub fn reset(&self) {
        self.lock().clear();
    }
}
