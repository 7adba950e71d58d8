//! Bounded undo history of pre-decision trace snapshots

use std::collections::VecDeque;

use crate::models::Trace;

/// Maximum number of decisions that can be undone
pub const UNDO_CAPACITY: usize = 10;

/// A trace as it was immediately before a decision was applied
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub trace_index: usize,
    pub trace: Trace,
}

/// FIFO-evicting stack; there is no redo
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an entry, evicting the oldest once the stack is full
    pub fn push(&mut self, entry: UndoEntry) {
        if self.entries.len() == UNDO_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
