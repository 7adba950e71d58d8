//! Ordered trace collection owned by a session

use crate::error::{ReviewError, ReviewResult};
use crate::models::Trace;
use crate::undo::UndoEntry;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceSet {
    traces: Vec<Trace>,
}

impl TraceSet {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    pub fn get(&self, index: usize) -> ReviewResult<&Trace> {
        self.traces.get(index).ok_or_else(|| {
            ReviewError::NotFound(format!(
                "Trace index {} out of range (0..{})",
                index,
                self.traces.len()
            ))
        })
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> ReviewResult<&mut Trace> {
        let len = self.traces.len();
        self.traces.get_mut(index).ok_or_else(|| {
            ReviewError::NotFound(format!("Trace index {} out of range (0..{})", index, len))
        })
    }

    /// Replace the trace at `index` wholesale (undo restoration)
    pub fn set(&mut self, index: usize, trace: Trace) -> ReviewResult<()> {
        *self.get_mut(index)? = trace;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter()
    }

    pub fn as_slice(&self) -> &[Trace] {
        &self.traces
    }

    /// First unreviewed index strictly after `from_exclusive`
    ///
    /// Never wraps around to the start of the list.
    pub fn find_next_unreviewed(&self, from_exclusive: usize) -> Option<usize> {
        self.traces
            .iter()
            .enumerate()
            .skip(from_exclusive.saturating_add(1))
            .find(|(_, trace)| !trace.reviewed)
            .map(|(index, _)| index)
    }

    /// Independent copy of the trace at `index` for the undo stack
    pub fn snapshot(&self, index: usize) -> ReviewResult<UndoEntry> {
        Ok(UndoEntry {
            trace_index: index,
            trace: self.get(index)?.clone(),
        })
    }
}
