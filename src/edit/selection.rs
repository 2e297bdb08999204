//! Note selection within a single track.

use crate::midi::NoteId;

/// An ordered set of selected notes, by identity.
///
/// Order is the order notes were selected in. The selection never owns
/// notes; the track evicts IDs when it removes the notes they point at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<NoteId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id`. Returns false if it was already selected.
    pub fn insert(&mut self, id: NoteId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Removes `id`. Returns false if it wasn't selected.
    pub fn remove(&mut self, id: NoteId) -> bool {
        match self.ids.iter().position(|&selected| selected == id) {
            Some(pos) => {
                self.ids.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.ids.contains(&id)
    }

    /// Empties the selection, returning what was in it.
    pub fn clear(&mut self) -> Vec<NoteId> {
        std::mem::take(&mut self.ids)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The selected note, if exactly one is selected.
    pub fn single(&self) -> Option<NoteId> {
        match self.ids.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn ids(&self) -> &[NoteId] {
        &self.ids
    }
}
