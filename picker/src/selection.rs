use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// Page indices chosen within the currently loaded document.
///
/// The set is bound to a page count; every member is below it. Binding a
/// new page count drops every member.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    page_count: usize,
    selected: BTreeSet<usize>,
}

impl SelectionSet {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            selected: BTreeSet::new(),
        }
    }

    /// Rebinds the set to a freshly loaded document.
    pub fn rebind(&mut self, page_count: usize) {
        self.page_count = page_count;
        self.selected.clear();
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Flips membership of `index`, returning whether it is selected afterwards.
    pub fn toggle(&mut self, index: usize) -> Result<bool> {
        if index >= self.page_count {
            return Err(Error::IndexOutOfRange {
                index,
                page_count: self.page_count,
            });
        }

        if self.selected.remove(&index) {
            Ok(false)
        } else {
            self.selected.insert(index);
            Ok(true)
        }
    }

    /// Selected indices, ascending and without duplicates.
    pub fn members(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
