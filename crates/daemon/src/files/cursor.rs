//! Random-access paging over a listing result.

use super::entry::DirectoryEntry;

/// An ordered, indexable result of one `List` or `Stat` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListCursor {
    entries: Vec<DirectoryEntry>,
}

/// One window over a [`ListCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPage<'a> {
    /// Entries in the window. Borrowed straight from the cursor.
    pub entries: &'a [DirectoryEntry],
    /// No entries remain past this window.
    pub end_of_list: bool,
}

impl ListCursor {
    /// Wrap an already ordered list of entries.
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    /// A cursor holding a single entry.
    pub fn single(entry: DirectoryEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in order.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Fetch up to `count` entries starting at `offset`.
    ///
    /// An offset at or past the end yields no entries and `end_of_list`.
    /// Otherwise `end_of_list` is set when `offset + count` reaches the end,
    /// so a page that exactly drains the cursor already reports it.
    pub fn page(&self, offset: u64, count: usize) -> ListPage<'_> {
        let len = self.entries.len() as u64;
        if offset >= len {
            return ListPage {
                entries: &[],
                end_of_list: true,
            };
        }

        let start = offset as usize;
        let end = start.saturating_add(count).min(self.entries.len());
        ListPage {
            entries: &self.entries[start..end],
            end_of_list: offset.saturating_add(count as u64) >= len,
        }
    }
}
