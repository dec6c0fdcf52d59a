use std::collections::{BTreeMap, HashMap};
use tinylink_core::{InsertOutcome, NewLink, OwnerId, Result, ShortCode, ShortLink, StorageError};

/// In-process link table shared by the memory and file backends.
///
/// Holds the rows keyed by code plus a unique index on the original URL.
/// Callers are responsible for locking.
#[derive(Debug, Clone, Default)]
pub(crate) struct LinkTable {
    links: BTreeMap<ShortCode, ShortLink>,
    by_url: HashMap<String, ShortCode>,
}

impl LinkTable {
    /// Rebuilds a table from stored rows, rejecting rows that break the
    /// uniqueness of the original URL.
    pub(crate) fn from_links(links: impl IntoIterator<Item = ShortLink>) -> Result<Self> {
        let mut table = Self::default();

        for link in links {
            if let Some(existing) = table.by_url.get(&link.original_url) {
                return Err(StorageError::InvalidData(format!(
                    "url '{}' stored under both {} and {}",
                    link.original_url, existing, link.code
                )));
            }
            table.by_url.insert(link.original_url.clone(), link.code.clone());
            table.links.insert(link.code.clone(), link);
        }

        Ok(table)
    }

    pub(crate) fn links(&self) -> impl Iterator<Item = &ShortLink> {
        self.links.values()
    }

    pub(crate) fn get(&self, code: &ShortCode) -> Option<&ShortLink> {
        self.links.get(code)
    }

    pub(crate) fn contains(&self, code: &ShortCode) -> bool {
        self.links.contains_key(code)
    }

    pub(crate) fn list_by_owner(&self, owner_id: OwnerId) -> Vec<ShortLink> {
        self.links
            .values()
            .filter(|link| link.owner_id == owner_id)
            .cloned()
            .collect()
    }

    fn check(&self, link: &NewLink) -> InsertOutcome {
        if let Some(existing) = self.by_url.get(&link.original_url) {
            return InsertOutcome::UrlTaken(existing.clone());
        }
        if self.links.contains_key(&link.code) {
            return InsertOutcome::CodeTaken;
        }
        InsertOutcome::Inserted
    }

    fn apply(&mut self, link: NewLink) {
        self.by_url.insert(link.original_url.clone(), link.code.clone());
        self.links.insert(link.code.clone(), link.into_link());
    }

    pub(crate) fn insert(&mut self, link: NewLink) -> InsertOutcome {
        let outcome = self.check(&link);
        if outcome == InsertOutcome::Inserted {
            self.apply(link);
        }
        outcome
    }

    /// Inserts all rows or none of them.
    pub(crate) fn insert_batch(&mut self, links: Vec<NewLink>) -> InsertOutcome {
        let mut staged = self.clone();

        for link in links {
            let outcome = staged.insert(link);
            if outcome != InsertOutcome::Inserted {
                return outcome;
            }
        }

        *self = staged;
        InsertOutcome::Inserted
    }

    pub(crate) fn mark_deleted(&mut self, owner_id: OwnerId, codes: &[ShortCode]) -> u64 {
        let mut changed = 0;

        for code in codes {
            if let Some(link) = self.links.get_mut(code) {
                if link.owner_id == owner_id && !link.deleted {
                    link.deleted = true;
                    changed += 1;
                }
            }
        }

        changed
    }
}
