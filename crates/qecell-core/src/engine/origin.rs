use crate::core::models::ids::{AtomId, OriginIndex};
use slotmap::SecondaryMap;

/// Conversion work left over for a card entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pending {
    #[default]
    None,
    /// The card text could not be converted to Cartesian; the structural position is stale.
    ToStructure,
    /// The structural position could not be written to the card; the card text is stale.
    ToCard,
}

/// The tie between one card entry and one structural atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub atom: AtomId,
    pub pending: Pending,
    /// The entry's coordinate text does not currently evaluate.
    pub invalid: bool,
}

impl Link {
    pub fn new(atom: AtomId) -> Self {
        Self {
            atom,
            pending: Pending::None,
            invalid: false,
        }
    }
}

/// Two-way map between card positions ([`OriginIndex`]) and structural atoms.
///
/// Origins are kept dense: removing origin `k` shifts every later origin down by
/// one, inserting at `k` shifts them up by one.
#[derive(Debug, Default)]
pub struct OriginTable {
    links: Vec<Link>,
    origins: SecondaryMap<AtomId, OriginIndex>,
}

impl OriginTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn push(&mut self, link: Link) -> OriginIndex {
        let origin = OriginIndex(self.links.len());
        self.origins.insert(link.atom, origin);
        self.links.push(link);
        origin
    }

    /// Inserts a link at `origin` (clamped to the table length).
    pub fn insert(&mut self, origin: OriginIndex, link: Link) -> OriginIndex {
        let index = origin.index().min(self.links.len());
        self.links.insert(index, link);
        self.reindex_from(index);
        OriginIndex(index)
    }

    pub fn remove(&mut self, origin: OriginIndex) -> Option<Link> {
        let index = origin.index();
        if index >= self.links.len() {
            return None;
        }
        let link = self.links.remove(index);
        self.origins.remove(link.atom);
        self.reindex_from(index);
        Some(link)
    }

    /// Removes the link of `atom`, returning the origin it occupied.
    pub fn remove_atom(&mut self, atom: AtomId) -> Option<OriginIndex> {
        let origin = self.origin(atom)?;
        self.remove(origin);
        Some(origin)
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.origins.clear();
    }

    pub fn get(&self, origin: OriginIndex) -> Option<&Link> {
        self.links.get(origin.index())
    }

    pub fn atom(&self, origin: OriginIndex) -> Option<AtomId> {
        self.get(origin).map(|link| link.atom)
    }

    pub fn origin(&self, atom: AtomId) -> Option<OriginIndex> {
        self.origins.get(atom).copied()
    }

    pub fn set_pending(&mut self, origin: OriginIndex, pending: Pending) {
        if let Some(link) = self.links.get_mut(origin.index()) {
            link.pending = pending;
        }
    }

    /// Sets the invalid flag and returns its previous value.
    pub fn set_invalid(&mut self, origin: OriginIndex, invalid: bool) -> bool {
        match self.links.get_mut(origin.index()) {
            Some(link) => std::mem::replace(&mut link.invalid, invalid),
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (OriginIndex, &Link)> {
        self.links
            .iter()
            .enumerate()
            .map(|(index, link)| (OriginIndex(index), link))
    }

    fn reindex_from(&mut self, start: usize) {
        for (index, link) in self.links.iter().enumerate().skip(start) {
            self.origins.insert(link.atom, OriginIndex(index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn atom_ids(n: usize) -> Vec<AtomId> {
        let mut arena: SlotMap<AtomId, ()> = SlotMap::with_key();
        (0..n).map(|_| arena.insert(())).collect()
    }

    fn table_with(n: usize) -> (OriginTable, Vec<AtomId>) {
        let ids = atom_ids(n);
        let mut table = OriginTable::new();
        for &id in &ids {
            table.push(Link::new(id));
        }
        (table, ids)
    }

    #[test]
    fn removal_shifts_every_later_origin_down_by_one() {
        let (mut table, ids) = table_with(5);
        let removed = table.remove(OriginIndex(1)).unwrap();
        assert_eq!(removed.atom, ids[1]);
        assert_eq!(table.origin(ids[0]), Some(OriginIndex(0)));
        assert_eq!(table.origin(ids[1]), None);
        assert_eq!(table.origin(ids[2]), Some(OriginIndex(1)));
        assert_eq!(table.origin(ids[4]), Some(OriginIndex(3)));
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn insertion_shifts_later_origins_up_by_one() {
        let ids = atom_ids(4);
        let mut table = OriginTable::new();
        for &id in &ids[..3] {
            table.push(Link::new(id));
        }
        let extra = ids[3];
        assert_eq!(table.insert(OriginIndex(1), Link::new(extra)), OriginIndex(1));
        assert_eq!(table.origin(extra), Some(OriginIndex(1)));
        assert_eq!(table.origin(ids[1]), Some(OriginIndex(2)));
        assert_eq!(table.atom(OriginIndex(3)), Some(ids[2]));
    }

    #[test]
    fn origins_stay_dense_and_consistent() {
        let (mut table, ids) = table_with(6);
        table.remove_atom(ids[4]);
        table.remove(OriginIndex(0));
        for (origin, link) in table.iter() {
            assert_eq!(table.origin(link.atom), Some(origin));
        }
        assert_eq!(table.remove_atom(ids[4]), None);
        assert!(table.remove(OriginIndex(9)).is_none());
    }

    #[test]
    fn flags_are_tracked_per_link() {
        let (mut table, _) = table_with(2);
        table.set_pending(OriginIndex(1), Pending::ToStructure);
        assert!(!table.set_invalid(OriginIndex(0), true));
        assert!(table.set_invalid(OriginIndex(0), false));
        assert_eq!(table.get(OriginIndex(1)).unwrap().pending, Pending::ToStructure);
        assert_eq!(table.get(OriginIndex(0)).unwrap().pending, Pending::None);
    }
}
