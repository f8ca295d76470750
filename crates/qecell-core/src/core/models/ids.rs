use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    pub struct AtomId;
    pub struct ListenerId;
}

/// Position of an atom's entry in the atomic-positions card.
///
/// Origin indices are dense: the entries of an `n`-atom card carry exactly
/// `0..n`. A structural atom keeps its [`AtomId`] for life, while its origin index
/// shifts as entries before it are inserted or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginIndex(pub usize);

impl OriginIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for OriginIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
