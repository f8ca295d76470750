use std::cell::Cell;
use std::fmt;

/// The model whose notification started a propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Symbolic,
    Explicit,
    Structure,
    Card,
    /// A unit switch or full rebuild triggered from the synchronizer itself.
    Lattice,
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Symbolic => "symbolic",
            Origin::Explicit => "explicit",
            Origin::Structure => "structure",
            Origin::Card => "card",
            Origin::Lattice => "lattice",
            Origin::Remote => "remote",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Propagating(Origin),
}

/// Re-entrancy lock of one synchronizer.
///
/// While a propagation runs, the writes it performs come back as notifications;
/// those find the lock held and are dropped. The lock is released by dropping the
/// [`SyncGuard`], so every exit path (early return included) restores
/// [`SyncState::Idle`].
#[derive(Debug, Default)]
pub struct SyncLock {
    state: Cell<SyncState>,
}

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        self.state.get()
    }

    pub fn is_held(&self) -> bool {
        self.state.get() != SyncState::Idle
    }

    /// Enters the propagating state, or returns `None` if a propagation is running.
    pub fn try_acquire(&self, origin: Origin) -> Option<SyncGuard<'_>> {
        if self.is_held() {
            return None;
        }
        self.state.set(SyncState::Propagating(origin));
        Some(SyncGuard { lock: self })
    }
}

#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SyncGuard<'a> {
    lock: &'a SyncLock,
}

impl SyncGuard<'_> {
    pub fn origin(&self) -> Option<Origin> {
        match self.lock.state() {
            SyncState::Propagating(origin) => Some(origin),
            SyncState::Idle => None,
        }
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.lock.state.set(SyncState::Idle);
    }
}

/// Counters describing what a synchronizer did with the notifications it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    /// Forward propagations into the other representations.
    pub propagations: u64,
    /// Notifications ignored because the synchronizer was already propagating.
    pub suppressed: u64,
    /// Edits refused because they could not produce a valid result.
    pub rejected: u64,
}

/// Interior-mutable [`SyncStats`] owned by a synchronizer.
#[derive(Debug, Default)]
pub(crate) struct StatsCell(Cell<SyncStats>);

impl StatsCell {
    pub fn get(&self) -> SyncStats {
        self.0.get()
    }

    pub fn propagated(&self) {
        self.update(|stats| stats.propagations += 1);
    }

    pub fn suppressed(&self) {
        self.update(|stats| stats.suppressed += 1);
    }

    pub fn rejected(&self) {
        self.update(|stats| stats.rejected += 1);
    }

    fn update(&self, apply: impl FnOnce(&mut SyncStats)) {
        let mut stats = self.0.get();
        apply(&mut stats);
        self.0.set(stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_guard_is_alive() {
        let lock = SyncLock::new();
        let guard = lock.try_acquire(Origin::Symbolic).unwrap();
        assert_eq!(guard.origin(), Some(Origin::Symbolic));
        assert!(lock.try_acquire(Origin::Structure).is_none());
        assert_eq!(lock.state(), SyncState::Propagating(Origin::Symbolic));
        drop(guard);
        assert_eq!(lock.state(), SyncState::Idle);
        assert!(lock.try_acquire(Origin::Structure).is_some());
    }

    #[test]
    fn lock_is_released_on_early_return() {
        fn propagate(lock: &SyncLock, bail: bool) -> Option<()> {
            let _guard = lock.try_acquire(Origin::Card)?;
            if bail {
                return None;
            }
            Some(())
        }

        let lock = SyncLock::new();
        assert!(propagate(&lock, true).is_none());
        assert!(!lock.is_held());
        assert!(propagate(&lock, false).is_some());
        assert!(!lock.is_held());
    }

    #[test]
    fn stats_count_each_outcome_separately() {
        let stats = StatsCell::default();
        stats.propagated();
        stats.propagated();
        stats.suppressed();
        stats.rejected();
        assert_eq!(
            stats.get(),
            SyncStats {
                propagations: 2,
                suppressed: 1,
                rejected: 1
            }
        );
    }
}
