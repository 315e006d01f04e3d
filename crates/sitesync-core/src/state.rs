//! Shared sync state types.

use serde::Serialize;

/// Overall sync state reported to front ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    /// Online, but writes are still waiting in the pending queues.
    Pending,
    /// Online with nothing pending, but the cache is older than the max age.
    Stale,
}

impl SyncState {
    /// Derive the state from the individual component readings.
    pub const fn derive(is_online: bool, is_draining: bool, pending: usize, is_stale: bool) -> Self {
        if !is_online {
            Self::Offline
        } else if is_draining {
            Self::Syncing
        } else if pending > 0 {
            Self::Pending
        } else if is_stale {
            Self::Stale
        } else {
            Self::Synced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_wins_over_everything() {
        assert_eq!(SyncState::derive(false, true, 3, true), SyncState::Offline);
    }

    #[test]
    fn pending_items_reported_before_staleness() {
        assert_eq!(SyncState::derive(true, false, 2, true), SyncState::Pending);
        assert_eq!(SyncState::derive(true, false, 0, true), SyncState::Stale);
        assert_eq!(SyncState::derive(true, false, 0, false), SyncState::Synced);
        assert_eq!(SyncState::derive(true, true, 0, false), SyncState::Syncing);
    }
}
