//! Read access to the module's event log.

use auction_types::{AuctionId, EventRecord};

use crate::state::AuctionState as ModuleState;

/// Events with `sequence >= cursor`, oldest first, at most `limit` of them.
pub fn events_since(state: &ModuleState, cursor: u64, limit: usize) -> &[EventRecord] {
    let start = (cursor as usize).min(state.events.len());
    let end = start.saturating_add(limit).min(state.events.len());
    &state.events[start..end]
}

/// All events concerning one auction, oldest first.
pub fn events_for_auction(state: &ModuleState, auction_id: AuctionId) -> Vec<EventRecord> {
    state
        .events
        .iter()
        .filter(|record| record.event.auction_id() == auction_id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::AuctionEvent;

    fn state_with_events(n: u64) -> ModuleState {
        let mut state = ModuleState::new();
        for i in 0..n {
            state.emit(i, AuctionEvent::Closed { auction_id: i % 2 });
        }
        state
    }

    #[test]
    fn test_events_since_cursor() {
        let state = state_with_events(5);
        let page = events_since(&state, 2, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 2);
        assert_eq!(page[1].sequence, 3);
    }

    #[test]
    fn test_events_since_past_end() {
        let state = state_with_events(3);
        assert!(events_since(&state, 10, 5).is_empty());
        assert_eq!(events_since(&state, 1, usize::MAX).len(), 2);
    }

    #[test]
    fn test_events_for_auction() {
        let state = state_with_events(5);
        let events = events_for_auction(&state, 1);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|r| r.event.auction_id() == 1));
    }
}
