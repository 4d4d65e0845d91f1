//! Oblivious update of encrypted running statistics, and the plaintext tally
//! run once the bid list is revealed.
//!
//! Folding a bid always performs the same sequence of coprocessor calls,
//! whatever the amount: compare, select, compare, select, add. Nothing here may
//! branch on a comparison result; encrypted booleans only ever feed `select`.

use auction_coprocessor::{CoprocessorError, HomomorphicOps};
use auction_types::{Address, AuctionStats, CiphertextHandle, EncryptedAggregates};

/// Aggregates of an auction without bids. The running maximum starts at the
/// smallest representable value and the minimum at the largest, so the first
/// bid replaces both.
pub fn initial_aggregates<C>(ops: &C) -> Result<EncryptedAggregates, CoprocessorError>
where
    C: HomomorphicOps + ?Sized,
{
    Ok(EncryptedAggregates {
        high: ops.trivial_encrypt(u64::MIN)?,
        low: ops.trivial_encrypt(u64::MAX)?,
        sum: ops.trivial_encrypt(0)?,
    })
}

/// Fold one encrypted amount into the aggregates.
///
/// Returns new aggregates without touching `current`, so a coprocessor failure
/// midway leaves the caller's state intact.
pub fn fold_bid<C>(
    ops: &C,
    current: &EncryptedAggregates,
    amount: &CiphertextHandle,
) -> Result<EncryptedAggregates, CoprocessorError>
where
    C: HomomorphicOps + ?Sized,
{
    let is_higher = ops.gt(amount, &current.high)?;
    let high = ops.select(&is_higher, amount, &current.high)?;

    let is_lower = ops.lt(amount, &current.low)?;
    let low = ops.select(&is_lower, amount, &current.low)?;

    let sum = ops.add(&current.sum, amount)?;

    Ok(EncryptedAggregates { high, low, sum })
}

/// Compute statistics over revealed bids.
///
/// `bidders[i]` placed the bid that decrypted to `plaintexts[i]`; callers check
/// that both have the same length. The winner is the first bid holding the
/// maximum, so equal amounts resolve to the lowest index.
pub fn tally(bidders: &[Address], plaintexts: &[u64]) -> AuctionStats {
    debug_assert_eq!(bidders.len(), plaintexts.len());

    let mut best: Option<(usize, u64)> = None;
    let mut low = u64::MAX;
    let mut sum: u128 = 0;

    for (index, &amount) in plaintexts.iter().enumerate() {
        match best {
            Some((_, high)) if amount <= high => {}
            _ => best = Some((index, amount)),
        }
        low = low.min(amount);
        sum += amount as u128;
    }

    let Some((winner_index, high)) = best else {
        return AuctionStats::empty();
    };

    let count = plaintexts.len();
    AuctionStats {
        bid_count: count as u32,
        average: (sum / count as u128) as u64,
        high,
        low,
        sum,
        winner: bidders.get(winner_index).copied(),
        winner_index: Some(winner_index as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_coprocessor::LocalCoprocessor;

    fn bidders(n: usize) -> Vec<Address> {
        (0..n).map(|i| [i as u8 + 1; 32]).collect()
    }

    #[test]
    fn test_fold_tracks_max_min_sum() {
        let cp = LocalCoprocessor::from_key([1u8; 32]);
        let mut aggregates = initial_aggregates(&cp).unwrap();

        for amount in [40u64, 15, 90, 15] {
            let handle = cp.trivial_encrypt(amount).unwrap();
            aggregates = fold_bid(&cp, &aggregates, &handle).unwrap();
        }

        assert_eq!(cp.decrypt_handle(&aggregates.high).unwrap(), 90);
        assert_eq!(cp.decrypt_handle(&aggregates.low).unwrap(), 15);
        assert_eq!(cp.decrypt_handle(&aggregates.sum).unwrap(), 160);
    }

    #[test]
    fn test_first_bid_wins_both_comparisons() {
        let cp = LocalCoprocessor::from_key([1u8; 32]);
        let initial = initial_aggregates(&cp).unwrap();

        let handle = cp.trivial_encrypt(0).unwrap();
        let aggregates = fold_bid(&cp, &initial, &handle).unwrap();
        assert_eq!(cp.decrypt_handle(&aggregates.high).unwrap(), 0);
        assert_eq!(cp.decrypt_handle(&aggregates.low).unwrap(), 0);

        let handle = cp.trivial_encrypt(u64::MAX).unwrap();
        let aggregates = fold_bid(&cp, &initial, &handle).unwrap();
        assert_eq!(cp.decrypt_handle(&aggregates.high).unwrap(), u64::MAX);
        assert_eq!(cp.decrypt_handle(&aggregates.low).unwrap(), u64::MAX);
    }

    #[test]
    fn test_fold_failure_leaves_input_untouched() {
        let cp = LocalCoprocessor::from_key([1u8; 32]);
        let aggregates = initial_aggregates(&cp).unwrap();
        let before = aggregates.clone();

        let bogus = CiphertextHandle([0xaa; 32]);
        assert!(fold_bid(&cp, &aggregates, &bogus).is_err());
        assert_eq!(aggregates, before);
    }

    #[test]
    fn test_tally_tie_break_lowest_index() {
        let stats = tally(&bidders(4), &[10, 30, 30, 5]);
        assert_eq!(stats.winner_index, Some(1));
        assert_eq!(stats.winner, Some([2u8; 32]));
        assert_eq!(stats.high, 30);
        assert_eq!(stats.low, 5);
        assert_eq!(stats.sum, 75);
        assert_eq!(stats.average, 18);
        assert_eq!(stats.bid_count, 4);
    }

    #[test]
    fn test_tally_all_zero_bids_has_winner() {
        let stats = tally(&bidders(3), &[0, 0, 0]);
        assert_eq!(stats.winner_index, Some(0));
        assert_eq!(stats.high, 0);
        assert_eq!(stats.low, 0);
    }

    #[test]
    fn test_tally_sum_does_not_overflow() {
        let stats = tally(&bidders(2), &[u64::MAX, u64::MAX]);
        assert_eq!(stats.sum, 2 * u64::MAX as u128);
        assert_eq!(stats.average, u64::MAX);
    }

    #[test]
    fn test_tally_empty() {
        assert_eq!(tally(&[], &[]), AuctionStats::empty());
    }
}
