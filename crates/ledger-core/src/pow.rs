use crate::{hash_encoded, meets_difficulty, BlockData, Result, POW_CANCEL_CHECK_INTERVAL};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Search nonces upward from 0 until the block hash starts with the difficulty prefix.
/// Returns the smallest qualifying nonce.
pub fn proof_of_work(previous_hash: &str, data: &BlockData) -> Result<u64> {
    let never = AtomicBool::new(false);
    let nonce = search(previous_hash, data, &never)?;
    // An unset flag never stops the search.
    Ok(nonce.unwrap_or_default())
}

/// Same search as [`proof_of_work`], but gives up with `None` once `cancel` is set.
/// The flag is polled every [`POW_CANCEL_CHECK_INTERVAL`] attempts.
pub fn proof_of_work_until(
    previous_hash: &str,
    data: &BlockData,
    cancel: &AtomicBool,
) -> Result<Option<u64>> {
    search(previous_hash, data, cancel)
}

fn search(previous_hash: &str, data: &BlockData, cancel: &AtomicBool) -> Result<Option<u64>> {
    // Block data is constant across attempts; only the nonce varies.
    let encoded = data.encode()?;
    let mut nonce = 0u64;
    loop {
        if nonce % POW_CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            debug!(index = data.index, nonce, "proof-of-work cancelled");
            return Ok(None);
        }
        let hash = hash_encoded(previous_hash, nonce, &encoded);
        if meets_difficulty(&hash) {
            info!(index = data.index, nonce, %hash, "proof-of-work found");
            return Ok(Some(nonce));
        }
        nonce += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hash_block, Transaction};

    fn empty_data() -> BlockData {
        BlockData {
            index: 2,
            transactions: vec![],
        }
    }

    #[test]
    fn proof_of_work_example() {
        let nonce = proof_of_work("0", &empty_data()).unwrap();
        assert_eq!(nonce, 5672);
        let hash = hash_block("0", nonce, &empty_data()).unwrap();
        assert_eq!(
            hash,
            "00002b62f1205be4a02b5f13b07344e7dbbe80088ec44327c34971412405da12"
        );
    }

    #[test]
    fn proof_of_work_is_minimal() {
        let data = BlockData {
            index: 2,
            transactions: vec![Transaction::new(5.0, "X", "Y")],
        };
        let nonce = proof_of_work("0", &data).unwrap();
        assert!(meets_difficulty(&hash_block("0", nonce, &data).unwrap()));
        for smaller in 0..nonce {
            assert!(!meets_difficulty(&hash_block("0", smaller, &data).unwrap()));
        }
    }

    #[test]
    fn cancelled_search_returns_none() {
        let cancel = AtomicBool::new(true);
        let found = proof_of_work_until("0", &empty_data(), &cancel).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn uncancelled_search_matches_unbounded_search() {
        let cancel = AtomicBool::new(false);
        let found = proof_of_work_until("0", &empty_data(), &cancel).unwrap();
        assert_eq!(found, Some(proof_of_work("0", &empty_data()).unwrap()));
    }
}
