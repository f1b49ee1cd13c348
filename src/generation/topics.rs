//! Topic catalog and the recent-topic-avoiding selector.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Every topic the feed can write about when no topic is forced.
pub const BITCOIN_TOPICS: &[&str] = &[
    "The Genesis Block",
    "Proof of Work",
    "Difficulty Adjustment",
    "The Halving",
    "UTXO model",
    "Mining",
    "Mempool Dynamics",
    "Transaction Fees",
    "The 21 Million Cap",
    "Double Spending",
    "51% Attacks",
    "SHA-256",
    "Elliptic Curve Cryptography",
    "Schnorr Signatures",
    "Taproot",
    "Segregated Witness",
    "The Lightning Network",
    "Payment Channels",
    "Full Nodes",
    "Self-Custody",
    "Seed Phrases",
    "Multisig Wallets",
    "Hardware Wallets",
    "Timelocks",
    "Bitcoin Script",
    "Merkle Trees",
    "Block Headers",
    "The Nonce",
    "Chain Reorganizations",
    "Soft Forks",
    "The Blocksize Wars",
    "Cypherpunks",
    "Satoshi Nakamoto",
    "The Whitepaper",
    "Hash Rate",
    "Energy and Mining",
    "Censorship Resistance",
    "Sound Money",
    "Time Preference",
    "Inflation and Fiat",
    "Satoshis",
    "Peer-to-Peer Gossip",
    "Coinbase Transactions",
    "Replace-by-Fee",
    "CoinJoin",
    "Privacy on a Public Ledger",
    "The Byzantine Generals Problem",
    "Orphaned Blocks",
    "Mining Pools",
    "The Timechain",
];

/// Picks a topic that is not in `exclude`, comparing case-insensitively.
///
/// When the exclusion list covers the whole catalog the choice falls back to
/// the full catalog, so this never fails. The result depends only on `exclude`
/// and `rng`.
///
/// ```
/// use bitscroll::generation::{pick_topic, BITCOIN_TOPICS};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let topic = pick_topic(&["mining".to_string()], &mut rng);
/// assert!(BITCOIN_TOPICS.contains(&topic));
/// assert_ne!(topic, "Mining");
/// ```
pub fn pick_topic<R: Rng + ?Sized>(exclude: &[String], rng: &mut R) -> &'static str {
    let excluded: HashSet<String> = exclude.iter().map(|t| t.to_lowercase()).collect();

    let available: Vec<&'static str> = BITCOIN_TOPICS
        .iter()
        .copied()
        .filter(|topic| !excluded.contains(&topic.to_lowercase()))
        .collect();

    let pool: &[&'static str] = if available.is_empty() {
        tracing::debug!(
            excluded = excluded.len(),
            "Every topic excluded, falling back to full catalog"
        );
        BITCOIN_TOPICS
    } else {
        &available
    };

    pool.choose(rng).copied().unwrap_or(BITCOIN_TOPICS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn all_topics() -> Vec<String> {
        BITCOIN_TOPICS.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_excluded_topic_never_chosen() {
        let exclude = vec!["Proof of Work".to_string()];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            assert_ne!(pick_topic(&exclude, &mut rng), "Proof of Work");
        }
    }

    #[test]
    fn test_exclusion_is_case_insensitive() {
        let exclude: Vec<String> = BITCOIN_TOPICS
            .iter()
            .filter(|t| **t != "Taproot")
            .map(|t| t.to_uppercase())
            .collect();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(pick_topic(&exclude, &mut rng), "Taproot");
    }

    #[test]
    fn test_full_exclusion_falls_back_to_catalog() {
        let mut rng = StdRng::seed_from_u64(3);
        let topic = pick_topic(&all_topics(), &mut rng);
        assert!(BITCOIN_TOPICS.contains(&topic));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let exclude = vec!["Mining".to_string()];
        let a = pick_topic(&exclude, &mut StdRng::seed_from_u64(42));
        let b = pick_topic(&exclude, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_catalog_has_no_case_duplicates() {
        let unique: HashSet<String> = BITCOIN_TOPICS.iter().map(|t| t.to_lowercase()).collect();
        assert_eq!(unique.len(), BITCOIN_TOPICS.len());
    }

    proptest! {
        #[test]
        fn prop_pick_returns_catalog_member(
            exclude in proptest::collection::vec(".{0,24}", 0..12),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let topic = pick_topic(&exclude, &mut rng);
            prop_assert!(BITCOIN_TOPICS.contains(&topic));
        }

        #[test]
        fn prop_pick_avoids_catalog_exclusions(
            indices in proptest::collection::vec(0..BITCOIN_TOPICS.len(), 0..10),
            seed in any::<u64>(),
        ) {
            let exclude: Vec<String> = indices.iter().map(|&i| BITCOIN_TOPICS[i].to_string()).collect();
            let mut rng = StdRng::seed_from_u64(seed);
            let topic = pick_topic(&exclude, &mut rng);
            prop_assert!(!exclude.iter().any(|e| e.eq_ignore_ascii_case(topic)));
        }
    }
}
