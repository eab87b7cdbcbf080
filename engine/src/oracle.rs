//! Price feeds
//!
//! The engine reads a feed on every valuation; nothing is cached between
//! calls. Staleness is not checked: `updated_at` is carried for callers that
//! want to display it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Latest answer of a price feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: u64,
    /// USD price scaled by `10^decimals`. Signed, as reported.
    pub answer: i128,
    /// As-of marker (seconds)
    pub updated_at: u64,
}

/// USD price source for one collateral asset
pub trait PriceFeed: Send + Sync {
    fn latest_round_data(&self) -> RoundData;
    fn decimals(&self) -> u8;
    fn description(&self) -> String {
        String::new()
    }
}

/// Settable in-process price feed
///
/// Used by the service deployment and tests in place of a live aggregator.
pub struct MockPriceFeed {
    description: String,
    decimals: u8,
    round: RwLock<RoundData>,
}

impl MockPriceFeed {
    pub fn new(description: &str, decimals: u8, answer: i128) -> Self {
        Self {
            description: description.to_string(),
            decimals,
            round: RwLock::new(RoundData {
                round_id: 1,
                answer,
                updated_at: 0,
            }),
        }
    }

    /// Publish a new answer as a new round.
    pub fn update_answer(&self, answer: i128, updated_at: u64) {
        let mut round = self.round.write();
        round.round_id += 1;
        round.answer = answer;
        round.updated_at = updated_at;
        tracing::debug!(feed = %self.description, answer, round_id = round.round_id, "price feed updated");
    }
}

impl PriceFeed for MockPriceFeed {
    fn latest_round_data(&self) -> RoundData {
        *self.round.read()
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}
