//! Collateral asset registry
//!
//! Built once from parallel token / price-feed lists and never modified.
//! Iteration follows insertion order so aggregate valuations are
//! deterministic.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ethers::types::Address;

use crate::error::{validation, EngineError, EngineResult};
use crate::oracle::PriceFeed;
use crate::token::AssetTransfer;

/// A collaborator handle together with its address
pub struct Deployed<T: ?Sized> {
    pub address: Address,
    pub contract: Arc<T>,
}

impl<T: ?Sized> Deployed<T> {
    pub fn new(address: Address, contract: Arc<T>) -> Self {
        Self { address, contract }
    }
}

impl<T: ?Sized> Clone for Deployed<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address,
            contract: Arc::clone(&self.contract),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Deployed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployed").field("address", &self.address).finish()
    }
}

/// One registered collateral asset
pub struct CollateralAsset {
    pub token: Arc<dyn AssetTransfer>,
    pub feed_address: Address,
    pub feed: Arc<dyn PriceFeed>,
}

pub struct AssetRegistry {
    order: Vec<Address>,
    assets: HashMap<Address, CollateralAsset>,
}

impl AssetRegistry {
    pub fn new(
        tokens: Vec<Deployed<dyn AssetTransfer>>,
        feeds: Vec<Deployed<dyn PriceFeed>>,
    ) -> EngineResult<Self> {
        if tokens.len() != feeds.len() {
            return Err(EngineError::ConfigLengthMismatch {
                tokens: tokens.len(),
                feeds: feeds.len(),
            });
        }

        let mut order = Vec::with_capacity(tokens.len());
        let mut assets = HashMap::with_capacity(tokens.len());
        for (token, feed) in tokens.into_iter().zip(feeds) {
            validation::non_zero_address(token.address)?;
            validation::non_zero_address(feed.address)?;
            if assets.contains_key(&token.address) {
                return Err(EngineError::InvalidConfiguration {
                    message: format!("collateral token {:?} listed twice", token.address),
                });
            }
            order.push(token.address);
            assets.insert(
                token.address,
                CollateralAsset {
                    token: token.contract,
                    feed_address: feed.address,
                    feed: feed.contract,
                },
            );
        }

        Ok(Self { order, assets })
    }

    pub fn get(&self, token: Address) -> EngineResult<&CollateralAsset> {
        self.assets
            .get(&token)
            .ok_or(EngineError::TokenNotAllowed(token))
    }

    pub fn contains(&self, token: Address) -> bool {
        self.assets.contains_key(&token)
    }

    /// Registered tokens in insertion order
    pub fn tokens(&self) -> &[Address] {
        &self.order
    }

    pub fn price_feed_of(&self, token: Address) -> Option<Address> {
        self.assets.get(&token).map(|asset| asset.feed_address)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Address, &CollateralAsset)> + '_ {
        self.order
            .iter()
            .filter_map(move |token| self.assets.get(token).map(|asset| (*token, asset)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
