//! Content items and their collection market.
//!
//! Item ids start at 1. An item's epoch counts its collections; a collector
//! names the epoch they priced against so a collection that landed first
//! invalidates theirs.

use serde::{Deserialize, Serialize};

use wave_core::config::{ContentConfig, PriceDecay};
use wave_core::constants::BPS_PRECISION;
use wave_core::error::ContentError;
use wave_core::math::mul_div;
use wave_core::types::Address;

use crate::decay::decayed_price;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u64,
    pub creator: Address,
    /// Current curator. `None` until the first collection.
    pub owner: Option<Address>,
    pub uri: String,
    pub epoch: u64,
    pub created_at: u64,
    /// Creation time until the first collection.
    pub last_collected_at: u64,
    /// Price paid at the last collection; zero before.
    pub last_price: u128,
    /// Decay ceiling set by the last collection.
    pub current_price: u128,
}

/// A committed collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub item_id: u64,
    pub collector: Address,
    pub previous_owner: Option<Address>,
    /// Price the previous owner paid, i.e. their stake in the item.
    pub previous_price: u128,
    pub price: u128,
    /// Epoch after the collection.
    pub epoch: u64,
    pub new_ceiling: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMarket {
    items: Vec<ContentItem>,
    min_price: u128,
    ceiling_multiplier_bps: u128,
    decay: PriceDecay,
}

impl ContentMarket {
    pub fn new(min_price: u128, ceiling_multiplier_bps: u128, decay: PriceDecay) -> Self {
        Self { items: Vec::new(), min_price, ceiling_multiplier_bps, decay }
    }

    pub fn from_config(cfg: &ContentConfig) -> Self {
        Self::new(cfg.min_init_price(), cfg.ceiling_multiplier_bps as u128, cfg.decay)
    }

    pub fn min_price(&self) -> u128 {
        self.min_price
    }

    pub fn decay(&self) -> &PriceDecay {
        &self.decay
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn item(&self, id: u64) -> Option<&ContentItem> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.items.get(index)
    }

    fn get(&self, id: u64) -> Result<&ContentItem, ContentError> {
        self.item(id).ok_or(ContentError::UnknownItem(id))
    }

    /// Register a new item priced at the floor. Returns its id.
    pub fn create(&mut self, creator: Address, uri: impl Into<String>, now: u64) -> u64 {
        let id = self.items.len() as u64 + 1;
        self.items.push(ContentItem {
            id,
            creator,
            owner: None,
            uri: uri.into(),
            epoch: 0,
            created_at: now,
            last_collected_at: now,
            last_price: 0,
            current_price: self.min_price,
        });
        id
    }

    /// Price a collector would pay at `now`.
    pub fn next_price(&self, id: u64, now: u64) -> Result<u128, ContentError> {
        let item = self.get(id)?;
        let elapsed = now.saturating_sub(item.last_collected_at);
        Ok(decayed_price(self.min_price, item.current_price, &self.decay, elapsed)?)
    }

    /// Ceiling set after a collection at `price`.
    pub fn ceiling_after(&self, price: u128) -> Result<u128, ContentError> {
        let scaled = mul_div(price, self.ceiling_multiplier_bps, BPS_PRECISION)?;
        Ok(scaled.max(self.min_price))
    }

    /// Validate a collection without committing it. Returns the live price.
    ///
    /// Checks run in order: unknown item, epoch, deadline, price.
    pub fn check_collect(
        &self,
        id: u64,
        expected_epoch: u64,
        deadline: Option<u64>,
        max_price: u128,
        now: u64,
    ) -> Result<u128, ContentError> {
        let item = self.get(id)?;
        if item.epoch != expected_epoch {
            return Err(ContentError::EpochMismatch { expected: expected_epoch, live: item.epoch });
        }
        if let Some(deadline) = deadline {
            if now > deadline {
                return Err(ContentError::Expired { deadline, now });
            }
        }
        let price = self.next_price(id, now)?;
        if price > max_price {
            return Err(ContentError::PriceExceeded { price, max_price });
        }
        Ok(price)
    }

    /// Collect item `id` for `collector` at the live price.
    pub fn collect(
        &mut self,
        id: u64,
        collector: Address,
        expected_epoch: u64,
        deadline: Option<u64>,
        max_price: u128,
        now: u64,
    ) -> Result<Collection, ContentError> {
        let price = self.check_collect(id, expected_epoch, deadline, max_price, now)?;
        let new_ceiling = self.ceiling_after(price)?;
        let index = (id - 1) as usize;
        let item = &mut self.items[index];

        let collection = Collection {
            item_id: id,
            collector,
            previous_owner: item.owner,
            previous_price: item.last_price,
            price,
            epoch: item.epoch + 1,
            new_ceiling,
        };
        item.owner = Some(collector);
        item.epoch += 1;
        item.last_collected_at = now;
        item.last_price = price;
        item.current_price = new_ceiling;
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave_core::constants::CONTENT_MIN_INIT_PRICE;

    const DAY: PriceDecay = PriceDecay::Linear { duration_secs: 86_400 };

    fn creator() -> Address {
        Address::from_label("creator")
    }

    fn curator(n: u8) -> Address {
        Address([n; 20])
    }

    fn market() -> ContentMarket {
        ContentMarket::new(1, 20_000, DAY)
    }

    #[test]
    fn ids_start_at_one() {
        let mut m = market();
        assert_eq!(m.create(creator(), "ipfs://a", 10), 1);
        assert_eq!(m.create(creator(), "ipfs://b", 10), 2);
        assert_eq!(m.len(), 2);
        assert!(m.item(0).is_none());
        assert!(m.item(3).is_none());
        assert_eq!(m.item(2).unwrap().uri, "ipfs://b");
    }

    #[test]
    fn new_item_costs_the_floor() {
        let mut m = ContentMarket::from_config(&ContentConfig::default());
        let id = m.create(creator(), "ipfs://a", 0);
        assert_eq!(m.next_price(id, 0).unwrap(), CONTENT_MIN_INIT_PRICE);
        assert_eq!(m.next_price(id, 1_000_000).unwrap(), CONTENT_MIN_INIT_PRICE);
    }

    #[test]
    fn collect_sets_doubled_ceiling_then_decays() {
        let mut m = market();
        let id = m.create(creator(), "ipfs://a", 0);
        let c = m.collect(id, curator(1), 0, None, 1, 0).unwrap();
        assert_eq!(c.price, 1);
        assert_eq!(c.new_ceiling, 2);
        assert_eq!(c.epoch, 1);
        assert_eq!(c.previous_owner, None);

        // Collect again immediately at the ceiling.
        let c = m.collect(id, curator(2), 1, None, 2, 0).unwrap();
        assert_eq!(c.price, 2);
        assert_eq!(c.previous_owner, Some(curator(1)));
        assert_eq!(c.previous_price, 1);
        assert_eq!(m.item(id).unwrap().current_price, 4);
        assert_eq!(m.next_price(id, 86_400).unwrap(), 1);
    }

    #[test]
    fn ceiling_after_five_is_ten() {
        assert_eq!(market().ceiling_after(5).unwrap(), 10);
        assert_eq!(market().ceiling_after(0).unwrap(), 1);
    }

    #[test]
    fn epoch_mismatch_wins_over_everything() {
        let mut m = market();
        let id = m.create(creator(), "ipfs://a", 0);
        let err = m.collect(id, curator(1), 5, Some(0), 0, 100).unwrap_err();
        assert_eq!(err, ContentError::EpochMismatch { expected: 5, live: 0 });
    }

    #[test]
    fn collect_check_order() {
        let mut m = market();
        let id = m.create(creator(), "ipfs://a", 0);
        assert_eq!(m.collect(9, curator(1), 0, None, 10, 0), Err(ContentError::UnknownItem(9)));
        assert_eq!(
            m.collect(id, curator(1), 0, Some(5), 0, 6),
            Err(ContentError::Expired { deadline: 5, now: 6 })
        );
        assert_eq!(
            m.collect(id, curator(1), 0, Some(6), 0, 6),
            Err(ContentError::PriceExceeded { price: 1, max_price: 0 })
        );
        // Nothing changed.
        assert_eq!(m.item(id).unwrap().epoch, 0);
        assert_eq!(m.item(id).unwrap().owner, None);
    }

    #[test]
    fn price_before_last_collection_time_is_ceiling() {
        let mut m = market();
        let id = m.create(creator(), "ipfs://a", 100);
        m.collect(id, curator(1), 0, None, 1, 100).unwrap();
        assert_eq!(m.next_price(id, 50).unwrap(), 2);
    }

    #[test]
    fn market_serializes() {
        let mut m = market();
        m.create(creator(), "ipfs://a", 0);
        let json = serde_json::to_string(&m).unwrap();
        let back: ContentMarket = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
