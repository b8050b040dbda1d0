//! Trait interfaces between the engine and its host environment.
//!
//! - [`Ledger`]: account balances for the quote currency and every token
//! - [`Clock`]: the timestamp an operation is evaluated at
//!
//! The engine reads time once per operation and passes it down explicitly;
//! [`Clock`] is only used by hosts that need a live time source.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::{Address, Asset};

/// A single balance change requested by an engine operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Movement {
    Transfer { asset: Asset, from: Address, to: Address, amount: u128 },
    Mint { asset: Asset, to: Address, amount: u128 },
    Burn { asset: Asset, from: Address, amount: u128 },
}

/// Balance bookkeeping supplied by the host.
///
/// Implementations must apply each call completely or not at all. The
/// engine collects every movement of an operation and submits them through
/// [`apply_batch`](Self::apply_batch) after all of its own checks passed.
pub trait Ledger: Send + Sync {
    /// Balance of `account` in `asset`. Unknown accounts hold zero.
    fn balance(&self, asset: Asset, account: &Address) -> u128;

    /// Sum of all balances of `asset`.
    fn total_issued(&self, asset: Asset) -> u128;

    /// Move `amount` of `asset` between two accounts.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InsufficientBalance`] if `from` holds less than `amount`
    fn transfer(
        &mut self,
        asset: Asset,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError>;

    /// Create `amount` of `asset` in `to`.
    fn mint(&mut self, asset: Asset, to: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Destroy `amount` of `asset` held by `from`.
    fn burn(&mut self, asset: Asset, from: &Address, amount: u128) -> Result<(), LedgerError>;

    /// Fail with [`LedgerError::InsufficientBalance`] unless `account` holds `need`.
    ///
    /// Default implementation delegates to [`balance`](Self::balance).
    fn ensure_balance(&self, asset: Asset, account: &Address, need: u128) -> Result<(), LedgerError> {
        let have = self.balance(asset, account);
        if have < need {
            return Err(LedgerError::InsufficientBalance { account: *account, have, need });
        }
        Ok(())
    }

    /// Check that `movements`, applied in order, never overdraw an account.
    ///
    /// Default implementation replays the batch against running deltas
    /// without touching state.
    fn check_batch(&self, movements: &[Movement]) -> Result<(), LedgerError> {
        // Running balance per asset/account, seeded from the ledger on first touch.
        let mut running: HashMap<(Asset, Address), u128> = HashMap::new();

        for movement in movements {
            let (debit, credit) = match movement {
                Movement::Transfer { asset, from, to, amount } => {
                    (Some((*asset, *from, *amount)), Some((*asset, *to, *amount)))
                }
                Movement::Mint { asset, to, amount } => (None, Some((*asset, *to, *amount))),
                Movement::Burn { asset, from, amount } => (Some((*asset, *from, *amount)), None),
            };
            if let Some((asset, account, amount)) = debit {
                let have = running
                    .entry((asset, account))
                    .or_insert_with(|| self.balance(asset, &account));
                if *have < amount {
                    return Err(LedgerError::InsufficientBalance {
                        account,
                        have: *have,
                        need: amount,
                    });
                }
                *have -= amount;
            }
            if let Some((asset, account, amount)) = credit {
                let have = running
                    .entry((asset, account))
                    .or_insert_with(|| self.balance(asset, &account));
                *have = have.checked_add(amount).ok_or(LedgerError::Overflow)?;
            }
        }
        Ok(())
    }

    /// Validate and apply `movements` in order.
    ///
    /// Default implementation runs [`check_batch`](Self::check_batch) first,
    /// so a rejected batch leaves every balance untouched.
    fn apply_batch(&mut self, movements: &[Movement]) -> Result<(), LedgerError> {
        self.check_batch(movements)?;
        for movement in movements {
            match movement {
                Movement::Transfer { asset, from, to, amount } => {
                    self.transfer(*asset, from, to, *amount)?
                }
                Movement::Mint { asset, to, amount } => self.mint(*asset, to, *amount)?,
                Movement::Burn { asset, from, amount } => self.burn(*asset, from, *amount)?,
            }
        }
        Ok(())
    }
}

/// Source of the per-operation timestamp (Unix seconds).
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenId;

    // ------------------------------------------------------------------
    // Mock: Ledger
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct MockLedger {
        balances: HashMap<(Asset, Address), u128>,
    }

    impl Ledger for MockLedger {
        fn balance(&self, asset: Asset, account: &Address) -> u128 {
            *self.balances.get(&(asset, *account)).unwrap_or(&0)
        }

        fn total_issued(&self, asset: Asset) -> u128 {
            self.balances
                .iter()
                .filter(|((a, _), _)| *a == asset)
                .map(|(_, v)| *v)
                .sum()
        }

        fn transfer(
            &mut self,
            asset: Asset,
            from: &Address,
            to: &Address,
            amount: u128,
        ) -> Result<(), LedgerError> {
            self.burn(asset, from, amount)?;
            self.mint(asset, to, amount)
        }

        fn mint(&mut self, asset: Asset, to: &Address, amount: u128) -> Result<(), LedgerError> {
            *self.balances.entry((asset, *to)).or_insert(0) += amount;
            Ok(())
        }

        fn burn(&mut self, asset: Asset, from: &Address, amount: u128) -> Result<(), LedgerError> {
            self.ensure_balance(asset, from, amount)?;
            *self.balances.entry((asset, *from)).or_insert(0) -= amount;
            Ok(())
        }
    }

    fn alice() -> Address {
        Address([0xA1; 20])
    }

    fn bob() -> Address {
        Address([0xB0; 20])
    }

    #[test]
    fn ensure_balance_reports_shortfall() {
        let mut ledger = MockLedger::default();
        ledger.mint(Asset::Quote, &alice(), 5).unwrap();
        assert!(ledger.ensure_balance(Asset::Quote, &alice(), 5).is_ok());
        assert_eq!(
            ledger.ensure_balance(Asset::Quote, &alice(), 6),
            Err(LedgerError::InsufficientBalance { account: alice(), have: 5, need: 6 })
        );
    }

    #[test]
    fn batch_credits_feed_later_debits() {
        let mut ledger = MockLedger::default();
        ledger.mint(Asset::Quote, &alice(), 10).unwrap();
        let batch = vec![
            Movement::Transfer { asset: Asset::Quote, from: alice(), to: bob(), amount: 10 },
            Movement::Transfer { asset: Asset::Quote, from: bob(), to: alice(), amount: 4 },
        ];
        ledger.apply_batch(&batch).unwrap();
        assert_eq!(ledger.balance(Asset::Quote, &alice()), 4);
        assert_eq!(ledger.balance(Asset::Quote, &bob()), 6);
    }

    #[test]
    fn rejected_batch_changes_nothing() {
        let mut ledger = MockLedger::default();
        let token = Asset::Token(TokenId(0));
        ledger.mint(Asset::Quote, &alice(), 10).unwrap();
        let batch = vec![
            Movement::Transfer { asset: Asset::Quote, from: alice(), to: bob(), amount: 10 },
            Movement::Burn { asset: token, from: alice(), amount: 1 },
        ];
        assert!(ledger.apply_batch(&batch).is_err());
        assert_eq!(ledger.balance(Asset::Quote, &alice()), 10);
        assert_eq!(ledger.balance(Asset::Quote, &bob()), 0);
    }

    #[test]
    fn batch_double_spend_is_caught() {
        let mut ledger = MockLedger::default();
        ledger.mint(Asset::Quote, &alice(), 10).unwrap();
        let batch = vec![
            Movement::Transfer { asset: Asset::Quote, from: alice(), to: bob(), amount: 6 },
            Movement::Burn { asset: Asset::Quote, from: alice(), amount: 6 },
        ];
        assert!(matches!(
            ledger.check_batch(&batch),
            Err(LedgerError::InsufficientBalance { have: 4, need: 6, .. })
        ));
    }

    #[test]
    fn ledger_is_object_safe() {
        let ledger = MockLedger::default();
        let dyn_ledger: &dyn Ledger = &ledger;
        assert_eq!(dyn_ledger.total_issued(Asset::Quote), 0);
    }
}
