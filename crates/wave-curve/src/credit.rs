//! Credit line: borrow quote against the floor value of a token balance.
//!
//! Borrowed quote leaves the market vault but stays part of the real
//! reserve; the debt is a claim on it. The vault therefore holds
//! `real_quote_reserve - total_debt`.
//!
//! Every holder keeps `debt <= floor_value(balance)`. Borrowing checks it
//! directly; transfers, sells and burns check it through
//! [`CreditLine::ensure_can_release`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wave_core::error::CreditError;
use wave_core::math::{add, sub};
use wave_core::types::Address;

use crate::market::Market;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    debts: BTreeMap<Address, u128>,
    total_debt: u128,
}

impl CreditLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debt(&self, account: &Address) -> u128 {
        self.debts.get(account).copied().unwrap_or(0)
    }

    pub fn total_debt(&self) -> u128 {
        self.total_debt
    }

    /// Accounts with outstanding debt, in address order.
    pub fn debtors(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.debts.iter()
    }

    /// Quote the market vault actually holds.
    pub fn vault_liquidity(&self, market: &Market) -> u128 {
        market.real_quote_reserve().saturating_sub(self.total_debt)
    }

    /// Maximum debt `balance` can carry.
    pub fn credit_limit(&self, market: &Market, balance: u128) -> Result<u128, CreditError> {
        Ok(market.floor_value(balance)?)
    }

    /// Additional quote `account` could borrow against `balance`.
    pub fn available_credit(
        &self,
        market: &Market,
        account: &Address,
        balance: u128,
    ) -> Result<u128, CreditError> {
        Ok(self.credit_limit(market, balance)?.saturating_sub(self.debt(account)))
    }

    /// Record a borrow of `amount` against `balance`. Returns the new debt.
    ///
    /// # Errors
    ///
    /// - [`CreditError::ZeroAmount`] if `amount` is zero
    /// - [`CreditError::InsufficientCollateral`] if the debt would exceed the floor value
    /// - [`CreditError::InsufficientLiquidity`] if the vault holds less than `amount`
    pub fn borrow(
        &mut self,
        market: &Market,
        account: &Address,
        balance: u128,
        amount: u128,
    ) -> Result<u128, CreditError> {
        if amount == 0 {
            return Err(CreditError::ZeroAmount);
        }
        let debt = add(self.debt(account), amount)?;
        let limit = self.credit_limit(market, balance)?;
        if debt > limit {
            return Err(CreditError::InsufficientCollateral { debt, limit });
        }
        let available = self.vault_liquidity(market);
        if available < amount {
            return Err(CreditError::InsufficientLiquidity { need: amount, available });
        }
        let total = add(self.total_debt, amount)?;
        self.debts.insert(*account, debt);
        self.total_debt = total;
        Ok(debt)
    }

    /// Reduce `account`'s debt by up to `amount`. Returns the amount repaid.
    ///
    /// # Errors
    ///
    /// - [`CreditError::ZeroAmount`] if `amount` is zero
    /// - [`CreditError::NoDebt`] if `account` owes nothing
    pub fn repay(&mut self, account: &Address, amount: u128) -> Result<u128, CreditError> {
        if amount == 0 {
            return Err(CreditError::ZeroAmount);
        }
        let debt = self.debt(account);
        if debt == 0 {
            return Err(CreditError::NoDebt);
        }
        let repaid = amount.min(debt);
        let total = sub(self.total_debt, repaid)?;
        if repaid == debt {
            self.debts.remove(account);
        } else {
            self.debts.insert(*account, debt - repaid);
        }
        self.total_debt = total;
        Ok(repaid)
    }

    /// Check that `account` may give up `amount` of its `balance`.
    ///
    /// # Errors
    ///
    /// - [`CreditError::DebtExceedsCollateral`] if the remaining balance no
    ///   longer covers the debt
    pub fn ensure_can_release(
        &self,
        market: &Market,
        account: &Address,
        balance: u128,
        amount: u128,
    ) -> Result<(), CreditError> {
        let debt = self.debt(account);
        if debt == 0 {
            return Ok(());
        }
        let remaining = balance.saturating_sub(amount);
        let limit = market.floor_value(remaining)?;
        if limit < debt {
            return Err(CreditError::DebtExceedsCollateral { debt, limit });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave_core::constants::{INITIAL_SUPPLY, QUOTE_UNIT, RESERVE_VIRT_QUOTE_RAW};
    use wave_core::error::MarketError;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    /// Market with `seed` quote bought by a single holder; returns the holder's balance.
    fn setup(seed: u128) -> (Market, u128) {
        Market::launch(RESERVE_VIRT_QUOTE_RAW, INITIAL_SUPPLY, seed, true).unwrap()
    }

    #[test]
    fn borrow_up_to_floor_value() {
        let (m, bal) = setup(1_000 * QUOTE_UNIT);
        let mut credit = CreditLine::new();
        let limit = credit.credit_limit(&m, bal).unwrap();
        assert!(limit > 0);
        assert_eq!(credit.borrow(&m, &alice(), bal, limit).unwrap(), limit);
        assert_eq!(credit.total_debt(), limit);
        assert_eq!(credit.available_credit(&m, &alice(), bal).unwrap(), 0);
        assert_eq!(
            credit.borrow(&m, &alice(), bal, 1),
            Err(CreditError::InsufficientCollateral { debt: limit + 1, limit })
        );
    }

    #[test]
    fn borrow_zero_fails() {
        let (m, bal) = setup(QUOTE_UNIT);
        assert_eq!(CreditLine::new().borrow(&m, &alice(), bal, 0), Err(CreditError::ZeroAmount));
    }

    #[test]
    fn borrow_without_balance_fails() {
        let (m, _) = setup(QUOTE_UNIT);
        assert_eq!(
            CreditLine::new().borrow(&m, &bob(), 0, 1),
            Err(CreditError::InsufficientCollateral { debt: 1, limit: 0 })
        );
    }

    #[test]
    fn borrow_limited_by_vault_liquidity() {
        let (m, bal) = setup(1_000 * QUOTE_UNIT);
        let mut credit = CreditLine::new();
        // Another debtor already drained most of the vault.
        credit.debts.insert(bob(), m.real_quote_reserve() - 1);
        credit.total_debt = m.real_quote_reserve() - 1;
        assert_eq!(
            credit.borrow(&m, &alice(), bal, 2),
            Err(CreditError::InsufficientLiquidity { need: 2, available: 1 })
        );
    }

    #[test]
    fn borrow_balance_beyond_circulating_is_market_error() {
        let (m, bal) = setup(QUOTE_UNIT);
        let err = CreditLine::new().borrow(&m, &alice(), bal + 1, 1).unwrap_err();
        assert!(matches!(err, CreditError::Market(MarketError::ExceedsCirculating { .. })));
    }

    #[test]
    fn repay_partial_then_excess() {
        let (m, bal) = setup(1_000 * QUOTE_UNIT);
        let mut credit = CreditLine::new();
        credit.borrow(&m, &alice(), bal, 100).unwrap();
        assert_eq!(credit.repay(&alice(), 40).unwrap(), 40);
        assert_eq!(credit.debt(&alice()), 60);
        assert_eq!(credit.repay(&alice(), 1_000).unwrap(), 60);
        assert_eq!(credit.debt(&alice()), 0);
        assert_eq!(credit.total_debt(), 0);
        assert_eq!(credit.debtors().count(), 0);
    }

    #[test]
    fn repay_without_debt_fails() {
        let mut credit = CreditLine::new();
        assert_eq!(credit.repay(&alice(), 1), Err(CreditError::NoDebt));
        assert_eq!(credit.repay(&alice(), 0), Err(CreditError::ZeroAmount));
    }

    #[test]
    fn release_is_gated_by_debt() {
        let (m, bal) = setup(1_000 * QUOTE_UNIT);
        let mut credit = CreditLine::new();
        // No debt: anything goes.
        credit.ensure_can_release(&m, &alice(), bal, bal).unwrap();

        let half_limit = credit.credit_limit(&m, bal / 2).unwrap();
        credit.borrow(&m, &alice(), bal, half_limit).unwrap();
        credit.ensure_can_release(&m, &alice(), bal, bal / 2).unwrap();
        let err = credit.ensure_can_release(&m, &alice(), bal, bal / 2 + bal / 10).unwrap_err();
        assert!(matches!(err, CreditError::DebtExceedsCollateral { .. }));
    }

    #[test]
    fn heal_restores_headroom() {
        let (mut m, bal) = setup(1_000 * QUOTE_UNIT);
        let mut credit = CreditLine::new();
        let limit = credit.credit_limit(&m, bal).unwrap();
        credit.borrow(&m, &alice(), bal, limit).unwrap();
        m.heal(500 * QUOTE_UNIT).unwrap();
        assert!(credit.available_credit(&m, &alice(), bal).unwrap() > 0);
    }
}
