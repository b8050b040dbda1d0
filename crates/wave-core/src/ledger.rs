//! In-memory ledger implementation.
//!
//! [`MemoryLedger`] keeps every balance in a `HashMap` and tracks issued
//! supply per asset. It backs the simulator and the test suites; hosts with
//! real custody plug their own [`Ledger`] in instead.

use std::collections::HashMap;

use crate::error::LedgerError;
use crate::traits::Ledger;
use crate::types::{Address, Asset};

/// In-memory balance storage.
///
/// No persistence. Zero balances are removed so iteration only sees
/// accounts that hold something.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    /// (asset, account) → balance.
    balances: HashMap<(Asset, Address), u128>,
    /// asset → sum of balances.
    issued: HashMap<Asset, u128>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-zero balances held.
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    /// All non-zero balances of `asset`, sorted by account.
    pub fn holders(&self, asset: Asset) -> Vec<(Address, u128)> {
        let mut holders: Vec<_> = self
            .balances
            .iter()
            .filter(|((a, _), _)| *a == asset)
            .map(|((_, account), amount)| (*account, *amount))
            .collect();
        holders.sort_by_key(|(account, _)| *account);
        holders
    }

    fn credit(&mut self, asset: Asset, to: &Address, amount: u128) -> Result<(), LedgerError> {
        let balance = self.balances.get(&(asset, *to)).copied().unwrap_or(0);
        let updated = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        if updated > 0 {
            self.balances.insert((asset, *to), updated);
        }
        Ok(())
    }

    fn debit(&mut self, asset: Asset, from: &Address, amount: u128) -> Result<(), LedgerError> {
        self.ensure_balance(asset, from, amount)?;
        let remaining = self.balance(asset, from) - amount;
        if remaining == 0 {
            self.balances.remove(&(asset, *from));
        } else {
            self.balances.insert((asset, *from), remaining);
        }
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn balance(&self, asset: Asset, account: &Address) -> u128 {
        self.balances.get(&(asset, *account)).copied().unwrap_or(0)
    }

    fn total_issued(&self, asset: Asset) -> u128 {
        self.issued.get(&asset).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: Asset,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if from == to {
            return self.ensure_balance(asset, from, amount);
        }
        // Check the credit side first so a failed transfer leaves no trace.
        self.balance(asset, to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }

    fn mint(&mut self, asset: Asset, to: &Address, amount: u128) -> Result<(), LedgerError> {
        let issued = self
            .total_issued(asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.credit(asset, to, amount)?;
        self.issued.insert(asset, issued);
        Ok(())
    }

    fn burn(&mut self, asset: Asset, from: &Address, amount: u128) -> Result<(), LedgerError> {
        self.debit(asset, from, amount)?;
        let issued = self.total_issued(asset) - amount;
        self.issued.insert(asset, issued);
        Ok(())
    }
}
