//! Token-account resolution.
//!
//! Given an owner and a mint, finds the account to pay from: the one with
//! the numerically largest smallest-unit balance. Pure read, no caching.

use crate::error::LedgerError;
use crate::ledger::client::LedgerClient;
use crate::ledger::types::TokenAccount;

/// Picks the account with the largest balance. Ties keep the first seen.
pub fn pick_richest(accounts: Vec<TokenAccount>) -> Option<TokenAccount> {
    accounts
        .into_iter()
        .reduce(|best, candidate| if candidate.balance > best.balance { candidate } else { best })
}

/// Resolves the best token account for `owner` holding `mint`.
///
/// Fails with `NoTokenAccount` when the owner holds no matching account.
pub async fn resolve_token_account(
    client: &dyn LedgerClient,
    owner: &str,
    mint: &str,
) -> Result<TokenAccount, LedgerError> {
    let accounts = client.token_accounts_by_owner(owner, mint).await?;
    pick_richest(accounts).ok_or_else(|| LedgerError::NoTokenAccount {
        owner: owner.to_string(),
        mint: mint.to_string(),
    })
}
