//! Ledger-side data types.
//!
//! Balances are carried in the token's smallest unit as `u128`, parsed
//! from the wire's string amount. Comparing in smallest units avoids the
//! rounding that bites when a UI-facing decimal balance is reused for an
//! authorization check.

use serde::Deserialize;

/// A token-holding account, fetched on demand and never cached beyond a
/// single authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccount {
    pub account_id: String,
    pub owner: String,
    pub mint: String,
    /// Balance in smallest units.
    pub balance: u128,
    pub decimals: u8,
}

impl TokenAccount {
    /// The smallest-unit amount representing one whole token.
    pub fn whole_token(&self) -> u128 {
        10u128.pow(self.decimals as u32)
    }
}

/// Wire shape of a token account from the ledger index query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccountRecord {
    pub account_id: String,
    /// Smallest-unit balance as a decimal string.
    pub balance: String,
    pub decimals: u8,
}

impl TokenAccountRecord {
    /// Converts the wire record into a domain account. Fails on a balance
    /// string that is not a base-10 integer.
    pub fn into_account(self, owner: &str, mint: &str) -> Result<TokenAccount, String> {
        let balance: u128 = self
            .balance
            .parse()
            .map_err(|_| format!("invalid balance '{}' on account {}", self.balance, self.account_id))?;
        Ok(TokenAccount {
            account_id: self.account_id,
            owner: owner.to_string(),
            mint: mint.to_string(),
            balance,
            decimals: self.decimals,
        })
    }
}

/// An unsigned single-instruction transfer, ready for the external signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTransaction {
    pub source_account: String,
    pub destination_account: String,
    /// Smallest-unit amount.
    pub amount: u128,
    /// Recent-block reference; must be freshly fetched for every attempt,
    /// a stale one gets the submission rejected.
    pub recent_blockhash: String,
}

/// An opaque signed transaction as produced by the external signer.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub payload: Vec<u8>,
}

/// Outcome of a confirmation query for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Not yet confirmed; keep waiting.
    Pending,
    Confirmed,
    /// The ledger recorded the transaction as failed, with a raw reason.
    Failed(String),
}

/// Receipt for a confirmed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub signature: String,
}
