//! Ledger integration: token-account resolution and payment authorization.

pub mod client;
pub mod payment;
pub mod resolver;
pub mod types;

pub use client::{HttpLedgerClient, LedgerClient, TransactionSigner};
pub use payment::PaymentAuthorizer;
pub use resolver::{pick_richest, resolve_token_account};
pub use types::{
    ConfirmationStatus, SignedTransaction, TokenAccount, TransferReceipt, TransferTransaction,
};
