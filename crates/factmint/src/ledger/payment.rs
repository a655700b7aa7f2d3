//! Payment authorization: the admission-control gate of the pipeline.
//!
//! One whole token (`10^decimals` smallest units) moves from the payer's
//! richest token account to the treasury. The step is synchronous and must
//! succeed before any job is submitted. Single-flight per action: a second
//! attempt for the same action while one is outstanding is rejected.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::error::LedgerError;
use crate::ledger::client::{LedgerClient, TransactionSigner};
use crate::ledger::resolver::resolve_token_account;
use crate::ledger::types::{ConfirmationStatus, TransferReceipt, TransferTransaction};

/// Builds, signs, submits and confirms the value-transfer transaction that
/// authorizes a paid action.
pub struct PaymentAuthorizer {
    client: Arc<dyn LedgerClient>,
    signer: Arc<dyn TransactionSigner>,
    treasury_owner: String,
    token_mint: String,
    confirm_rounds: u32,
    confirm_interval: std::time::Duration,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes the action from the in-flight set when the attempt finishes,
/// on every exit path.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    action: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.action);
        }
    }
}

impl PaymentAuthorizer {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
        treasury_owner: &str,
        token_mint: &str,
        confirm_rounds: u32,
        confirm_interval: std::time::Duration,
    ) -> Self {
        Self {
            client,
            signer,
            treasury_owner: treasury_owner.to_string(),
            token_mint: token_mint.to_string(),
            confirm_rounds,
            confirm_interval,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Authorizes the paid action identified by `action` for wallet `payer`.
    ///
    /// Blocks until the ledger confirms the transfer or reports an error.
    pub async fn authorize(
        &self,
        action: &str,
        payer: &str,
    ) -> Result<TransferReceipt, LedgerError> {
        let _guard = self.claim(action)?;

        let source = resolve_token_account(self.client.as_ref(), payer, &self.token_mint).await?;
        let destination = resolve_token_account(
            self.client.as_ref(),
            &self.treasury_owner,
            &self.token_mint,
        )
        .await?;

        // One whole token in smallest units, derived from the mint's
        // decimals rather than any UI-facing decimal balance.
        let amount = source.whole_token();
        if source.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                balance: source.balance,
                required: amount,
            });
        }

        // A stale recent-block reference gets the submission rejected, so
        // fetch a fresh one for every attempt.
        let recent_blockhash = self.client.latest_blockhash().await?;

        let transaction = TransferTransaction {
            source_account: source.account_id.clone(),
            destination_account: destination.account_id.clone(),
            amount,
            recent_blockhash,
        };

        let signed = self.signer.sign(&transaction).await?;
        let signature = self.client.submit_transaction(&signed).await?;
        info!(
            "Submitted transfer of {} smallest units for action {}: {}",
            amount, action, signature
        );

        self.await_confirmation(&signature).await?;
        Ok(TransferReceipt { signature })
    }

    fn claim(&self, action: &str) -> Result<InFlightGuard<'_>, LedgerError> {
        let mut set = self.in_flight.lock().map_err(|_| {
            LedgerError::Rpc("payment in-flight tracking lock poisoned".to_string())
        })?;
        if !set.insert(action.to_string()) {
            return Err(LedgerError::PaymentInFlight {
                action: action.to_string(),
            });
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            action: action.to_string(),
        })
    }

    async fn await_confirmation(&self, signature: &str) -> Result<(), LedgerError> {
        for round in 0..self.confirm_rounds {
            match self.client.signature_status(signature).await? {
                ConfirmationStatus::Confirmed => {
                    info!("Transfer {} confirmed", signature);
                    return Ok(());
                }
                ConfirmationStatus::Failed(reason) => {
                    warn!("Transfer {} rejected by the ledger: {}", signature, reason);
                    return Err(LedgerError::TransferRejected(reason));
                }
                ConfirmationStatus::Pending => {
                    if round + 1 < self.confirm_rounds {
                        tokio::time::sleep(self.confirm_interval).await;
                    }
                }
            }
        }
        Err(LedgerError::ConfirmationTimeout {
            signature: signature.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::ledger::types::{SignedTransaction, TokenAccount};

    /// Scripted ledger: fixed balances, counts blockhash fetches, optional
    /// confirmation script.
    struct FakeLedger {
        payer_balance: u128,
        decimals: u8,
        blockhash_fetches: AtomicU32,
        confirmations: Mutex<Vec<ConfirmationStatus>>,
    }

    impl FakeLedger {
        fn with_balance(balance: u128) -> Self {
            Self {
                payer_balance: balance,
                decimals: 6,
                blockhash_fetches: AtomicU32::new(0),
                confirmations: Mutex::new(vec![ConfirmationStatus::Confirmed]),
            }
        }
    }

    #[async_trait]
    impl LedgerClient for FakeLedger {
        async fn token_accounts_by_owner(
            &self,
            owner: &str,
            mint: &str,
        ) -> Result<Vec<TokenAccount>, LedgerError> {
            let balance = if owner == "treasury" { 0 } else { self.payer_balance };
            Ok(vec![TokenAccount {
                account_id: format!("{}-account", owner),
                owner: owner.to_string(),
                mint: mint.to_string(),
                balance,
                decimals: self.decimals,
            }])
        }

        async fn latest_blockhash(&self) -> Result<String, LedgerError> {
            let n = self.blockhash_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(format!("blockhash-{}", n))
        }

        async fn submit_transaction(
            &self,
            _tx: &SignedTransaction,
        ) -> Result<String, LedgerError> {
            Ok("sig-1".to_string())
        }

        async fn signature_status(
            &self,
            _signature: &str,
        ) -> Result<ConfirmationStatus, LedgerError> {
            let mut script = self.confirmations.lock().unwrap();
            Ok(if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            })
        }
    }

    struct FakeSigner {
        decline: bool,
    }

    #[async_trait]
    impl TransactionSigner for FakeSigner {
        async fn sign(&self, tx: &TransferTransaction) -> Result<SignedTransaction, LedgerError> {
            if self.decline {
                return Err(LedgerError::SignerDeclined("user rejected".to_string()));
            }
            Ok(SignedTransaction {
                payload: tx.recent_blockhash.as_bytes().to_vec(),
            })
        }
    }

    fn authorizer(ledger: Arc<FakeLedger>, decline: bool) -> PaymentAuthorizer {
        PaymentAuthorizer::new(
            ledger,
            Arc::new(FakeSigner { decline }),
            "treasury",
            "mint-1",
            3,
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn test_authorize_succeeds_at_exact_balance() {
        // decimals = 6: one whole token is exactly 1_000_000 smallest units
        let ledger = Arc::new(FakeLedger::with_balance(1_000_000));
        let auth = authorizer(Arc::clone(&ledger), false);

        let receipt = auth.authorize("task-1", "payer").await.unwrap();
        assert_eq!(receipt.signature, "sig-1");
    }

    #[tokio::test]
    async fn test_authorize_rejects_one_unit_short() {
        let ledger = Arc::new(FakeLedger::with_balance(999_999));
        let auth = authorizer(ledger, false);

        let err = auth.authorize("task-1", "payer").await.unwrap_err();
        match err {
            LedgerError::InsufficientBalance { balance, required } => {
                assert_eq!(balance, 999_999);
                assert_eq!(required, 1_000_000);
            }
            other => panic!("expected InsufficientBalance, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fresh_blockhash_per_attempt() {
        let ledger = Arc::new(FakeLedger::with_balance(2_000_000));
        let auth = authorizer(Arc::clone(&ledger), false);

        auth.authorize("task-1", "payer").await.unwrap();
        auth.authorize("task-2", "payer").await.unwrap();

        assert_eq!(ledger.blockhash_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_signer_decline_is_fatal() {
        let ledger = Arc::new(FakeLedger::with_balance(1_000_000));
        let auth = authorizer(ledger, true);

        let err = auth.authorize("task-1", "payer").await.unwrap_err();
        assert!(matches!(err, LedgerError::SignerDeclined(_)));
    }

    #[tokio::test]
    async fn test_ledger_reported_failure_is_transfer_rejected() {
        let ledger = Arc::new(FakeLedger::with_balance(1_000_000));
        *ledger.confirmations.lock().unwrap() =
            vec![ConfirmationStatus::Failed("custom program error".to_string())];
        let auth = authorizer(ledger, false);

        let err = auth.authorize("task-1", "payer").await.unwrap_err();
        match err {
            LedgerError::TransferRejected(reason) => {
                assert!(reason.contains("custom program error"))
            }
            other => panic!("expected TransferRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_confirmation_timeout_after_rounds() {
        let ledger = Arc::new(FakeLedger::with_balance(1_000_000));
        *ledger.confirmations.lock().unwrap() = vec![ConfirmationStatus::Pending];
        let auth = authorizer(ledger, false);

        let err = auth.authorize("task-1", "payer").await.unwrap_err();
        assert!(matches!(err, LedgerError::ConfirmationTimeout { .. }));
    }

    #[tokio::test]
    async fn test_waits_through_pending_to_confirmed() {
        let ledger = Arc::new(FakeLedger::with_balance(1_000_000));
        *ledger.confirmations.lock().unwrap() = vec![
            ConfirmationStatus::Pending,
            ConfirmationStatus::Confirmed,
        ];
        let auth = authorizer(ledger, false);

        assert!(auth.authorize("task-1", "payer").await.is_ok());
    }

    #[tokio::test]
    async fn test_single_flight_rejects_concurrent_attempt() {
        let ledger = Arc::new(FakeLedger::with_balance(1_000_000));
        let auth = Arc::new(authorizer(ledger, false));

        // Hold the in-flight claim manually; a live attempt would hold it
        // across its awaits the same way.
        let guard = auth.claim("task-1").unwrap();
        let err = auth.authorize("task-1", "payer").await.unwrap_err();
        assert!(matches!(err, LedgerError::PaymentInFlight { .. }));

        // Released claim allows a new attempt.
        drop(guard);
        assert!(auth.authorize("task-1", "payer").await.is_ok());
    }
}
