//! Ledger RPC client and signer abstractions.
//!
//! The pipeline talks to the ledger through the `LedgerClient` trait so
//! tests can substitute a scripted implementation; `HttpLedgerClient` is
//! the JSON-RPC implementation used in production.

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::error::LedgerError;
use crate::ledger::types::{
    ConfirmationStatus, SignedTransaction, TokenAccount, TokenAccountRecord, TransferTransaction,
};

/// Read and submit operations against the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// All accounts holding `mint` under `owner`. An empty list is a valid
    /// response; the resolver decides what that means.
    async fn token_accounts_by_owner(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Vec<TokenAccount>, LedgerError>;

    /// A fresh recent-block reference. Callers must not reuse one across
    /// submission attempts.
    async fn latest_blockhash(&self) -> Result<String, LedgerError>;

    /// Submits a signed transaction; returns its signature.
    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<String, LedgerError>;

    /// Confirmation status for a previously submitted signature.
    async fn signature_status(&self, signature: &str) -> Result<ConfirmationStatus, LedgerError>;
}

/// External signer for value-transfer transactions. May reject, which the
/// pipeline treats as a user decline.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign(&self, tx: &TransferTransaction) -> Result<SignedTransaction, LedgerError>;
}

// ─── JSON-RPC wire types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockhashResult {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResult {
    signature: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmResult {
    confirmed: bool,
    #[serde(default)]
    err: Option<String>,
}

// ─── HTTP implementation ────────────────────────────────────────────────────

/// JSON-RPC ledger client over HTTP.
pub struct HttpLedgerClient {
    http: reqwest::Client,
    rpc_url: String,
}

impl HttpLedgerClient {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            rpc_url: rpc_url.to_string(),
        }
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, LedgerError> {
        debug!("Ledger RPC {} -> {}", method, self.rpc_url);
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()))?;

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::MalformedResponse(e.to_string()))?;

        if let Some(err) = envelope.error {
            return Err(LedgerError::Rpc(err.message));
        }
        envelope
            .result
            .ok_or_else(|| LedgerError::MalformedResponse(format!("{}: empty result", method)))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn token_accounts_by_owner(
        &self,
        owner: &str,
        mint: &str,
    ) -> Result<Vec<TokenAccount>, LedgerError> {
        let records: Vec<TokenAccountRecord> = self
            .rpc(
                "getTokenAccountsByOwner",
                json!({ "ownerAddress": owner, "tokenMint": mint }),
            )
            .await?;

        records
            .into_iter()
            .map(|r| r.into_account(owner, mint).map_err(LedgerError::MalformedResponse))
            .collect()
    }

    async fn latest_blockhash(&self) -> Result<String, LedgerError> {
        let result: BlockhashResult = self.rpc("getLatestBlockhash", json!({})).await?;
        Ok(result.blockhash)
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<String, LedgerError> {
        let result: SubmitResult = self
            .rpc("sendTransaction", json!({ "transaction": tx.payload }))
            .await?;
        Ok(result.signature)
    }

    async fn signature_status(&self, signature: &str) -> Result<ConfirmationStatus, LedgerError> {
        let result: ConfirmResult = self
            .rpc("confirmTransaction", json!({ "signature": signature }))
            .await?;

        Ok(match (result.confirmed, result.err) {
            (_, Some(err)) => ConfirmationStatus::Failed(err),
            (true, None) => ConfirmationStatus::Confirmed,
            (false, None) => ConfirmationStatus::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_result_maps_to_status() {
        let body: ConfirmResult = serde_json::from_str(r#"{"confirmed": true}"#).unwrap();
        assert!(body.confirmed);
        assert!(body.err.is_none());

        let body: ConfirmResult =
            serde_json::from_str(r#"{"confirmed": false, "err": "InstructionError"}"#).unwrap();
        assert_eq!(body.err.as_deref(), Some("InstructionError"));
    }

    #[test]
    fn test_rpc_envelope_error_body() {
        let envelope: RpcEnvelope<BlockhashResult> =
            serde_json::from_str(r#"{"error": {"code": -32000, "message": "node behind"}}"#)
                .unwrap();
        assert!(envelope.result.is_none());
        assert_eq!(envelope.error.unwrap().message, "node behind");
    }

    #[test]
    fn test_token_account_records_deserialize() {
        let json = r#"[{"accountId": "acc-1", "balance": "1000000", "decimals": 6}]"#;
        let records: Vec<TokenAccountRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].account_id, "acc-1");
    }
}
