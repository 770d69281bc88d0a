//! Where manual multisig transactions go for sign-off.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::info;

use super::ManualTransaction;
use crate::error::Result;

/// Receives transactions the deployer cannot send itself.
///
/// `confirm` returns once the operator has taken the transaction; the
/// dispatcher then carries on as if it had been submitted.
#[async_trait]
pub trait ApprovalSink: Send + Sync {
    async fn confirm(&self, tx: &ManualTransaction) -> Result<()>;
}

/// Prints the transaction and waits for a line on stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleApproval;

#[async_trait]
impl ApprovalSink for ConsoleApproval {
    async fn confirm(&self, tx: &ManualTransaction) -> Result<()> {
        println!("{}", tx);
        println!("Press any key to continue...");
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(())
    }
}

/// Prints the transaction and continues without waiting
/// (`SKIP_DEPLOY_CONFIRMATION=true`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApproval;

#[async_trait]
impl ApprovalSink for AutoApproval {
    async fn confirm(&self, tx: &ManualTransaction) -> Result<()> {
        println!("{}", tx);
        info!("Skipping confirmation for manual transaction to {}", tx.to);
        Ok(())
    }
}

/// Keeps every transaction it is given.
#[derive(Debug, Default)]
pub struct RecordingApproval {
    seen: Mutex<Vec<ManualTransaction>>,
}

impl RecordingApproval {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transactions(&self) -> Vec<ManualTransaction> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl ApprovalSink for RecordingApproval {
    async fn confirm(&self, tx: &ManualTransaction) -> Result<()> {
        self.seen.lock().await.push(tx.clone());
        Ok(())
    }
}

/// Console prompt, or auto approval when confirmations are skipped.
pub fn approval_for(skip_confirmation: bool) -> Box<dyn ApprovalSink> {
    if skip_confirmation {
        Box::new(AutoApproval)
    } else {
        Box::new(ConsoleApproval)
    }
}
