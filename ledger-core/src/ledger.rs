//! Ledger core operations
//!
//! Every public operation executes as exactly one store unit of work; the
//! store is the only place mutation happens. Business failures come back
//! as typed errors, never as panics, and a failed operation leaves every
//! account exactly as it was.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Entry, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let ledger = Ledger::open(Config::ephemeral()).await?;
//!
//!     ledger.create_account("alice", 1000, Default::default()).await?;
//!     ledger.create_account("bob", 500, Default::default()).await?;
//!     ledger
//!         .transfer(
//!             vec![Entry::new("alice", -200), Entry::new("bob", 200)],
//!             "payment",
//!         )
//!         .await?;
//!
//!     assert_eq!(ledger.get_balance("alice").await?, 800);
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_store_actor, StoreHandle, Tables},
    metrics::Metrics,
    participants::{participant_account_id, ParticipantDirectory},
    types::{new_transaction_id, now_millis, Account, AccountType, Entry, Transaction},
    Config, Error, Result, Storage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Duration;

/// Main ledger interface
pub struct Ledger {
    /// Handle for submitting units of work
    handle: StoreHandle,

    /// External participant directory (existence checks only)
    participants: Option<Arc<dyn ParticipantDirectory>>,

    /// Operation metrics
    metrics: Metrics,
}

impl Ledger {
    /// Open ledger with configuration
    ///
    /// Loads persisted state (normalizing legacy record shapes) unless the
    /// configuration is in-memory, then spawns the store actor.
    pub async fn open(config: Config) -> Result<Self> {
        let storage = if config.in_memory {
            None
        } else {
            Some(Arc::new(Storage::open(&config)?))
        };

        let mut tables = Tables::default();
        if let Some(storage) = &storage {
            tables.accounts = storage.load_accounts()?;
            tables.transactions = storage.load_transactions()?;
            tables.rebuild_index();
        }

        let handle = spawn_store_actor(
            tables,
            storage,
            Duration::from_millis(config.commit.timeout_ms),
            config.commit.mailbox_capacity,
        );

        let metrics = Metrics::new().map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            handle,
            participants: None,
            metrics,
        })
    }

    /// Attach the external participant directory
    pub fn with_participants(mut self, directory: Arc<dyn ParticipantDirectory>) -> Self {
        self.participants = Some(directory);
        self
    }

    /// Operation metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Create a standalone account with a caller-supplied id
    pub async fn create_account(
        &self,
        id: impl Into<String>,
        initial_balance: i64,
        metadata: HashMap<String, String>,
    ) -> Result<Account> {
        self.create_account_inner(
            id.into(),
            None,
            AccountType::Standalone,
            initial_balance,
            metadata,
        )
        .await
    }

    /// Create a participant-owned account with a namespaced id
    ///
    /// Confirms the participant exists in the directory first; the derived
    /// id is `"{participant_id}:{account_type}"`.
    pub async fn create_participant_account(
        &self,
        participant_id: &str,
        account_type: AccountType,
        initial_balance: i64,
        metadata: HashMap<String, String>,
    ) -> Result<Account> {
        let known = self
            .participants
            .as_deref()
            .map(|d| d.exists(participant_id))
            .unwrap_or(false);
        if !known {
            return Err(Error::ParticipantNotFound(participant_id.to_string()));
        }

        self.create_account_inner(
            participant_account_id(participant_id, account_type),
            Some(participant_id.to_string()),
            account_type,
            initial_balance,
            metadata,
        )
        .await
    }

    async fn create_account_inner(
        &self,
        id: String,
        participant_id: Option<String>,
        account_type: AccountType,
        initial_balance: i64,
        metadata: HashMap<String, String>,
    ) -> Result<Account> {
        if initial_balance < 0 {
            return Err(Error::InvalidTransaction(
                "Initial balance must be non-negative".to_string(),
            ));
        }

        let account = self
            .handle
            .run(move |uow| {
                if uow.get_account(&id).is_some() {
                    return Err(Error::AlreadyExists(id));
                }

                let account = Account {
                    id,
                    participant_id,
                    account_type,
                    balance: initial_balance,
                    created_at: now_millis(),
                    metadata,
                };
                uow.put_account(account.clone());
                Ok(account)
            })
            .await?;

        self.metrics.accounts_created.inc();
        tracing::info!(
            account_id = %account.id,
            account_type = %account.account_type,
            balance = account.balance,
            "Account created"
        );

        Ok(account)
    }

    /// Get account by id
    pub async fn get_account(&self, id: &str) -> Result<Account> {
        let id = id.to_string();
        self.handle
            .run(move |uow| uow.get_account(&id).cloned().ok_or(Error::NotFound(id)))
            .await
    }

    /// Get account balance by id
    pub async fn get_balance(&self, id: &str) -> Result<i64> {
        Ok(self.get_account(id).await?.balance)
    }

    /// Accounts owned by a participant, in id order
    pub async fn get_participant_accounts(&self, participant_id: &str) -> Result<Vec<Account>> {
        let participant_id = participant_id.to_string();
        self.handle
            .run(move |uow| Ok(uow.participant_accounts(&participant_id)))
            .await
    }

    /// Add funds to one account
    pub async fn credit(&self, account_id: &str, amount: i64, reference: &str) -> Result<Transaction> {
        if amount <= 0 {
            return Err(Error::InvalidTransaction(
                "Credit amount must be positive".to_string(),
            ));
        }
        self.apply_entries("credit", vec![Entry::new(account_id, amount)], reference)
            .await
    }

    /// Remove funds from one account
    pub async fn debit(&self, account_id: &str, amount: i64, reference: &str) -> Result<Transaction> {
        if amount <= 0 {
            return Err(Error::InvalidTransaction(
                "Debit amount must be positive".to_string(),
            ));
        }
        self.apply_entries("debit", vec![Entry::new(account_id, -amount)], reference)
            .await
    }

    /// Atomically apply signed amounts to multiple accounts
    ///
    /// Entries are validated and applied in caller-supplied order, so the
    /// first entry that references a missing account or would violate the
    /// sign invariant is the one reported. Entry amounts are not required
    /// to sum to zero.
    pub async fn transfer(&self, entries: Vec<Entry>, reference: &str) -> Result<Transaction> {
        if entries.is_empty() {
            return Err(Error::InvalidTransaction(
                "Transfer requires at least one entry".to_string(),
            ));
        }
        self.apply_entries("transfer", entries, reference).await
    }

    async fn apply_entries(
        &self,
        tx_type: &'static str,
        entries: Vec<Entry>,
        reference: &str,
    ) -> Result<Transaction> {
        let reference = reference.to_string();
        let timer = self.metrics.commit_duration.start_timer();

        let result = self
            .handle
            .run(move |uow| {
                for entry in &entries {
                    let account = uow
                        .get_account(&entry.account_id)
                        .ok_or_else(|| Error::NotFound(entry.account_id.clone()))?;

                    let new_balance =
                        account.balance.checked_add(entry.amount).ok_or_else(|| {
                            Error::InvalidTransaction(format!(
                                "Balance overflow on account {}",
                                entry.account_id
                            ))
                        })?;

                    if !account.balance_permitted(new_balance) {
                        return Err(Error::InsufficientFunds {
                            account_id: entry.account_id.clone(),
                            balance: account.balance,
                            amount: entry.amount,
                        });
                    }

                    let mut updated = account.clone();
                    updated.balance = new_balance;
                    uow.put_account(updated);
                }

                let transaction = Transaction {
                    id: new_transaction_id(),
                    tx_type: tx_type.to_string(),
                    entries,
                    timestamp: now_millis(),
                    reference,
                };
                uow.insert_transaction(transaction.clone());
                Ok(transaction)
            })
            .await;

        timer.observe_duration();

        match &result {
            Ok(transaction) => {
                self.metrics.transactions_total.inc();
                tracing::debug!(
                    transaction_id = %transaction.id,
                    tx_type = %transaction.tx_type,
                    entry_count = transaction.entries.len(),
                    "Transaction committed"
                );
            }
            Err(e) if e.is_business() => {
                tracing::debug!(error = %e, "Transaction rejected");
            }
            Err(e) => {
                tracing::error!(error = %e, "Transaction failed");
            }
        }

        result
    }

    /// Most recent transactions, optionally filtered to one account
    ///
    /// Sorted by timestamp descending; equal timestamps are broken by
    /// transaction id so the order is deterministic.
    pub async fn list_transactions(
        &self,
        limit: usize,
        account_id: Option<&str>,
    ) -> Result<Vec<Transaction>> {
        let filter = account_id.map(|s| s.to_string());
        self.handle
            .run(move |uow| {
                let mut matching: Vec<Transaction> = uow
                    .transactions()
                    .filter(|tx| filter.as_deref().map_or(true, |id| tx.touches(id)))
                    .cloned()
                    .collect();
                matching.sort_by(|a, b| {
                    b.timestamp
                        .cmp(&a.timestamp)
                        .then_with(|| b.id.cmp(&a.id))
                });
                matching.truncate(limit);
                Ok(matching)
            })
            .await
    }

    /// Empty both tables (test setup / administrative reinitialization)
    pub async fn clear_all(&self) -> Result<()> {
        self.handle.clear_all().await
    }

    /// Shutdown ledger
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participants::StaticDirectory;

    async fn create_test_ledger() -> Ledger {
        Ledger::open(Config::ephemeral()).await.unwrap()
    }

    async fn ledger_with_directory(participants: &[&str]) -> Ledger {
        let directory = StaticDirectory::new(participants.iter().copied());
        create_test_ledger()
            .await
            .with_participants(Arc::new(directory))
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let ledger = create_test_ledger().await;

        let account = ledger
            .create_account("alice", 1000, HashMap::new())
            .await
            .unwrap();
        assert_eq!(account.id, "alice");
        assert_eq!(account.balance, 1000);
        assert_eq!(account.account_type, AccountType::Standalone);
        assert!(account.participant_id.is_none());

        let fetched = ledger.get_account("alice").await.unwrap();
        assert_eq!(fetched, account);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicate_id() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 1000, HashMap::new())
            .await
            .unwrap();
        let err = ledger
            .create_account("alice", 0, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(id) if id == "alice"));

        // The existing account is untouched.
        assert_eq!(ledger.get_balance("alice").await.unwrap(), 1000);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_account_rejects_negative_initial_balance() {
        let ledger = create_test_ledger().await;

        let err = ledger
            .create_account("alice", -1, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransaction(_)));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_account() {
        let ledger = create_test_ledger().await;

        let err = ledger.get_account("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "missing"));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_participant_account() {
        let ledger = ledger_with_directory(&["acme"]).await;

        let account = ledger
            .create_participant_account("acme", AccountType::Receivables, 0, HashMap::new())
            .await
            .unwrap();
        assert_eq!(account.id, "acme:receivables");
        assert_eq!(account.participant_id.as_deref(), Some("acme"));
        assert_eq!(account.account_type, AccountType::Receivables);

        let err = ledger
            .create_participant_account("acme", AccountType::Receivables, 0, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_participant_account_unknown_participant() {
        let ledger = ledger_with_directory(&["acme"]).await;

        let err = ledger
            .create_participant_account("initech", AccountType::Operating, 0, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ParticipantNotFound(id) if id == "initech"));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_participant_account_without_directory() {
        let ledger = create_test_ledger().await;

        let err = ledger
            .create_participant_account("acme", AccountType::Operating, 0, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ParticipantNotFound(_)));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_participant_accounts() {
        let ledger = ledger_with_directory(&["acme"]).await;

        ledger
            .create_participant_account("acme", AccountType::Operating, 100, HashMap::new())
            .await
            .unwrap();
        ledger
            .create_participant_account("acme", AccountType::Fees, 0, HashMap::new())
            .await
            .unwrap();

        let accounts = ledger.get_participant_accounts("acme").await.unwrap();
        let ids: Vec<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["acme:fees", "acme:operating"]);

        assert!(ledger
            .get_participant_accounts("globex")
            .await
            .unwrap()
            .is_empty());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_moves_funds() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 1000, HashMap::new())
            .await
            .unwrap();
        ledger
            .create_account("bob", 500, HashMap::new())
            .await
            .unwrap();

        let transaction = ledger
            .transfer(
                vec![Entry::new("alice", -200), Entry::new("bob", 200)],
                "payment",
            )
            .await
            .unwrap();
        assert_eq!(transaction.tx_type, "transfer");
        assert_eq!(transaction.reference, "payment");
        assert_eq!(transaction.entries.len(), 2);

        assert_eq!(ledger.get_balance("alice").await.unwrap(), 800);
        assert_eq!(ledger.get_balance("bob").await.unwrap(), 700);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_changes_nothing() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 100, HashMap::new())
            .await
            .unwrap();
        ledger
            .create_account("bob", 50, HashMap::new())
            .await
            .unwrap();

        let err = ledger
            .transfer(vec![Entry::new("alice", -500), Entry::new("bob", 500)], "x")
            .await
            .unwrap_err();
        match err {
            Error::InsufficientFunds {
                account_id,
                balance,
                amount,
            } => {
                assert_eq!(account_id, "alice");
                assert_eq!(balance, 100);
                assert_eq!(amount, -500);
            }
            other => panic!("unexpected error: {}", other),
        }

        assert_eq!(ledger.get_balance("alice").await.unwrap(), 100);
        assert_eq!(ledger.get_balance("bob").await.unwrap(), 50);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_with_fee_entry() {
        let ledger = create_test_ledger().await;

        for (id, balance) in [("alice", 1000), ("bob", 500), ("charlie", 300), ("fees", 0)] {
            ledger.create_account(id, balance, HashMap::new()).await.unwrap();
        }

        // Asymmetric postings are legal: entries need not sum to zero.
        ledger
            .transfer(
                vec![
                    Entry::new("alice", -210),
                    Entry::new("bob", 200),
                    Entry::new("fees", 10),
                ],
                "fee-payment",
            )
            .await
            .unwrap();

        assert_eq!(ledger.get_balance("alice").await.unwrap(), 790);
        assert_eq!(ledger.get_balance("bob").await.unwrap(), 700);
        assert_eq!(ledger.get_balance("charlie").await.unwrap(), 300);
        assert_eq!(ledger.get_balance("fees").await.unwrap(), 10);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_missing_account_aborts() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 1000, HashMap::new())
            .await
            .unwrap();

        let err = ledger
            .transfer(
                vec![Entry::new("alice", -50), Entry::new("missing", 50)],
                "x",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "missing"));

        assert_eq!(ledger.get_balance("alice").await.unwrap(), 1000);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_reports_first_offending_entry() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 100, HashMap::new())
            .await
            .unwrap();
        ledger
            .create_account("bob", 100, HashMap::new())
            .await
            .unwrap();

        // Both entries would overdraw; the first in caller order is reported.
        let err = ledger
            .transfer(
                vec![Entry::new("bob", -500), Entry::new("alice", -500)],
                "x",
            )
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::InsufficientFunds { ref account_id, .. } if account_id == "bob")
        );

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transfer_rejects_empty_entries() {
        let ledger = create_test_ledger().await;

        let err = ledger.transfer(vec![], "x").await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransaction(_)));

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_receivables_account_may_go_negative() {
        let ledger = ledger_with_directory(&["acme"]).await;

        ledger
            .create_participant_account("acme", AccountType::Receivables, 0, HashMap::new())
            .await
            .unwrap();

        ledger
            .transfer(vec![Entry::new("acme:receivables", -2500)], "invoice")
            .await
            .unwrap();
        assert_eq!(
            ledger.get_balance("acme:receivables").await.unwrap(),
            -2500
        );

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_credit_and_debit() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 1000, HashMap::new())
            .await
            .unwrap();

        let credit = ledger.credit("alice", 250, "top-up").await.unwrap();
        assert_eq!(credit.tx_type, "credit");
        assert_eq!(credit.entries, vec![Entry::new("alice", 250)]);
        assert_eq!(ledger.get_balance("alice").await.unwrap(), 1250);

        let debit = ledger.debit("alice", 50, "withdrawal").await.unwrap();
        assert_eq!(debit.tx_type, "debit");
        assert_eq!(debit.entries, vec![Entry::new("alice", -50)]);
        assert_eq!(ledger.get_balance("alice").await.unwrap(), 1200);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_credit_and_debit_reject_non_positive_amounts() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 1000, HashMap::new())
            .await
            .unwrap();

        for amount in [0, -10] {
            let err = ledger.credit("alice", amount, "x").await.unwrap_err();
            assert!(matches!(err, Error::InvalidTransaction(_)));
            let err = ledger.debit("alice", amount, "x").await.unwrap_err();
            assert!(matches!(err, Error::InvalidTransaction(_)));
        }

        assert_eq!(ledger.get_balance("alice").await.unwrap(), 1000);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_debit_cannot_overdraw() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 100, HashMap::new())
            .await
            .unwrap();

        let err = ledger.debit("alice", 101, "x").await.unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(ledger.get_balance("alice").await.unwrap(), 100);

        // Draining to exactly zero is fine.
        ledger.debit("alice", 100, "x").await.unwrap();
        assert_eq!(ledger.get_balance("alice").await.unwrap(), 0);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_transactions_filter_and_limit() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 10_000, HashMap::new())
            .await
            .unwrap();
        ledger
            .create_account("bob", 10_000, HashMap::new())
            .await
            .unwrap();

        for i in 0..5 {
            ledger
                .credit("alice", 10 + i, &format!("a{}", i))
                .await
                .unwrap();
        }
        ledger.credit("bob", 99, "b0").await.unwrap();

        let all = ledger.list_transactions(50, None).await.unwrap();
        assert_eq!(all.len(), 6);

        let alice_only = ledger.list_transactions(50, Some("alice")).await.unwrap();
        assert_eq!(alice_only.len(), 5);
        assert!(alice_only.iter().all(|tx| tx.touches("alice")));

        let limited = ledger.list_transactions(3, None).await.unwrap();
        assert_eq!(limited.len(), 3);
        // Newest first, deterministically ordered.
        for pair in limited.windows(2) {
            assert!(
                (pair[0].timestamp, &pair[0].id) >= (pair[1].timestamp, &pair[1].id)
            );
        }

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_transactions_is_prefix_of_full_listing() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 10_000, HashMap::new())
            .await
            .unwrap();
        for i in 0..10 {
            ledger.credit("alice", 1 + i, "r").await.unwrap();
        }

        let full = ledger.list_transactions(50, None).await.unwrap();
        let prefix = ledger.list_transactions(4, None).await.unwrap();
        assert_eq!(prefix.as_slice(), &full[..4]);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_all_resets_state() {
        let ledger = create_test_ledger().await;

        ledger
            .create_account("alice", 1000, HashMap::new())
            .await
            .unwrap();
        ledger.credit("alice", 100, "x").await.unwrap();

        ledger.clear_all().await.unwrap();

        assert!(matches!(
            ledger.get_account("alice").await.unwrap_err(),
            Error::NotFound(_)
        ));
        assert!(ledger.list_transactions(50, None).await.unwrap().is_empty());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_metadata_is_opaque_and_preserved() {
        let ledger = create_test_ledger().await;

        let mut metadata = HashMap::new();
        metadata.insert("currency".to_string(), "EUR".to_string());
        metadata.insert("region".to_string(), "eu-west".to_string());

        ledger
            .create_account("alice", 0, metadata.clone())
            .await
            .unwrap();
        let account = ledger.get_account("alice").await.unwrap();
        assert_eq!(account.metadata, metadata);

        ledger.shutdown().await.unwrap();
    }
}
