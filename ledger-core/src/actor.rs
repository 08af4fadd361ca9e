//! Single-writer store actor
//!
//! All mutation flows through one Tokio task that owns the authoritative
//! in-memory tables. A unit of work stages its reads and writes against
//! those tables; the actor commits or discards the staged writes as a
//! whole, so no caller ever observes a partially applied operation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │          Callers (RPC handlers, business layer)       │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ Ledger operations
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               StoreHandle (Clone)                     │
//! │        Sends units of work to actor mailbox          │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              StoreActor (Single Task)                 │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ Tables: accounts, transactions, index          │  │
//! │  │ Ok  → persist batch, merge staged writes       │  │
//! │  │ Err → discard staged writes, return the error  │  │
//! │  └────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    error::{Error, Result},
    storage::Storage,
    types::{Account, Transaction},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};

/// Authoritative in-memory tables, owned exclusively by the actor
#[derive(Default)]
pub(crate) struct Tables {
    /// Accounts by id
    pub accounts: HashMap<String, Account>,

    /// Transactions by id
    pub transactions: HashMap<String, Transaction>,

    /// Secondary index: participant id -> sorted account ids
    pub by_participant: HashMap<String, Vec<String>>,
}

impl Tables {
    /// Rebuild the participant index from the accounts table (startup)
    pub fn rebuild_index(&mut self) {
        self.by_participant.clear();
        for account in self.accounts.values() {
            if let Some(participant_id) = &account.participant_id {
                self.by_participant
                    .entry(participant_id.clone())
                    .or_default()
                    .push(account.id.clone());
            }
        }
        for ids in self.by_participant.values_mut() {
            ids.sort();
        }
    }

    fn clear(&mut self) {
        self.accounts.clear();
        self.transactions.clear();
        self.by_participant.clear();
    }
}

/// Staged reads and writes for one atomic operation
///
/// Reads observe writes staged earlier in the same unit of work; nothing
/// becomes visible to other callers until the unit of work returns `Ok`.
pub struct UnitOfWork<'a> {
    base: &'a Tables,
    staged_accounts: HashMap<String, Account>,
    staged_transactions: Vec<Transaction>,
}

impl<'a> UnitOfWork<'a> {
    fn new(base: &'a Tables) -> Self {
        Self {
            base,
            staged_accounts: HashMap::new(),
            staged_transactions: Vec::new(),
        }
    }

    /// Read an account, staged writes first
    pub fn get_account(&self, id: &str) -> Option<&Account> {
        self.staged_accounts
            .get(id)
            .or_else(|| self.base.accounts.get(id))
    }

    /// Stage an account write
    pub fn put_account(&mut self, account: Account) {
        self.staged_accounts.insert(account.id.clone(), account);
    }

    /// Stage a transaction record
    pub fn insert_transaction(&mut self, transaction: Transaction) {
        self.staged_transactions.push(transaction);
    }

    /// Accounts owned by a participant, in id order (committed state)
    pub fn participant_accounts(&self, participant_id: &str) -> Vec<Account> {
        self.base
            .by_participant
            .get(participant_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.base.accounts.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterate committed transactions
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.base.transactions.values()
    }

    fn into_staged(self) -> StagedWrites {
        StagedWrites {
            accounts: self.staged_accounts.into_values().collect(),
            transactions: self.staged_transactions,
        }
    }
}

/// Writes collected by a unit of work, committed as one batch
struct StagedWrites {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
}

impl StagedWrites {
    fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.transactions.is_empty()
    }
}

/// Commit staged writes: durable batch first, then the in-memory merge
fn commit(tables: &mut Tables, storage: Option<&Storage>, staged: StagedWrites) -> Result<()> {
    if staged.is_empty() {
        return Ok(());
    }

    if let Some(storage) = storage {
        storage.apply(&staged.accounts, &staged.transactions)?;
    }

    for account in staged.accounts {
        let is_new = !tables.accounts.contains_key(&account.id);
        if is_new {
            if let Some(participant_id) = &account.participant_id {
                let ids = tables
                    .by_participant
                    .entry(participant_id.clone())
                    .or_default();
                ids.push(account.id.clone());
                ids.sort();
            }
        }
        tables.accounts.insert(account.id.clone(), account);
    }

    for transaction in staged.transactions {
        tables.transactions.insert(transaction.id.clone(), transaction);
    }

    Ok(())
}

type WorkFn = Box<dyn FnOnce(&mut Tables, Option<&Storage>) + Send>;

/// Message sent to the store actor
enum StoreMessage {
    /// Execute one unit of work
    Run(WorkFn),

    /// Administrative reset of both tables
    ClearAll {
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that serializes all units of work
pub(crate) struct StoreActor {
    tables: Tables,
    storage: Option<Arc<Storage>>,
    mailbox: mpsc::Receiver<StoreMessage>,
}

impl StoreActor {
    fn new(
        tables: Tables,
        storage: Option<Arc<Storage>>,
        mailbox: mpsc::Receiver<StoreMessage>,
    ) -> Self {
        Self {
            tables,
            storage,
            mailbox,
        }
    }

    /// Run the actor event loop
    async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                StoreMessage::Run(work) => {
                    work(&mut self.tables, self.storage.as_deref());
                }
                StoreMessage::ClearAll { response } => {
                    let _ = response.send(self.clear_all());
                }
                StoreMessage::Shutdown => break,
            }
        }
        tracing::debug!("Store actor stopped");
    }

    fn clear_all(&mut self) -> Result<()> {
        if let Some(storage) = &self.storage {
            storage.clear_all()?;
        }
        self.tables.clear();
        Ok(())
    }
}

/// Handle for submitting units of work to the actor
#[derive(Clone)]
pub struct StoreHandle {
    sender: mpsc::Sender<StoreMessage>,
    commit_timeout: Duration,
}

impl StoreHandle {
    /// Execute one atomic unit of work
    ///
    /// Returning `Ok` commits every staged write together; returning `Err`
    /// discards them all and propagates the error value unchanged. The wait
    /// is bounded by the configured commit timeout.
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job: WorkFn = Box::new(move |tables, storage| {
            let mut uow = UnitOfWork::new(tables);
            let outcome = work(&mut uow);
            let staged = uow.into_staged();

            let result = match outcome {
                Ok(value) => commit(tables, storage, staged).map(|()| value),
                Err(e) => Err(e),
            };
            let _ = tx.send(result);
        });

        let request = async {
            self.sender
                .send(StoreMessage::Run(job))
                .await
                .map_err(|_| Error::Concurrency("Store mailbox closed".to_string()))?;
            rx.await
                .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
        };

        match timeout(self.commit_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommitTimeout(format!(
                "Unit of work did not complete within {}ms",
                self.commit_timeout.as_millis()
            ))),
        }
    }

    /// Empty both tables (test setup / administrative reinitialization)
    pub async fn clear_all(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();

        let request = async {
            self.sender
                .send(StoreMessage::ClearAll { response: tx })
                .await
                .map_err(|_| Error::Concurrency("Store mailbox closed".to_string()))?;
            rx.await
                .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
        };

        match timeout(self.commit_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommitTimeout(format!(
                "Reset did not complete within {}ms",
                self.commit_timeout.as_millis()
            ))),
        }
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(StoreMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Store mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the store actor
pub(crate) fn spawn_store_actor(
    tables: Tables,
    storage: Option<Arc<Storage>>,
    commit_timeout: Duration,
    mailbox_capacity: usize,
) -> StoreHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = StoreActor::new(tables, storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    StoreHandle {
        sender: tx,
        commit_timeout,
    }
}
