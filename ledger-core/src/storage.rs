//! Persistence layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - current account rows (key: account id)
//! - `transactions` - immutable audit records (key: transaction id)
//!
//! Rows are written as versioned bincode envelopes. Legacy shapes are
//! upgraded to the current shape once, at load time; a row that cannot be
//! decoded surfaces as `Error::SchemaMismatch`.

use crate::{
    error::{Error, Result},
    types::{Account, AccountType, Entry, Transaction},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";

/// Versioned on-disk shape of an account row
#[derive(Debug, Serialize, Deserialize)]
pub enum AccountRecord {
    /// Legacy shape without metadata
    V1(AccountV1),
    /// Current shape
    V2(Account),
}

/// Account row as written before metadata existed
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountV1 {
    /// Account id
    pub id: String,
    /// Owning participant
    pub participant_id: Option<String>,
    /// Account type
    pub account_type: AccountType,
    /// Balance in minor units
    pub balance: i64,
    /// Creation time (epoch millis)
    pub created_at: i64,
}

impl From<AccountV1> for Account {
    fn from(v1: AccountV1) -> Self {
        Account {
            id: v1.id,
            participant_id: v1.participant_id,
            account_type: v1.account_type,
            balance: v1.balance,
            created_at: v1.created_at,
            metadata: HashMap::new(),
        }
    }
}

impl AccountRecord {
    /// Normalize to the current shape
    pub fn upgrade(self) -> Account {
        match self {
            AccountRecord::V1(v1) => v1.into(),
            AccountRecord::V2(account) => account,
        }
    }
}

/// Versioned on-disk shape of a transaction row
#[derive(Debug, Serialize, Deserialize)]
pub enum TransactionRecord {
    /// Legacy shape without the reference field
    V1(TransactionV1),
    /// Current shape
    V2(Transaction),
}

/// Transaction row as written before references existed
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionV1 {
    /// Transaction id
    pub id: String,
    /// Informational tag
    pub tx_type: String,
    /// Ordered postings
    pub entries: Vec<Entry>,
    /// Commit time (epoch millis)
    pub timestamp: i64,
}

impl From<TransactionV1> for Transaction {
    fn from(v1: TransactionV1) -> Self {
        Transaction {
            id: v1.id,
            tx_type: v1.tx_type,
            entries: v1.entries,
            timestamp: v1.timestamp,
            reference: String::new(),
        }
    }
}

impl TransactionRecord {
    /// Normalize to the current shape
    pub fn upgrade(self) -> Transaction {
        match self {
            TransactionRecord::V1(v1) => v1.into(),
            TransactionRecord::V2(transaction) => transaction,
        }
    }
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_transactions()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self {
            db,
            sync_writes: config.rocksdb.sync_writes,
        })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Accounts are frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_transactions() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    // Load operations (startup only)

    /// Load all accounts, upgrading legacy rows to the current shape
    pub fn load_accounts(&self) -> Result<HashMap<String, Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;

        let mut accounts = HashMap::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let record: AccountRecord = bincode::deserialize(&value).map_err(|e| {
                Error::SchemaMismatch(format!(
                    "account row {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ))
            })?;
            let account = record.upgrade();
            accounts.insert(account.id.clone(), account);
        }

        tracing::info!(count = accounts.len(), "Loaded accounts");
        Ok(accounts)
    }

    /// Load all transactions, upgrading legacy rows to the current shape
    pub fn load_transactions(&self) -> Result<HashMap<String, Transaction>> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;

        let mut transactions = HashMap::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let record: TransactionRecord = bincode::deserialize(&value).map_err(|e| {
                Error::SchemaMismatch(format!(
                    "transaction row {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ))
            })?;
            let transaction = record.upgrade();
            transactions.insert(transaction.id.clone(), transaction);
        }

        tracing::info!(count = transactions.len(), "Loaded transactions");
        Ok(transactions)
    }

    // Commit operations

    /// Persist one committed unit of work atomically
    ///
    /// The batch is written (and synced per config) before the caller is
    /// told the unit of work committed.
    pub fn apply(&self, accounts: &[Account], transactions: &[Transaction]) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        for account in accounts {
            let value = bincode::serialize(&AccountRecord::V2(account.clone()))?;
            batch.put_cf(cf_accounts, account.id.as_bytes(), &value);
        }

        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        for transaction in transactions {
            let value = bincode::serialize(&TransactionRecord::V2(transaction.clone()))?;
            batch.put_cf(cf_transactions, transaction.id.as_bytes(), &value);
        }

        self.db.write_opt(batch, &self.write_options())?;
        Ok(())
    }

    /// Delete every row in both tables (administrative reset)
    pub fn clear_all(&self) -> Result<()> {
        let mut batch = WriteBatch::default();

        for cf_name in [CF_ACCOUNTS, CF_TRANSACTIONS] {
            let cf = self.cf_handle(cf_name)?;
            for item in self.db.iterator_cf(cf, IteratorMode::Start) {
                let (key, _) = item?;
                batch.delete_cf(cf, key);
            }
        }

        self.db.write_opt(batch, &self.write_options())?;
        tracing::warn!("Storage cleared");
        Ok(())
    }
}
