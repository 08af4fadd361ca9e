//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (signed integers in minor currency units)
//! - Memory safety (no unsafe code)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Account type governing the balance sign invariant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    /// Caller-named account, not owned by a participant
    Standalone,
    /// Participant working-capital account
    Operating,
    /// Amounts owed to the participant (may go negative)
    Receivables,
    /// Amounts owed by the participant (may go negative)
    Payables,
    /// Funds held pending a condition
    Escrow,
    /// Collected fees
    Fees,
    /// Metered usage postings
    Usage,
}

impl AccountType {
    /// Canonical lower-case name, also used in namespaced account ids
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Standalone => "standalone",
            AccountType::Operating => "operating",
            AccountType::Receivables => "receivables",
            AccountType::Payables => "payables",
            AccountType::Escrow => "escrow",
            AccountType::Fees => "fees",
            AccountType::Usage => "usage",
        }
    }

    /// Parse from the canonical name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "standalone" => Some(AccountType::Standalone),
            "operating" => Some(AccountType::Operating),
            "receivables" => Some(AccountType::Receivables),
            "payables" => Some(AccountType::Payables),
            "escrow" => Some(AccountType::Escrow),
            "fees" => Some(AccountType::Fees),
            "usage" => Some(AccountType::Usage),
            _ => None,
        }
    }

    /// Receivables and payables track debt positions and may hold any sign
    pub fn allows_negative(&self) -> bool {
        matches!(self, AccountType::Receivables | AccountType::Payables)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named balance with a type governing its sign invariant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Globally unique id; participant-owned accounts use
    /// `"{participant_id}:{account_type}"`
    pub id: String,

    /// Owning participant (lookup only, the ledger does not manage
    /// participant lifecycle)
    pub participant_id: Option<String>,

    /// Account type
    pub account_type: AccountType,

    /// Balance in minor currency units (cents)
    pub balance: i64,

    /// Milliseconds since epoch, set once at creation
    pub created_at: i64,

    /// Opaque caller-defined metadata
    pub metadata: HashMap<String, String>,
}

impl Account {
    /// Whether this balance would be legal for the account's type
    pub fn balance_permitted(&self, balance: i64) -> bool {
        balance >= 0 || self.account_type.allows_negative()
    }
}

/// One signed posting within a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Account the amount is applied to
    pub account_id: String,

    /// Signed amount in minor currency units
    pub amount: i64,
}

impl Entry {
    /// Create a new entry
    pub fn new(account_id: impl Into<String>, amount: i64) -> Self {
        Self {
            account_id: account_id.into(),
            amount,
        }
    }
}

/// Immutable audit record of one bookkeeping operation
///
/// Entry amounts are not required to sum to zero; fees and asymmetric
/// postings are legal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// 32 lower-case hex chars from a crypto-random 128-bit value
    pub id: String,

    /// Informational tag ("credit", "debit", "transfer"); never used for
    /// dispatch
    pub tx_type: String,

    /// Ordered postings, exactly as supplied by the caller
    pub entries: Vec<Entry>,

    /// Milliseconds since epoch at commit time
    pub timestamp: i64,

    /// Caller-supplied correlation string, not unique
    pub reference: String,
}

impl Transaction {
    /// Whether any entry touches the given account
    pub fn touches(&self, account_id: &str) -> bool {
        self.entries.iter().any(|e| e.account_id == account_id)
    }
}

/// Generate a fresh transaction id from the OS random source
pub fn new_transaction_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
