//! Account provisioning for participant-owned accounts
//!
//! The ledger owns the namespacing convention
//! `"{participant_id}:{account_type}"`; participant identity itself lives
//! in an external directory and is only consulted for existence.

use crate::types::AccountType;
use std::collections::HashSet;

/// Existence check against the external participant directory
///
/// This is the only participant attribute the ledger core reads.
pub trait ParticipantDirectory: Send + Sync {
    /// Whether a participant with this id is registered
    fn exists(&self, participant_id: &str) -> bool;
}

/// Derive the namespaced account id for a participant-owned account
pub fn participant_account_id(participant_id: &str, account_type: AccountType) -> String {
    format!("{}:{}", participant_id, account_type)
}

/// Fixed in-memory directory, used by tests and seeding
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    participants: HashSet<String>,
}

impl StaticDirectory {
    /// Create a directory from a list of participant ids
    pub fn new<I, S>(participant_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            participants: participant_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Register a participant
    pub fn insert(&mut self, participant_id: impl Into<String>) {
        self.participants.insert(participant_id.into());
    }
}

impl ParticipantDirectory for StaticDirectory {
    fn exists(&self, participant_id: &str) -> bool {
        self.participants.contains(participant_id)
    }
}
