//! Table-level access control.
//!
//! A pure allow/deny predicate evaluated before any SQL work: the blacklist
//! always wins, a non-empty whitelist hides every table not on it, and the
//! whole mechanism can be disabled globally. Matching is case-insensitive.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Whitelist/blacklist table policy.
pub struct AccessControl {
    enabled: bool,
    whitelist: RwLock<HashSet<String>>,
    blacklist: RwLock<HashSet<String>>,
}

impl AccessControl {
    /// Builds the policy from configured lists. Entries are normalized to
    /// lowercase once here so the per-request check is a plain set lookup.
    pub fn new(enabled: bool, whitelist: &[String], blacklist: &[String]) -> Self {
        let normalize =
            |list: &[String]| list.iter().map(|t| t.to_ascii_lowercase()).collect();
        Self {
            enabled,
            whitelist: RwLock::new(normalize(whitelist)),
            blacklist: RwLock::new(normalize(blacklist)),
        }
    }

    /// Evaluates the policy for a table name.
    pub fn is_table_allowed(&self, table: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let table = table.to_ascii_lowercase();

        if self
            .blacklist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&table)
        {
            return false;
        }

        let whitelist = self
            .whitelist
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if whitelist.is_empty() {
            return true;
        }

        whitelist.contains(&table)
    }

    pub fn add_to_whitelist(&self, table: &str) {
        self.whitelist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_ascii_lowercase());
    }

    pub fn add_to_blacklist(&self, table: &str) {
        self.blacklist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_ascii_lowercase());
    }

    pub fn remove_from_whitelist(&self, table: &str) {
        self.whitelist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&table.to_ascii_lowercase());
    }

    pub fn remove_from_blacklist(&self, table: &str) {
        self.blacklist
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&table.to_ascii_lowercase());
    }

    pub fn whitelist(&self) -> Vec<String> {
        self.whitelist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.blacklist
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
