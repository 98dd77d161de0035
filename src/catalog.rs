//! Rank role catalog
//!
//! The fixed vocabulary of group roles that mirror in-game clan ranks.

use serde::{Deserialize, Serialize};

use crate::host::Role;

/// Clan ranks, highest first
pub const DEFAULT_RANKS: [&str; 12] = [
    "Owner",
    "Deputy Owner",
    "Overseer",
    "Coordinator",
    "Organiser",
    "Admin",
    "General",
    "Captain",
    "Lieutenant",
    "Sergeant",
    "Corporal",
    "Recruit",
];

/// Ordered set of rank role names, compared case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCatalog {
    names: Vec<String>,
}

impl RoleCatalog {
    /// Build a catalog from names, dropping case-insensitive duplicates
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut catalog = Self { names: Vec::new() };
        for name in names {
            let name = name.into();
            if !catalog.contains(&name) {
                catalog.names.push(name);
            }
        }
        catalog
    }

    /// Names in catalog order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether `name` is a rank role name
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name.trim()))
    }

    /// First community role carrying the catalog name equal to `rank`
    ///
    /// Returns `None` when the rank is not in the catalog or the community has
    /// no role of that name yet.
    pub fn resolve<'a>(&self, rank: &str, roles: &'a [Role]) -> Option<&'a Role> {
        if !self.contains(rank) {
            return None;
        }
        roles
            .iter()
            .find(|r| r.name.trim().eq_ignore_ascii_case(rank.trim()))
    }

    /// Catalog names with no matching role in `roles`
    pub fn missing_from<'a>(&'a self, roles: &[Role]) -> Vec<&'a str> {
        self.names
            .iter()
            .filter(|n| !roles.iter().any(|r| r.name.trim().eq_ignore_ascii_case(n)))
            .map(String::as_str)
            .collect()
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_RANKS)
    }
}
