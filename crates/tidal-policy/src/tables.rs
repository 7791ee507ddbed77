//! redb table definitions for the policy store.

use redb::TableDefinition;

/// Policies keyed by policy ID, JSON-encoded.
pub const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("policies");

/// Store metadata. Holds the modify index under [`INDEX_KEY`].
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub const INDEX_KEY: &str = "index";
