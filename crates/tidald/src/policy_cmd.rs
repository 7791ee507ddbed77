//! `tidald policy` subcommands, which edit the store the agent watches.
//!
//! A running agent picks changes up on its next poll of the store.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use tidal_policy::{PolicyFile, PolicyStore};

fn open_store(path: &Path) -> anyhow::Result<PolicyStore> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    PolicyStore::open(path).with_context(|| format!("failed to open policy store {}", path.display()))
}

pub fn apply(db: &Path, file: &Path) -> anyhow::Result<()> {
    let policies = PolicyFile::from_file(file)
        .with_context(|| format!("failed to load policy file {}", file.display()))?
        .policies;
    let store = open_store(db)?;
    let index = store.put_policies(&policies)?;
    info!(count = policies.len(), index, "policies applied");
    for policy in &policies {
        println!("applied {}", policy.id);
    }
    Ok(())
}

pub fn list(db: &Path) -> anyhow::Result<()> {
    let store = open_store(db)?;
    let policies = store.list_policies()?;
    println!("{}", serde_json::to_string_pretty(&policies)?);
    Ok(())
}

pub fn delete(db: &Path, id: &str) -> anyhow::Result<()> {
    let store = open_store(db)?;
    if !store.delete_policy(id)? {
        anyhow::bail!("policy {id:?} not found");
    }
    println!("deleted {id}");
    Ok(())
}
