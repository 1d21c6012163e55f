use std::path::PathBuf;

use epistle_core::config::VaultSettings;

use crate::errors::{KnowledgeError, KnowledgeResult};

pub const VAULT_DIR: &str = "vault";

pub fn data_root(settings: &VaultSettings) -> KnowledgeResult<PathBuf> {
    if let Some(path) = &settings.data_root_override {
        return Ok(path.clone());
    }
    if let Ok(override_dir) = std::env::var("EPISTLE_DATA_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let dir = dirs::data_dir().ok_or(KnowledgeError::MissingDataDir)?;
    Ok(dir.join("epistle"))
}

pub fn vault_root(settings: &VaultSettings) -> KnowledgeResult<PathBuf> {
    if let Some(path) = &settings.root {
        return Ok(path.clone());
    }
    Ok(data_root(settings)?.join(VAULT_DIR))
}

pub fn knowledge_db_path(settings: &VaultSettings) -> KnowledgeResult<PathBuf> {
    if let Some(path) = &settings.db_path {
        return Ok(path.clone());
    }
    Ok(data_root(settings)?.join("index.sqlite3"))
}
