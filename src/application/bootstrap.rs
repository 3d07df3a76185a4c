use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub database_path: PathBuf,
}

pub fn bootstrap_workspace(home: &Path) -> Result<BootstrapResult, InfraError> {
    let state_dir = home.join("state");
    let database_path = state_dir.join("lockin.sqlite");

    fs::create_dir_all(&state_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        database_path,
    })
}
