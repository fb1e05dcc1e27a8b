use std::path::PathBuf;

use serde::Deserialize;

use crate::config::HubConfig;
use crate::store::SqliteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub config: HubConfig,
}

impl AppState {
    pub fn new(config: HubConfig) -> Self {
        Self {
            workspace: None,
            store: None,
            config,
        }
    }

    pub fn open_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let store = SqliteStore::open(&path)?;
        self.workspace = Some(path);
        self.store = Some(store);
        Ok(())
    }
}
