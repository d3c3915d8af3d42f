pub mod api;
pub mod config;
pub mod db;
pub mod storage;

#[cfg(test)]
mod test_util;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;
use storage::FileStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub files: Arc<dyn FileStore>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, files: Arc<dyn FileStore>) -> Self {
        Self { config, db, files }
    }
}
