pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod gateway;
pub mod utils;

pub use db::DbPool;

use clock::Clock;
use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub clock: Clock,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, clock: Clock) -> Self {
        Self { config, db, clock }
    }
}
