use std::sync::Arc;

use parley_db::Database;
use parley_gateway::relay::Relay;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub relay: Relay,
    /// Page size for `GET /chat` when the client gives none
    pub history_limit: u32,
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        relay: Relay::new(16),
        history_limit: 50,
    })
}
