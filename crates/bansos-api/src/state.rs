use std::sync::Arc;

use bansos_db::Store;

use crate::storage::ObjectStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
    pub storage: Arc<dyn ObjectStore>,
    pub jwt_secret: String,
}
