use std::sync::Arc;

use crate::{config::AppConfig, store::Store};

/// Estado compartido por todos los handlers. El almacén se construye una vez
/// en `main` y se inyecta aquí.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
}
