// Módulos de la aplicación
mod accounts;
mod api;
mod app_state;
mod birthdays;
mod config;
mod contact;
mod error;
mod models;
mod neo4j_store;
mod store;
mod threshold;
mod view;

use std::sync::Arc;

use crate::app_state::AppState;
use crate::config::{AppConfig, StoreBackend};
use crate::store::{MemoryStore, Store};
use anyhow::anyhow;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Construye el almacén elegido en la configuración.
async fn build_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match cfg.store_backend {
        StoreBackend::Neo4j => {
            let neo4j = cfg
                .neo4j
                .as_ref()
                .ok_or_else(|| anyhow!("Faltan las credenciales de Neo4j"))?;
            let graph = neo4j_store::connect_from_config(neo4j).await?;
            neo4j_store::ensure_schema(&graph).await?;
            Ok(Arc::new(neo4j_store::Neo4jStore::new(graph)))
        }
        StoreBackend::Memory => {
            warn!("Usando almacén en memoria: los datos se pierden al reiniciar.");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().expect("Error al cargar la configuración");
    if cfg.admin_secret.is_none() {
        warn!("ADMIN_SECRET no definido: se rechazarán las tareas programadas y las rutas de administración.");
    }

    // 3. Conectar al almacén y asegurar esquemas
    let store = build_store(&cfg)
        .await
        .expect("Error inicializando el almacén");

    // 4. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        store,
    };

    // 5. Configurar el router de la API
    let app = api::create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 6. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr)
        .await
        .expect("No se pudo abrir la dirección del servidor");
    info!(
        backend = cfg.store_backend.as_str(),
        "🚀 Servidor escuchando en http://{}", cfg.server_addr
    );

    // Apagado ordenado con Ctrl-C.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .expect("Error sirviendo peticiones");

    info!("✅ Servidor cerrado correctamente.");
}
