//! Carga y gestión de configuración de la aplicación (almacén + secretos).

use std::env;
use anyhow::{anyhow, Result};

const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Neo4j,
    Memory,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "neo4j" => Ok(Self::Neo4j),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("Backend de almacenamiento no soportado: {other}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neo4j => "neo4j",
            Self::Memory => "memory",
        }
    }
}

/// Credenciales de Neo4j; solo se exigen con `STORE_BACKEND=neo4j`.
#[derive(Clone, Debug)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub store_backend: StoreBackend,
    pub neo4j: Option<Neo4jConfig>,

    /// Secreto compartido que deben presentar las tareas programadas y las
    /// rutas de administración en la cabecera `x-admin-secret`.
    pub admin_secret: Option<String>,
    pub bcrypt_cost: u32,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        let backend_str = env::var("STORE_BACKEND").unwrap_or_else(|_| "neo4j".to_string());
        let store_backend = StoreBackend::from_str(&backend_str)?;

        let neo4j = match store_backend {
            StoreBackend::Neo4j => Some(Neo4jConfig {
                uri: env::var("NEO4J_URI").map_err(|_| anyhow!("Falta NEO4J_URI en el entorno"))?,
                user: env::var("NEO4J_USER")
                    .map_err(|_| anyhow!("Falta NEO4J_USER en el entorno"))?,
                password: env::var("NEO4J_PASSWORD")
                    .map_err(|_| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?,
            }),
            StoreBackend::Memory => None,
        };

        let admin_secret = env::var("ADMIN_SECRET").ok().filter(|s| !s.is_empty());

        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(raw) => raw
                .parse::<u32>()
                .map_err(|e| anyhow!("BCRYPT_COST inválido ({raw}): {e}"))?,
            Err(_) => DEFAULT_BCRYPT_COST,
        };

        Ok(Self {
            server_addr,
            store_backend,
            neo4j,
            admin_secret,
            bcrypt_cost,
        })
    }

    /// Configuración mínima sobre el almacén en memoria.
    #[cfg(test)]
    pub fn for_tests(admin_secret: &str) -> Self {
        Self {
            server_addr: "127.0.0.1:0".to_string(),
            store_backend: StoreBackend::Memory,
            neo4j: None,
            admin_secret: Some(admin_secret.to_string()),
            bcrypt_cost: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_are_case_insensitive() {
        assert_eq!(StoreBackend::from_str("Neo4J").unwrap(), StoreBackend::Neo4j);
        assert_eq!(StoreBackend::from_str("memory").unwrap(), StoreBackend::Memory);
        assert!(StoreBackend::from_str("postgres").is_err());
    }
}
