//! Modelos de dominio: nodos de fichero/carpeta, usuarios y notificaciones.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Registro tal y como lo entrega el listado de ficheros, sin validar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNodeRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub folder_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub parent_folder_id: Option<String>,
    pub url: Option<String>,
    pub size: Option<i64>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: String,
    pub name: Option<String>,
    pub folder_name: Option<String>,
    pub parent_folder_id: Option<String>,
    pub url: Option<String>,
    pub size: Option<i64>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub id: String,
    pub name: Option<String>,
    pub folder_name: Option<String>,
    pub parent_folder_id: Option<String>,
}

/// Nodo validado del árbol virtual de un usuario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    File(FileNode),
    Folder(FolderNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::File(f) => &f.id,
            Node::Folder(f) => &f.id,
        }
    }

    pub fn parent_folder_id(&self) -> Option<&str> {
        match self {
            Node::File(f) => f.parent_folder_id.as_deref(),
            Node::Folder(f) => f.parent_folder_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeRejection {
    #[error("node record without id")]
    MissingId,
    #[error("node {id} has unsupported type {kind:?}")]
    UnknownType { id: String, kind: Option<String> },
}

impl TryFrom<RawNodeRecord> for Node {
    type Error = NodeRejection;

    fn try_from(raw: RawNodeRecord) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(NodeRejection::MissingId)?;
        // Una referencia vacía equivale a la raíz.
        let parent_folder_id = raw.parent_folder_id.filter(|p| !p.is_empty());

        match raw.kind.as_deref() {
            Some("folder") => Ok(Node::Folder(FolderNode {
                id,
                name: raw.name,
                folder_name: raw.folder_name,
                parent_folder_id,
            })),
            Some("file") => Ok(Node::File(FileNode {
                id,
                name: raw.name,
                folder_name: raw.folder_name,
                parent_folder_id,
                url: raw.url,
                size: raw.size,
                created_at: raw.created_at,
            })),
            _ => Err(NodeRejection::UnknownType { id, kind: raw.kind }),
        }
    }
}

/// Estado de almacenamiento de un usuario con límite configurado (en KB).
#[derive(Debug, Clone)]
pub struct UserStorage {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub storage_used: i64,
    pub max_storage_limit: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub user_id: String,
}

/// Notificación persistida; nunca se modifica ni se borra desde aquí.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BirthdayCandidate {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: NaiveDate,
}

/// Usuario completo tal y como vive en el almacén.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub sin_number: Option<String>,
    pub business_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub contact_number: Option<String>,
    pub send_birthday_email: bool,
    pub storage_used: i64,
    pub max_storage_limit: i64,
    pub created_at: DateTime<Utc>,
}

/// Datos de alta de un usuario; la contraseña ya llega hasheada.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub sin_number: Option<String>,
    pub business_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub contact_number: Option<String>,
    pub is_admin: bool,
    pub max_storage_limit: Option<i64>,
}

/// Proyección pública de un usuario recién creado.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub sin_number: Option<String>,
    pub business_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub contact_number: Option<String>,
}

impl From<&UserRecord> for UserSummary {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            sin_number: user.sin_number.clone(),
            business_number: user.business_number.clone(),
            date_of_birth: user.date_of_birth,
            is_admin: user.is_admin,
            created_at: user.created_at,
            contact_number: user.contact_number.clone(),
        }
    }
}
