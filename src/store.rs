//! Acceso a datos detrás de un trait, para inyectar el almacén en cada
//! componente en lugar de usar un cliente global.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    AdminRef, BirthdayCandidate, NewNotification, NewUser, Notification, RawNodeRecord,
    UserRecord, UserStorage,
};

#[async_trait]
pub trait Store: Send + Sync {
    /// Nombre del backend, para diagnóstico.
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<()>;

    async fn list_admins(&self) -> Result<Vec<AdminRef>>;

    /// Usuarios con `max_storage_limit > 0`.
    async fn list_storage_candidates(&self) -> Result<Vec<UserStorage>>;

    /// Usuarios con fecha de nacimiento que aceptan felicitaciones.
    async fn list_birthday_candidates(&self) -> Result<Vec<BirthdayCandidate>>;

    async fn create_notification(&self, notification: NewNotification) -> Result<Notification>;

    /// Inserta el lote completo o nada.
    async fn create_notifications(&self, batch: Vec<NewNotification>) -> Result<usize>;

    /// Listado plano de ficheros y carpetas de respuesta de un usuario.
    async fn list_response_files(&self, user_id: &str) -> Result<Vec<RawNodeRecord>>;

    /// Búsqueda sin distinguir mayúsculas.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn create_user(&self, user: NewUser) -> Result<UserRecord>;
}

pub(crate) fn materialize(notification: NewNotification) -> Notification {
    Notification {
        id: Uuid::new_v4().to_string(),
        title: notification.title,
        message: notification.message,
        user_id: notification.user_id,
        created_at: Utc::now(),
    }
}

pub(crate) fn materialize_user(user: NewUser) -> UserRecord {
    UserRecord {
        id: Uuid::new_v4().to_string(),
        email: user.email,
        name: user.name,
        password_hash: Some(user.password_hash),
        is_admin: user.is_admin,
        is_active: true,
        sin_number: user.sin_number,
        business_number: user.business_number,
        date_of_birth: user.date_of_birth,
        contact_number: user.contact_number,
        send_birthday_email: true,
        storage_used: 0,
        max_storage_limit: user.max_storage_limit.unwrap_or(0),
        created_at: Utc::now(),
    }
}

#[derive(Default)]
struct MemoryData {
    users: Vec<UserRecord>,
    nodes: Vec<(String, RawNodeRecord)>,
    notifications: Vec<Notification>,
}

/// Almacén en proceso (`STORE_BACKEND=memory`). Se pierde al reiniciar.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_data<T>(&self, f: impl FnOnce(&mut MemoryData) -> T) -> Result<T> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| anyhow!("Almacén en memoria bloqueado tras un pánico"))?;
        Ok(f(&mut data))
    }

    #[cfg(test)]
    pub fn insert_user(&self, user: UserRecord) {
        self.data.lock().unwrap().users.push(user);
    }

    #[cfg(test)]
    pub fn insert_node(&self, owner_id: &str, node: RawNodeRecord) {
        self.data.lock().unwrap().nodes.push((owner_id.to_string(), node));
    }

    #[cfg(test)]
    pub fn notifications(&self) -> Vec<Notification> {
        self.data.lock().unwrap().notifications.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        self.with_data(|_| ())
    }

    async fn list_admins(&self) -> Result<Vec<AdminRef>> {
        self.with_data(|data| {
            data.users
                .iter()
                .filter(|u| u.is_admin)
                .map(|u| AdminRef { id: u.id.clone() })
                .collect()
        })
    }

    async fn list_storage_candidates(&self) -> Result<Vec<UserStorage>> {
        self.with_data(|data| {
            data.users
                .iter()
                .filter(|u| u.max_storage_limit > 0)
                .map(|u| UserStorage {
                    id: u.id.clone(),
                    email: Some(u.email.clone()),
                    name: u.name.clone(),
                    storage_used: u.storage_used,
                    max_storage_limit: u.max_storage_limit,
                })
                .collect()
        })
    }

    async fn list_birthday_candidates(&self) -> Result<Vec<BirthdayCandidate>> {
        self.with_data(|data| {
            data.users
                .iter()
                .filter(|u| u.send_birthday_email)
                .filter_map(|u| {
                    u.date_of_birth.map(|dob| BirthdayCandidate {
                        id: u.id.clone(),
                        name: u.name.clone(),
                        email: Some(u.email.clone()).filter(|e| !e.is_empty()),
                        date_of_birth: dob,
                    })
                })
                .collect()
        })
    }

    async fn create_notification(&self, notification: NewNotification) -> Result<Notification> {
        let stored = materialize(notification);
        self.with_data(|data| data.notifications.push(stored.clone()))?;
        Ok(stored)
    }

    async fn create_notifications(&self, batch: Vec<NewNotification>) -> Result<usize> {
        let count = batch.len();
        let stored: Vec<Notification> = batch.into_iter().map(materialize).collect();
        self.with_data(|data| data.notifications.extend(stored))?;
        Ok(count)
    }

    async fn list_response_files(&self, user_id: &str) -> Result<Vec<RawNodeRecord>> {
        self.with_data(|data| {
            data.nodes
                .iter()
                .filter(|(owner, _)| owner == user_id)
                .map(|(_, node)| node.clone())
                .collect()
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let wanted = email.to_lowercase();
        self.with_data(|data| {
            data.users
                .iter()
                .find(|u| u.email.to_lowercase() == wanted)
                .cloned()
        })
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let record = materialize_user(user);
        let wanted = record.email.to_lowercase();
        self.with_data(|data| {
            if data.users.iter().any(|u| u.email.to_lowercase() == wanted) {
                return Err(anyhow!("Ya existe un usuario con email {}", record.email));
            }
            data.users.push(record.clone());
            Ok(record)
        })?
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, Utc};

    use crate::models::UserRecord;

    pub fn user(id: &str, email: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            email: email.to_string(),
            name: None,
            password_hash: None,
            is_admin: false,
            is_active: true,
            sin_number: None,
            business_number: None,
            date_of_birth: None,
            contact_number: None,
            send_birthday_email: false,
            storage_used: 0,
            max_storage_limit: 0,
            created_at: Utc::now(),
        }
    }

    pub fn admin(id: &str) -> UserRecord {
        UserRecord {
            is_admin: true,
            ..user(id, &format!("{id}@office.test"))
        }
    }

    pub fn with_storage(mut user: UserRecord, used: i64, limit: i64) -> UserRecord {
        user.storage_used = used;
        user.max_storage_limit = limit;
        user
    }

    pub fn born(mut user: UserRecord, y: i32, m: u32, d: u32) -> UserRecord {
        user.date_of_birth = NaiveDate::from_ymd_opt(y, m, d);
        user.send_birthday_email = true;
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    #[test]
    fn email_lookup_ignores_case() {
        let store = MemoryStore::new();
        store.insert_user(fixtures::user("u1", "Ana@Example.com"));

        let found = tokio_test::block_on(store.find_user_by_email("ana@example.COM")).unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
    }

    #[test]
    fn candidates_require_a_positive_limit() {
        let store = MemoryStore::new();
        store.insert_user(fixtures::with_storage(fixtures::user("a", "a@x.io"), 10, 0));
        store.insert_user(fixtures::with_storage(fixtures::user("b", "b@x.io"), 10, 100));

        let users = tokio_test::block_on(store.list_storage_candidates()).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "b");
    }

    #[test]
    fn duplicate_users_are_refused() {
        let store = MemoryStore::new();
        let new_user = NewUser {
            email: "dup@x.io".into(),
            password_hash: "hash".into(),
            ..Default::default()
        };
        tokio_test::block_on(store.create_user(new_user.clone())).unwrap();
        let again = NewUser { email: "DUP@x.io".into(), ..new_user };
        assert!(tokio_test::block_on(store.create_user(again)).is_err());
    }

    #[test]
    fn non_ascii_emails_fold_the_same_on_insert_and_lookup() {
        let store = MemoryStore::new();
        let first = NewUser {
            email: "ÉLISE@x.io".into(),
            password_hash: "hash".into(),
            ..Default::default()
        };
        tokio_test::block_on(store.create_user(first.clone())).unwrap();

        let found = tokio_test::block_on(store.find_user_by_email("élise@x.io")).unwrap();
        assert_eq!(found.map(|u| u.email), Some("ÉLISE@x.io".to_string()));

        let again = NewUser { email: "élise@x.io".into(), ..first };
        assert!(tokio_test::block_on(store.create_user(again)).is_err());
    }
}
