//! Alta de usuarios por un administrador y comprobación de credenciales.
//! No se emiten sesiones ni tokens: solo se valida.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::models::{NewUser, UserSummary};
use crate::store::Store;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email and password are required.")]
    MissingCredentials,
    #[error("User already exists.")]
    AlreadyExists,
    #[error("Invalid date of birth format.")]
    InvalidDateOfBirth,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter both email and password")]
    MissingFields,
    #[error("No account found with this email")]
    UnknownEmail,
    #[error("Your account is inactive. Please contact support.")]
    Inactive,
    #[error("No password set for this account. Please use your provider (e.g., Google) or reset your password.")]
    NoPassword,
    #[error("Invalid email or password")]
    InvalidPassword,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub sin_number: Option<String>,
    pub business_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub contact_number: Option<String>,
    /// Se interpreta con veracidad laxa (`1`, `"yes"`, `true`...).
    pub is_admin: Option<Value>,
    pub max_storage_limit: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Solo se respeta un límite numérico positivo, truncado a entero.
fn storage_limit(value: Option<&Value>) -> Option<i64> {
    value
        .and_then(Value::as_f64)
        .filter(|limit| *limit > 0.0)
        .map(|limit| limit.floor() as i64)
}

/// Fecha de nacimiento como día UTC; las fechas con desfase se normalizan antes.
pub fn parse_date_of_birth(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

async fn hash_password(password: String, cost: u32) -> anyhow::Result<String> {
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("Tarea de hash interrumpida")??;
    Ok(hashed)
}

async fn verify_password(password: String, hash: String) -> anyhow::Result<bool> {
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("Tarea de verificación interrumpida")??;
    Ok(valid)
}

pub async fn create_user(
    store: &dyn Store,
    payload: CreateUserPayload,
    bcrypt_cost: u32,
) -> Result<UserSummary, AccountError> {
    let (Some(email), Some(password)) = (non_empty(payload.email), non_empty(payload.password))
    else {
        return Err(AccountError::MissingCredentials);
    };

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AccountError::AlreadyExists);
    }

    let date_of_birth = match non_empty(payload.date_of_birth) {
        Some(raw) => Some(parse_date_of_birth(&raw).ok_or(AccountError::InvalidDateOfBirth)?),
        None => None,
    };

    let password_hash = hash_password(password, bcrypt_cost).await?;

    let record = store
        .create_user(NewUser {
            email,
            password_hash,
            name: payload.name,
            sin_number: payload.sin_number,
            business_number: payload.business_number,
            date_of_birth,
            contact_number: payload.contact_number,
            is_admin: payload.is_admin.as_ref().is_some_and(truthy),
            max_storage_limit: storage_limit(payload.max_storage_limit.as_ref()),
        })
        .await?;

    info!(user_id = %record.id, is_admin = record.is_admin, "Usuario dado de alta");
    Ok(UserSummary::from(&record))
}

pub async fn validate_credentials(
    store: &dyn Store,
    payload: LoginPayload,
) -> Result<AuthenticatedUser, AuthError> {
    let (Some(email), Some(password)) = (non_empty(payload.email), non_empty(payload.password))
    else {
        return Err(AuthError::MissingFields);
    };

    let clean_email = email.trim().to_lowercase();
    let user = store
        .find_user_by_email(&clean_email)
        .await?
        .ok_or(AuthError::UnknownEmail)?;

    if !user.is_active {
        return Err(AuthError::Inactive);
    }

    let hash = non_empty(user.password_hash.clone()).ok_or(AuthError::NoPassword)?;
    if !verify_password(password, hash).await? {
        return Err(AuthError::InvalidPassword);
    }

    Ok(AuthenticatedUser {
        id: user.id,
        email: user.email,
        name: user.name.unwrap_or_default(),
        is_admin: user.is_admin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fixtures, MemoryStore};
    use serde_json::json;

    const COST: u32 = 4;

    fn payload(value: Value) -> CreateUserPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn limit_and_admin_flag_coercion() {
        assert_eq!(storage_limit(Some(&json!(2048.9))), Some(2048));
        assert_eq!(storage_limit(Some(&json!(0))), None);
        assert_eq!(storage_limit(Some(&json!("500"))), None);
        assert!(truthy(&json!("yes")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
    }

    #[test]
    fn date_of_birth_formats() {
        let expected = NaiveDate::from_ymd_opt(1990, 5, 17);
        assert_eq!(parse_date_of_birth("1990-05-17"), expected);
        assert_eq!(parse_date_of_birth("1990-05-17T10:00:00Z"), expected);
        assert_eq!(parse_date_of_birth("17/05/1990"), None);
        assert_eq!(
            parse_date_of_birth("1990-05-17T23:00:00-05:00"),
            NaiveDate::from_ymd_opt(1990, 5, 18)
        );
    }

    #[tokio::test]
    async fn creates_user_and_hides_password() {
        let store = MemoryStore::new();
        let summary = create_user(
            &store,
            payload(json!({
                "email": "nuevo@client.test",
                "password": "s3cret",
                "name": "Nuevo",
                "dateOfBirth": "1990-05-17",
                "isAdmin": 1,
                "maxStorageLimit": 1048576.7
            })),
            COST,
        )
        .await
        .unwrap();

        assert!(summary.is_admin);
        assert_eq!(summary.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 17));
        let stored = store.find_user_by_email("nuevo@client.test").await.unwrap().unwrap();
        assert_eq!(stored.max_storage_limit, 1048576);
        let hash = stored.password_hash.unwrap();
        assert_ne!(hash, "s3cret");
        assert!(bcrypt::verify("s3cret", &hash).unwrap());
    }

    #[tokio::test]
    async fn create_user_rejections() {
        let store = MemoryStore::new();
        store.insert_user(fixtures::user("u1", "taken@client.test"));

        let missing = create_user(&store, payload(json!({"email": "a@b.c"})), COST).await;
        assert!(matches!(missing, Err(AccountError::MissingCredentials)));

        let duplicate = create_user(
            &store,
            payload(json!({"email": "TAKEN@client.test", "password": "x"})),
            COST,
        )
        .await;
        assert!(matches!(duplicate, Err(AccountError::AlreadyExists)));

        let bad_date = create_user(
            &store,
            payload(json!({"email": "d@client.test", "password": "x", "dateOfBirth": "mañana"})),
            COST,
        )
        .await;
        assert!(matches!(bad_date, Err(AccountError::InvalidDateOfBirth)));
    }

    #[tokio::test]
    async fn credential_checks() {
        let store = MemoryStore::new();
        let mut active = fixtures::user("u1", "Ana@Client.test");
        active.password_hash = Some(bcrypt::hash("correcta", COST).unwrap());
        active.name = Some("Ana".into());
        store.insert_user(active);

        let mut inactive = fixtures::user("u2", "baja@client.test");
        inactive.is_active = false;
        inactive.password_hash = Some(bcrypt::hash("x", COST).unwrap());
        store.insert_user(inactive);

        store.insert_user(fixtures::user("u3", "oauth@client.test"));

        let login = |email: &str, password: &str| LoginPayload {
            email: Some(email.into()),
            password: Some(password.into()),
        };

        let ok = validate_credentials(&store, login(" ANA@client.test", "correcta")).await.unwrap();
        assert_eq!(ok.id, "u1");
        assert_eq!(ok.name, "Ana");

        assert!(matches!(
            validate_credentials(&store, login("ana@client.test", "mala")).await,
            Err(AuthError::InvalidPassword)
        ));
        assert!(matches!(
            validate_credentials(&store, login("nadie@client.test", "x")).await,
            Err(AuthError::UnknownEmail)
        ));
        assert!(matches!(
            validate_credentials(&store, login("baja@client.test", "x")).await,
            Err(AuthError::Inactive)
        ));
        assert!(matches!(
            validate_credentials(&store, login("oauth@client.test", "x")).await,
            Err(AuthError::NoPassword)
        ));
        assert!(matches!(
            validate_credentials(&store, LoginPayload::default()).await,
            Err(AuthError::MissingFields)
        ));
    }
}
