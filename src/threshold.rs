//! Aviso de almacenamiento casi lleno / lleno.
//!
//! Cada ejecución de la tarea programada recalcula el porcentaje de uso de
//! todos los usuarios con límite y notifica (a los administradores y al propio
//! usuario) a los que estén en la banda de aviso o llenos. No hay estado entre
//! ejecuciones: un usuario que siga lleno vuelve a recibir el aviso.

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

use crate::models::{AdminRef, NewNotification, UserStorage};
use crate::store::Store;

pub const WARNING_PERCENT: u8 = 90;
pub const FULL_PERCENT: u8 = 100;

const KB_PER_MB: f64 = 1024.0;
const KB_PER_GB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    None,
    Warning,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub percent: u8,
    pub band: Band,
}

impl Band {
    pub fn title(self) -> Option<&'static str> {
        match self {
            Band::None => None,
            Band::Warning => Some("Storage Almost Full"),
            Band::Full => Some("Storage Full"),
        }
    }
}

/// Porcentaje entero de uso (acotado a `[0, 100]`) y su banda.
pub fn classify(storage_used: f64, max_storage_limit: f64) -> Usage {
    let raw = if max_storage_limit > 0.0 {
        100.0 * storage_used / max_storage_limit
    } else {
        0.0
    };
    let clamped = if raw.is_nan() { 0.0 } else { raw.min(100.0).round().max(0.0) };
    let percent = clamped as u8;

    let band = if percent >= FULL_PERCENT {
        Band::Full
    } else if percent >= WARNING_PERCENT {
        Band::Warning
    } else {
        Band::None
    };

    Usage { percent, band }
}

/// Redondeo a dos decimales con los empates hacia arriba (1.125 -> 1.13).
fn round_two_places(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Tamaño legible a partir de KB: `x.xx GB`, `x.xx MB` o `n KB`.
pub fn format_readable_size(kb: i64) -> String {
    let value = kb as f64;
    if value >= KB_PER_GB {
        format!("{:.2} GB", round_two_places(value / KB_PER_GB))
    } else if value >= KB_PER_MB {
        format!("{:.2} MB", round_two_places(value / KB_PER_MB))
    } else {
        format!("{kb} KB")
    }
}

/// Avisos a emitir para un usuario: uno por administrador más el del usuario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAlert {
    pub percent: u8,
    pub band: Band,
    pub admin_notifications: Vec<NewNotification>,
    pub user_notification: NewNotification,
}

/// Calcula los avisos de un usuario sin efectos secundarios. `None` si está
/// por debajo de la banda de aviso.
pub fn evaluate_user(user: &UserStorage, admins: &[AdminRef]) -> Option<StorageAlert> {
    let usage = classify(user.storage_used as f64, user.max_storage_limit as f64);
    let title = usage.band.title()?;

    let used = format_readable_size(user.storage_used);
    let limit = format_readable_size(user.max_storage_limit);
    let who = user
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .or(user.name.as_deref().filter(|n| !n.is_empty()))
        .unwrap_or(user.id.as_str());

    let admin_message = format!(
        "User {who} has used {}% of their storage ({used} of {limit}).",
        usage.percent
    );
    let user_message = format!(
        "You have used {}% of your storage ({used} of {limit}).",
        usage.percent
    );

    Some(StorageAlert {
        percent: usage.percent,
        band: usage.band,
        admin_notifications: admins
            .iter()
            .map(|admin| NewNotification {
                title: title.to_string(),
                message: admin_message.clone(),
                user_id: admin.id.clone(),
            })
            .collect(),
        user_notification: NewNotification {
            title: title.to_string(),
            message: user_message,
            user_id: user.id.clone(),
        },
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct NotifiedUser {
    pub id: String,
    pub email: Option<String>,
    pub percent: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdReport {
    pub count: usize,
    pub notified: Vec<NotifiedUser>,
}

async fn notify(store: &dyn Store, alert: StorageAlert) -> Result<()> {
    if !alert.admin_notifications.is_empty() {
        store.create_notifications(alert.admin_notifications).await?;
    }
    store.create_notification(alert.user_notification).await?;
    Ok(())
}

/// Ejecuta una pasada completa. Los fallos de escritura de un usuario se
/// registran y no detienen al resto; solo los fallos de lectura iniciales
/// abortan la pasada.
pub async fn run_storage_threshold(store: &dyn Store) -> Result<ThresholdReport> {
    let admins = store.list_admins().await?;
    let users = store.list_storage_candidates().await?;

    let mut notified = Vec::new();
    for user in users {
        let Some(alert) = evaluate_user(&user, &admins) else {
            continue;
        };
        let percent = alert.percent;
        info!(user_id = %user.id, band = ?alert.band, percent, "Usuario por encima del umbral");
        match notify(store, alert).await {
            Ok(()) => notified.push(NotifiedUser {
                id: user.id,
                email: user.email,
                percent,
            }),
            Err(err) => {
                error!(user_id = %user.id, "Fallo notificando umbral de almacenamiento: {err:#}");
            }
        }
    }

    info!(
        "Umbral de almacenamiento: {} usuarios notificados ({} administradores).",
        notified.len(),
        admins.len()
    );
    Ok(ThresholdReport {
        count: notified.len(),
        notified,
    })
}
