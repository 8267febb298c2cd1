//! Tarea programada de cumpleaños: localiza a los usuarios que cumplen años
//! hoy (mes y día en UTC). El envío de correo no forma parte del servicio, así
//! que cada resultado queda marcado como no enviado.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::models::BirthdayCandidate;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BirthdayResult {
    pub id: String,
    pub email: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BirthdayReport {
    pub count: usize,
    pub results: Vec<BirthdayResult>,
}

pub fn is_birthday(date_of_birth: NaiveDate, today: NaiveDate) -> bool {
    date_of_birth.month() == today.month() && date_of_birth.day() == today.day()
}

pub fn build_report(candidates: &[BirthdayCandidate], today: NaiveDate) -> BirthdayReport {
    let celebrating: Vec<&BirthdayCandidate> = candidates
        .iter()
        .filter(|u| is_birthday(u.date_of_birth, today))
        .collect();

    let results = celebrating
        .iter()
        .filter_map(|u| {
            let email = u.email.as_deref().filter(|e| !e.is_empty())?;
            Some(BirthdayResult {
                id: u.id.clone(),
                email: email.to_string(),
                success: false,
            })
        })
        .collect();

    BirthdayReport {
        count: celebrating.len(),
        results,
    }
}

pub async fn run_birthdays(store: &dyn Store, today: NaiveDate) -> Result<BirthdayReport> {
    let candidates = store.list_birthday_candidates().await?;
    let report = build_report(&candidates, today);
    info!("Cumpleaños {today}: {} usuarios de {} candidatos.", report.count, candidates.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fixtures, MemoryStore};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn matches_month_and_day_ignoring_year() {
        assert!(is_birthday(day(1990, 3, 14), day(2026, 3, 14)));
        assert!(!is_birthday(day(1990, 3, 14), day(2026, 3, 15)));
        assert!(!is_birthday(day(1990, 4, 14), day(2026, 3, 14)));
    }

    #[test]
    fn users_without_email_are_counted_but_not_listed() {
        let candidates = vec![
            BirthdayCandidate {
                id: "a".into(),
                name: None,
                email: Some("a@x.io".into()),
                date_of_birth: day(1985, 10, 18),
            },
            BirthdayCandidate {
                id: "b".into(),
                name: Some("Sin correo".into()),
                email: None,
                date_of_birth: day(2001, 10, 18),
            },
            BirthdayCandidate {
                id: "c".into(),
                name: None,
                email: Some("c@x.io".into()),
                date_of_birth: day(2001, 1, 1),
            },
        ];
        let report = build_report(&candidates, day(2026, 10, 18));
        assert_eq!(report.count, 2);
        assert_eq!(
            report.results,
            vec![BirthdayResult { id: "a".into(), email: "a@x.io".into(), success: false }]
        );
    }

    #[tokio::test]
    async fn skips_users_who_opted_out() {
        let store = MemoryStore::new();
        store.insert_user(fixtures::born(fixtures::user("yes", "yes@x.io"), 1990, 6, 1));
        let mut opted_out = fixtures::born(fixtures::user("no", "no@x.io"), 1990, 6, 1);
        opted_out.send_birthday_email = false;
        store.insert_user(opted_out);

        let report = run_birthdays(&store, day(2026, 6, 1)).await.unwrap();
        assert_eq!(report.count, 1);
        assert_eq!(report.results[0].id, "yes");
    }
}
