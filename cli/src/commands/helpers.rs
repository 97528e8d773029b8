use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;

use nutrisense_core::db::Database;
use nutrisense_core::models::{Profile, validate_user_id};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD, today or yesterday")),
        },
    }
}

/// Resolve a user id argument to its profile.
pub(crate) fn require_profile(db: &Database, user_id: &str) -> Result<Profile> {
    let user_id = validate_user_id(user_id)?;
    db.get_profile(&user_id)?
        .with_context(|| format!("Profile {user_id} not found. Create one with `nutrisense profile create`"))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render a stored RFC 3339 timestamp as local `YYYY-MM-DD HH:MM`.
pub(crate) fn short_time(ts: &str) -> String {
    DateTime::parse_from_rfc3339(ts).map_or_else(
        |_| ts.to_string(),
        |dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub(crate) fn opt_num(v: Option<f64>) -> String {
    v.map_or("-".into(), |v| format!("{:.0}", no_neg_zero(v)))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2025-03-01".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert!(parse_date(Some("01/03/2025".to_string())).is_err());
    }

    #[test]
    fn test_require_profile() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile("ada@example.com", None).unwrap();
        let found = require_profile(&db, &profile.id.to_uppercase()).unwrap();
        assert_eq!(found.id, profile.id);
        assert!(require_profile(&db, "demo-user").is_err());
        assert!(require_profile(&db, &uuid::Uuid::new_v4().to_string()).is_err());
    }

    #[test]
    fn test_short_time() {
        assert_eq!(short_time("not a time"), "not a time");
        let local = Local::now();
        let ts = local.to_rfc3339();
        assert_eq!(short_time(&ts), local.format("%Y-%m-%d %H:%M").to_string());
    }

    #[test]
    fn test_opt_num() {
        assert_eq!(opt_num(None), "-");
        assert_eq!(opt_num(Some(349.6)), "350");
        assert_eq!(opt_num(Some(-0.0)), "0");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Jollof Rice", 20), "Jollof Rice");
        assert_eq!(truncate("Ofada rice with ayamase stew", 12), "Ofada ric...");
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
    }
}
