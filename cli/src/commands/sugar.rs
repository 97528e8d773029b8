use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrisense_core::db::Database;
use nutrisense_core::diary::classify_readings;
use nutrisense_core::models::NewBloodSugarReading;

use super::helpers::{print_json, require_profile, short_time};

pub(crate) fn cmd_sugar_log(
    db: &Database,
    user_id: &str,
    mut reading: NewBloodSugarReading,
    json: bool,
) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    reading.normalize()?;
    let mut saved = db.insert_blood_sugar(&profile.id, &reading)?;
    classify_readings(std::slice::from_mut(&mut saved), &profile);

    if json {
        print_json(&saved)?;
    } else {
        print!("Logged {:.0} mg/dL ({})", saved.reading_mg_dl, saved.reading_type);
        match saved.status.as_deref() {
            Some("in_range") => println!(", within your target range"),
            Some(status) => println!(", {status} for your target range"),
            None => println!(),
        }
    }
    Ok(())
}

pub(crate) fn cmd_sugar_list(db: &Database, user_id: &str, limit: i64, json: bool) -> Result<()> {
    if limit <= 0 {
        bail!("--limit must be positive");
    }
    let profile = require_profile(db, user_id)?;
    let mut readings = db.get_blood_sugar_history(&profile.id, limit)?;
    classify_readings(&mut readings, &profile);

    if json {
        print_json(&readings)?;
    } else if readings.is_empty() {
        eprintln!("No readings yet. Use `nutrisense sugar log` to record one.");
    } else {
        #[derive(Tabled)]
        struct ReadingRow {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Measured")]
            measured: String,
            #[tabled(rename = "mg/dL")]
            value: String,
            #[tabled(rename = "Type")]
            kind: String,
            #[tabled(rename = "Status")]
            status: String,
            #[tabled(rename = "Notes")]
            notes: String,
        }

        let rows: Vec<ReadingRow> = readings
            .iter()
            .map(|r| ReadingRow {
                id: r.id.chars().take(8).collect(),
                measured: short_time(&r.measured_at),
                value: format!("{:.0}", r.reading_mg_dl),
                kind: r.reading_type.clone(),
                status: r.status.clone().unwrap_or_else(|| "-".to_string()),
                notes: r.notes.clone().unwrap_or_default(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
    Ok(())
}

pub(crate) fn cmd_sugar_delete(db: &Database, user_id: &str, reading_id: &str, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    if !db.delete_blood_sugar(&profile.id, reading_id)? {
        bail!("Reading {reading_id} not found");
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": reading_id }));
    } else {
        println!("Deleted reading {reading_id}");
    }
    Ok(())
}
