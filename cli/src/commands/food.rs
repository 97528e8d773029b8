use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrisense_core::db::Database;
use nutrisense_core::models::{FoodLog, NewFoodLog};

use super::helpers::{no_neg_zero, opt_num, parse_date, print_json, require_profile, short_time, truncate};

pub(crate) fn cmd_food_log(db: &Database, user_id: &str, mut entry: NewFoodLog, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    entry.normalize()?;
    let log = db.insert_food_log(&profile.id, &entry)?;

    if json {
        print_json(&log)?;
    } else {
        println!(
            "Logged {} ({}) as {}",
            log.food_name,
            log.calories.map_or("? kcal".into(), |c| format!("{c:.0} kcal")),
            log.meal_type
        );
        if let (Some(gl), Some(spike)) = (log.glycemic_load, log.predicted_blood_sugar_spike) {
            println!("  Glycemic load {gl:.1}, predicted rise ~{spike:.0} mg/dL");
        }
    }
    Ok(())
}

pub(crate) fn cmd_food_list(
    db: &Database,
    user_id: &str,
    date: Option<String>,
    recent: Option<i64>,
    json: bool,
) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    let logs = match recent {
        Some(n) if n <= 0 => bail!("--recent must be positive"),
        Some(n) => db.get_recent_food_logs(&profile.id, n)?,
        None => db.get_food_logs_for_date(&profile.id, parse_date(date)?)?,
    };

    if json {
        print_json(&logs)?;
    } else if logs.is_empty() {
        eprintln!("No food logged. Use `nutrisense food log` to add an entry.");
    } else {
        print_food_logs(&logs);
    }
    Ok(())
}

pub(crate) fn cmd_food_summary(db: &Database, user_id: &str, date: Option<String>, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    let date = parse_date(date)?;
    let totals = db.daily_totals(&profile.id, date)?;

    if json {
        return print_json(&totals);
    }
    println!("{} ({} entries)", totals.date, totals.entries);
    println!("  Calories:  {:.0} kcal", no_neg_zero(totals.calories));
    println!("  Protein:   {:.1} g", no_neg_zero(totals.protein_g));
    println!("  Carbs:     {:.1} g", no_neg_zero(totals.carbs_g));
    println!("  Fat:       {:.1} g", no_neg_zero(totals.fat_g));
    println!("  Fiber:     {:.1} g", no_neg_zero(totals.fiber_g));
    println!("  Sugar:     {:.1} g", no_neg_zero(totals.sugar_g));
    println!("  Sodium:    {:.0} mg", no_neg_zero(totals.sodium_mg));
    Ok(())
}

pub(crate) fn cmd_food_delete(db: &Database, user_id: &str, log_id: &str, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    if !db.delete_food_log(&profile.id, log_id)? {
        bail!("Food log {log_id} not found");
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": log_id }));
    } else {
        println!("Deleted food log {log_id}");
    }
    Ok(())
}

fn print_food_logs(logs: &[FoodLog]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "GL")]
        gl: String,
    }

    let rows: Vec<FoodRow> = logs
        .iter()
        .map(|l| FoodRow {
            id: l.id.chars().take(8).collect(),
            time: short_time(&l.logged_at),
            meal: l.meal_type.clone(),
            food: truncate(&l.food_name, 30),
            calories: opt_num(l.calories),
            carbs: opt_num(l.carbs_g),
            gl: l.glycemic_load.map_or("-".into(), |v| format!("{v:.1}")),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_food_log_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile("ada@example.com", None).unwrap();
        let entry = NewFoodLog {
            meal_type: "Dinner".to_string(),
            food_name: " Moi Moi ".to_string(),
            calories: Some(200.0),
            ..NewFoodLog::default()
        };
        cmd_food_log(&db, &profile.id, entry, true).unwrap();

        let logs = db.get_recent_food_logs(&profile.id, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].meal_type, "dinner");
        assert_eq!(logs[0].food_name, "Moi Moi");

        cmd_food_delete(&db, &profile.id, &logs[0].id, true).unwrap();
        assert!(cmd_food_delete(&db, &profile.id, &logs[0].id, true).is_err());
    }

    #[test]
    fn test_food_list_rejects_bad_limit() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile("ada@example.com", None).unwrap();
        assert!(cmd_food_list(&db, &profile.id, None, Some(0), true).is_err());
        cmd_food_list(&db, &profile.id, None, None, true).unwrap();
    }
}
