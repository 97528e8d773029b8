use anyhow::{Result, bail};
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrisense_core::db::Database;
use nutrisense_core::diary::{Goal, NewHealthLog, TrackingFrequency, Trend};

use super::helpers::{print_json, require_profile};

/// Show the diary settings, or update whichever of goal and frequency is given.
pub(crate) fn cmd_diary_settings(
    db: &Database,
    user_id: &str,
    goal: Option<&str>,
    frequency: Option<&str>,
    json: bool,
) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    let current = db.get_diary_settings(&profile.id)?;

    if goal.is_none() && frequency.is_none() {
        match current {
            Some(settings) if json => print_json(&settings)?,
            Some(settings) => println!(
                "Goal: {} | Tracking: {}",
                settings.goal.as_str(),
                settings.tracking_frequency.as_str()
            ),
            None if json => println!("{}", serde_json::json!({ "error": "No diary settings saved yet" })),
            None => eprintln!("No diary settings yet. Set them with --goal loss|gain|maintain"),
        }
        return Ok(());
    }

    let goal = match (goal, &current) {
        (Some(g), _) => Goal::parse(g)?,
        (None, Some(settings)) => settings.goal,
        (None, None) => bail!("Set a goal first with --goal loss|gain|maintain"),
    };
    let frequency = match (frequency, &current) {
        (Some(f), _) => TrackingFrequency::parse(f)?,
        (None, Some(settings)) => settings.tracking_frequency,
        (None, None) => TrackingFrequency::Daily,
    };
    let settings = db.upsert_diary_settings(&profile.id, goal, frequency)?;

    if json {
        print_json(&settings)?;
    } else {
        println!(
            "Saved: goal {}, tracking {}",
            settings.goal.as_str(),
            settings.tracking_frequency.as_str()
        );
    }
    Ok(())
}

pub(crate) fn cmd_diary_log(db: &Database, user_id: &str, form: &NewHealthLog, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    let metrics = form.validate()?;
    let log = db.insert_health_log(&profile.id, &metrics)?;

    if json {
        print_json(&log)?;
    } else {
        println!(
            "Logged {:.1} kg, {:.0} mg/dL, {}/{} mmHg, feeling {}",
            log.weight_kg,
            log.blood_sugar_mg_dl,
            log.systolic,
            log.diastolic,
            log.mood.as_str()
        );
    }
    Ok(())
}

pub(crate) fn cmd_diary_timeline(db: &Database, user_id: &str, limit: Option<i64>, json: bool) -> Result<()> {
    if limit.is_some_and(|n| n <= 0) {
        bail!("--limit must be positive");
    }
    let profile = require_profile(db, user_id)?;
    let timeline = db.health_timeline(&profile.id, limit, Local::now())?;

    if json {
        print_json(&timeline)?;
    } else if timeline.is_empty() {
        eprintln!("No diary entries yet. Use `nutrisense diary log` to add one.");
    } else {
        #[derive(Tabled)]
        struct TimelineRow {
            #[tabled(rename = "When")]
            when: String,
            #[tabled(rename = "Weight")]
            weight: String,
            #[tabled(rename = "Trend")]
            trend: &'static str,
            #[tabled(rename = "Sugar")]
            sugar: String,
            #[tabled(rename = "BP")]
            bp: String,
            #[tabled(rename = "Mood")]
            mood: &'static str,
        }

        let rows: Vec<TimelineRow> = timeline
            .iter()
            .map(|e| TimelineRow {
                when: e.relative_date.clone(),
                weight: format!("{:.1} kg", e.log.weight_kg),
                trend: match e.trend {
                    Trend::Improving => "improving",
                    Trend::Declining => "declining",
                    Trend::Neutral => "-",
                },
                sugar: format!("{:.0}", e.log.blood_sugar_mg_dl),
                bp: e.blood_pressure.clone(),
                mood: e.log.mood.as_str(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
            .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
    Ok(())
}
