use anyhow::{Result, bail};
use tabled::{Table, Tabled, settings::Style};

use nutrisense_core::db::Database;
use nutrisense_core::models::{Profile, ProfileUpdate};

use super::helpers::{print_json, require_profile, truncate};

pub(crate) fn cmd_profile_create(
    db: &Database,
    email: &str,
    name: Option<&str>,
    json: bool,
) -> Result<()> {
    let email = email.trim();
    if db.find_profile_by_email(email)?.is_some() {
        bail!("A profile for {email} already exists");
    }
    let profile = db.create_profile(email, name.map(str::trim).filter(|n| !n.is_empty()))?;

    if json {
        print_json(&profile)?;
    } else {
        println!("Created profile {} for {}", profile.id, profile.email);
        println!("Next: nutrisense profile onboard {} --conditions \"Type 2 Diabetes\"", profile.id);
    }
    Ok(())
}

pub(crate) fn cmd_profile_show(db: &Database, user_id: &str, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    if json {
        return print_json(&profile);
    }
    print_profile(&profile);
    Ok(())
}

pub(crate) fn cmd_profile_list(db: &Database, json: bool) -> Result<()> {
    let profiles = db.list_profiles()?;

    if json {
        print_json(&profiles)?;
    } else if profiles.is_empty() {
        eprintln!("No profiles yet. Use `nutrisense profile create <email>` to add one.");
    } else {
        #[derive(Tabled)]
        struct ProfileRow {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Email")]
            email: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Diabetes")]
            diabetes: String,
        }

        let rows: Vec<ProfileRow> = profiles
            .iter()
            .map(|p| ProfileRow {
                id: p.id.clone(),
                email: truncate(&p.email, 30),
                name: p.full_name.clone().unwrap_or_default(),
                diabetes: diabetes_label(p),
            })
            .collect();
        println!("{}", Table::new(&rows).with(Style::rounded()));
    }
    Ok(())
}

/// Save an onboarding submission. Every field is replaced.
pub(crate) fn cmd_profile_onboard(
    db: &Database,
    user_id: &str,
    mut update: ProfileUpdate,
    json: bool,
) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    update.normalize()?;
    let profile = db.update_profile(&profile.id, &update)?;

    if json {
        print_json(&profile)?;
    } else {
        println!("Onboarding saved.");
        print_profile(&profile);
    }
    Ok(())
}

fn diabetes_label(profile: &Profile) -> String {
    match (profile.has_diabetes, profile.diabetes_type.as_deref()) {
        (false, _) => "no".to_string(),
        (true, Some(kind)) => kind.to_string(),
        (true, None) => "yes".to_string(),
    }
}

fn print_profile(p: &Profile) {
    let list = |items: &Option<Vec<String>>| {
        items
            .as_deref()
            .map_or_else(|| "-".to_string(), |items| items.join(", "))
    };
    let text = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    println!("{} <{}>", p.full_name.as_deref().unwrap_or("(no name)"), p.email);
    println!("  ID:          {}", p.id);
    println!(
        "  Body:        age {}, {} kg, {} cm",
        p.age.map_or("-".into(), |a| a.to_string()),
        p.weight_kg.map_or("-".into(), |w| format!("{w:.1}")),
        p.height_cm.map_or("-".into(), |h| format!("{h:.0}")),
    );
    println!("  Activity:    {}", text(&p.activity_level));
    println!("  Conditions:  {}", list(&p.health_conditions));
    println!("  Diabetes:    {}", diabetes_label(p));
    if let (Some(min), Some(max)) = (p.target_blood_sugar_min, p.target_blood_sugar_max) {
        println!("  Target:      {min}-{max} mg/dL");
    }
    println!("  Diet:        {}", list(&p.dietary_preferences));
    println!("  Allergies:   {}", list(&p.allergies));
    println!("  Cuisines:    {}", list(&p.cultural_cuisine_preferences));
    if let Some(budget) = p.monthly_budget_usd {
        println!("  Budget:      ${budget:.0}/month");
    }
    println!("  Goal:        {}", text(&p.primary_goal));
    if p.secondary_goals.is_some() {
        println!("  Also:        {}", list(&p.secondary_goals));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rejects_existing_email() {
        let db = Database::open_in_memory().unwrap();
        cmd_profile_create(&db, "ada@example.com", Some("Ada"), true).unwrap();
        assert!(cmd_profile_create(&db, "Ada@Example.com", None, true).is_err());
        assert_eq!(db.list_profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_onboard_derives_diabetes() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile("ada@example.com", None).unwrap();
        let update = ProfileUpdate {
            health_conditions: vec!["Type 1 Diabetes".to_string()],
            ..ProfileUpdate::default()
        };
        cmd_profile_onboard(&db, &profile.id, update, true).unwrap();

        let saved = db.get_profile(&profile.id).unwrap().unwrap();
        assert!(saved.has_diabetes);
        assert_eq!(diabetes_label(&saved), "type1");
    }

    #[test]
    fn test_onboard_rejects_invalid_targets() {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile("ada@example.com", None).unwrap();
        let update = ProfileUpdate {
            target_blood_sugar_min: Some(180),
            target_blood_sugar_max: Some(70),
            ..ProfileUpdate::default()
        };
        assert!(cmd_profile_onboard(&db, &profile.id, update, true).is_err());
    }
}
