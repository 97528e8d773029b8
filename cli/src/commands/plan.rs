use anyhow::{Result, bail};
use tabled::{Table, Tabled, settings::Style};

use nutrisense_core::db::Database;
use nutrisense_core::planner::{MealPlan, PlanRequest};

use crate::assistant::Assistant;

use super::helpers::{print_json, require_profile, short_time};

pub(crate) async fn cmd_plan_generate(
    assistant: &Assistant,
    user_id: &str,
    request: PlanRequest,
    json: bool,
) -> Result<()> {
    let plan = assistant.generate_meal_plan(user_id, request).await?;
    if json {
        print_json(&plan)?;
    } else {
        if plan.source == "template" {
            eprintln!("Note: the assistant was unavailable, so this is a basic template plan.");
        }
        print_plan(&plan);
    }
    Ok(())
}

pub(crate) fn cmd_plan_list(db: &Database, user_id: &str, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    let plans = db.list_meal_plans(&profile.id)?;

    if json {
        print_json(&plans)?;
    } else if plans.is_empty() {
        eprintln!("No saved meal plans. Use `nutrisense plan generate` to create one.");
    } else {
        #[derive(Tabled)]
        struct PlanRow {
            #[tabled(rename = "ID")]
            id: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Days")]
            days: usize,
            #[tabled(rename = "Source")]
            source: String,
            #[tabled(rename = "Created")]
            created: String,
        }

        let rows: Vec<PlanRow> = plans
            .iter()
            .map(|p| PlanRow {
                id: p.id.clone(),
                name: p.plan_name.clone(),
                days: p.days.len(),
                source: p.source.clone(),
                created: short_time(&p.created_at),
            })
            .collect();
        println!("{}", Table::new(&rows).with(Style::rounded()));
    }
    Ok(())
}

pub(crate) fn cmd_plan_show(db: &Database, user_id: &str, plan_id: &str, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    let Some(plan) = db.get_meal_plan(&profile.id, plan_id)? else {
        bail!("Meal plan {plan_id} not found");
    };

    if json {
        print_json(&plan)?;
    } else {
        print_plan(&plan);
    }
    Ok(())
}

pub(crate) fn cmd_plan_delete(db: &Database, user_id: &str, plan_id: &str, json: bool) -> Result<()> {
    let profile = require_profile(db, user_id)?;
    if !db.delete_meal_plan(&profile.id, plan_id)? {
        bail!("Meal plan {plan_id} not found");
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": plan_id }));
    } else {
        println!("Deleted meal plan {plan_id}");
    }
    Ok(())
}

fn print_plan(plan: &MealPlan) {
    println!("{} ({})", plan.plan_name, plan.id);
    println!("Ingredients: {}", plan.ingredients.join(", "));
    if !plan.preferences.dietary.is_empty() {
        println!("Dietary: {}", plan.preferences.dietary.join(", "));
    }
    for day in &plan.days {
        println!("\nDay {}", day.day);
        for meal in &day.meals {
            let marker = if meal.diabetic_friendly { " [diabetic-friendly]" } else { "" };
            println!("  {} ({} min){marker}", meal.title, meal.prep_minutes);
            if !meal.ingredients.is_empty() {
                println!("    Uses: {}", meal.ingredients.join(", "));
            }
            if !meal.instructions.is_empty() {
                println!("    {}", meal.instructions);
            }
        }
    }
}
