//! Meal planner: wizard preferences, the plan-generation prompt, and parsing
//! of the model's answer with a template fallback.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DIETARY_PREFERENCES: &[&str] = &[
    "vegetarian",
    "vegan",
    "halal",
    "kosher",
    "gluten-free",
    "dairy-free",
    "low-carb",
    "diabetic-friendly",
];

const TEMPLATE_INSTRUCTIONS: &str = "Combine ingredients and cook until done. Serve hot.";
const TEMPLATE_INGREDIENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealMode {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default = "default_meals_per_day")]
    pub meals_per_day: u8,
    #[serde(default = "default_mode")]
    pub mode: MealMode,
    #[serde(default = "default_days_count")]
    pub days_count: u8,
}

fn default_meals_per_day() -> u8 {
    3
}

fn default_mode() -> MealMode {
    MealMode::Daily
}

fn default_days_count() -> u8 {
    1
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dietary: Vec::new(),
            meals_per_day: default_meals_per_day(),
            mode: default_mode(),
            days_count: default_days_count(),
        }
    }
}

impl Preferences {
    pub fn normalize(&mut self) -> Result<()> {
        let mut dietary = Vec::with_capacity(self.dietary.len());
        for pref in &self.dietary {
            let pref = crate::models::validate_choice("dietary preference", pref, DIETARY_PREFERENCES)?;
            if !dietary.contains(&pref) {
                dietary.push(pref);
            }
        }
        self.dietary = dietary;

        if !(1..=6).contains(&self.meals_per_day) {
            bail!("meals_per_day must be between 1 and 6");
        }
        match self.mode {
            MealMode::Daily => self.days_count = 1,
            MealMode::Weekly => {
                if !(1..=7).contains(&self.days_count) {
                    bail!("days_count must be between 1 and 7");
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn diabetic_friendly(&self) -> bool {
        self.dietary.iter().any(|d| d == "diabetic-friendly")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meal {
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub prep_minutes: u32,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub diabetic_friendly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayPlan {
    pub day: u32,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealPlan {
    pub id: String,
    pub user_id: String,
    pub plan_name: String,
    pub preferences: Preferences,
    pub ingredients: Vec<String>,
    pub days: Vec<DayPlan>,
    /// `model` when the plan came from the language model, `template` otherwise.
    pub source: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub preferences: Preferences,
    pub plan_name: Option<String>,
}

impl PlanRequest {
    pub fn normalize(&mut self) -> Result<()> {
        let mut ingredients: Vec<String> = Vec::new();
        for item in &self.ingredients {
            let item = item.trim();
            if !item.is_empty() && !ingredients.iter().any(|i| i.eq_ignore_ascii_case(item)) {
                ingredients.push(item.to_string());
            }
        }
        if ingredients.is_empty() {
            bail!("Add at least one ingredient to generate a meal plan");
        }
        self.ingredients = ingredients;
        self.plan_name = self
            .plan_name
            .take()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.preferences.normalize()
    }
}

#[must_use]
pub fn plan_prompt(
    ingredients: &[String],
    prefs: &Preferences,
    conditions: &crate::models::UserConditions,
) -> String {
    let dietary = if prefs.dietary.is_empty() {
        "none".to_string()
    } else {
        prefs.dietary.join(", ")
    };
    format!(
        "You are a nutrition-aware meal planner for people managing diabetes and related conditions. \
Create a {days}-day meal plan with exactly {meals} meals per day using mainly these ingredients: {ingredients}. \
Dietary preferences: {dietary}. \
User conditions: diabetes={diabetes}, hypertension={hypertension}, ulcer={ulcer}, weight_loss={weight_loss}. \
Respond with JSON only, no prose, in this shape: \
{{\"days\":[{{\"day\":1,\"meals\":[{{\"title\":\"...\",\"ingredients\":[\"...\"],\"prep_minutes\":20,\"instructions\":\"...\",\"diabetic_friendly\":true}}]}}]}}",
        days = prefs.days_count,
        meals = prefs.meals_per_day,
        ingredients = ingredients.join(", "),
        diabetes = conditions.has_diabetes,
        hypertension = conditions.hypertension,
        ulcer = conditions.ulcer,
        weight_loss = conditions.weight_loss,
    )
}

#[derive(Deserialize)]
struct PlanEnvelope {
    days: Vec<DayPlan>,
}

/// Extract the JSON object from a model answer that may be wrapped in a
/// markdown code fence or surrounded by prose.
fn extract_json(answer: &str) -> Option<&str> {
    let start = answer.find('{')?;
    let end = answer.rfind('}')?;
    (end > start).then(|| &answer[start..=end])
}

/// Parse the model's plan and reshape it to the requested day and meal
/// counts. Missing slots are an error; surplus ones are dropped.
pub fn parse_plan_response(answer: &str, prefs: &Preferences) -> Result<Vec<DayPlan>> {
    let json = extract_json(answer).context("Model answer contained no JSON object")?;
    let envelope: PlanEnvelope =
        serde_json::from_str(json).context("Model answer was not a valid meal plan")?;

    let days_wanted = usize::from(prefs.days_count);
    let meals_wanted = usize::from(prefs.meals_per_day);
    if envelope.days.len() < days_wanted {
        bail!(
            "Model returned {} days, expected {days_wanted}",
            envelope.days.len()
        );
    }

    let mut days = Vec::with_capacity(days_wanted);
    for (i, mut day) in envelope.days.into_iter().take(days_wanted).enumerate() {
        day.meals.retain(|m| !m.title.trim().is_empty());
        if day.meals.len() < meals_wanted {
            bail!(
                "Model returned {} meals for day {}, expected {meals_wanted}",
                day.meals.len(),
                i + 1
            );
        }
        day.meals.truncate(meals_wanted);
        day.day = u32::try_from(i + 1).unwrap_or(u32::MAX);
        if prefs.diabetic_friendly() {
            for meal in &mut day.meals {
                meal.diabetic_friendly = true;
            }
        }
        days.push(day);
    }
    Ok(days)
}

/// Deterministic plan built straight from the ingredient list.
#[must_use]
pub fn template_plan(ingredients: &[String], prefs: &Preferences) -> Vec<DayPlan> {
    let picked: Vec<String> = ingredients.iter().take(TEMPLATE_INGREDIENTS).cloned().collect();
    (1..=u32::from(prefs.days_count))
        .map(|day| DayPlan {
            day,
            meals: (1..=u32::from(prefs.meals_per_day))
                .map(|meal| Meal {
                    title: format!("Meal {meal} - Day {day}"),
                    ingredients: picked.clone(),
                    prep_minutes: 15 + (day * 7 + meal * 11) % 30,
                    instructions: TEMPLATE_INSTRUCTIONS.to_string(),
                    diabetic_friendly: prefs.diabetic_friendly(),
                })
                .collect(),
        })
        .collect()
}
