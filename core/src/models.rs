use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Profiles ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub age: Option<i64>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub gender: Option<String>,
    pub activity_level: Option<String>,
    pub dietary_preferences: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub health_conditions: Option<Vec<String>>,
    pub monthly_budget_usd: Option<f64>,
    pub cultural_cuisine_preferences: Option<Vec<String>>,
    pub has_diabetes: bool,
    pub diabetes_type: Option<String>,
    pub target_blood_sugar_min: Option<i64>,
    pub target_blood_sugar_max: Option<i64>,
    pub primary_goal: Option<String>,
    pub secondary_goals: Option<Vec<String>>,
    pub created_at: String,
    pub updated_at: String,
}

/// Onboarding submission. Replaces every field it carries; empty lists are
/// stored as null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub age: Option<i64>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub gender: Option<String>,
    pub activity_level: Option<String>,
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub health_conditions: Vec<String>,
    pub monthly_budget_usd: Option<f64>,
    #[serde(default)]
    pub cultural_cuisine_preferences: Vec<String>,
    #[serde(default)]
    pub has_diabetes: bool,
    pub diabetes_type: Option<String>,
    pub target_blood_sugar_min: Option<i64>,
    pub target_blood_sugar_max: Option<i64>,
    pub primary_goal: Option<String>,
    #[serde(default)]
    pub secondary_goals: Vec<String>,
}

pub const GENDERS: &[&str] = &["male", "female", "other", "prefer_not_to_say"];
pub const ACTIVITY_LEVELS: &[&str] = &["sedentary", "light", "moderate", "active", "very_active"];
pub const DIABETES_TYPES: &[&str] = &["type1", "type2", "prediabetes", "gestational"];

impl ProfileUpdate {
    /// Normalize enum-like fields and list entries, then check ranges.
    ///
    /// Health conditions naming a diabetes variant turn `has_diabetes` on and
    /// fill `diabetes_type` when the caller left it empty.
    pub fn normalize(&mut self) -> Result<()> {
        self.gender = normalize_choice("gender", self.gender.take(), GENDERS)?;
        self.activity_level =
            normalize_choice("activity level", self.activity_level.take(), ACTIVITY_LEVELS)?;
        self.diabetes_type =
            normalize_choice("diabetes type", self.diabetes_type.take(), DIABETES_TYPES)?;
        self.primary_goal = self
            .primary_goal
            .take()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty());

        for list in [
            &mut self.dietary_preferences,
            &mut self.allergies,
            &mut self.health_conditions,
            &mut self.cultural_cuisine_preferences,
            &mut self.secondary_goals,
        ] {
            clean_list(list);
        }

        let (derived, derived_type) = derive_diabetes(&self.health_conditions);
        if derived {
            self.has_diabetes = true;
            if self.diabetes_type.is_none() {
                self.diabetes_type = derived_type.map(str::to_string);
            }
        }

        if let Some(age) = self.age {
            if !(1..=120).contains(&age) {
                bail!("Age must be between 1 and 120");
            }
        }
        if self.weight_kg.is_some_and(|w| w <= 0.0) {
            bail!("weight_kg must be greater than 0");
        }
        if self.height_cm.is_some_and(|h| h <= 0.0) {
            bail!("height_cm must be greater than 0");
        }
        if self.monthly_budget_usd.is_some_and(|b| b < 0.0) {
            bail!("monthly_budget_usd must not be negative");
        }
        if self.diabetes_type.is_some() && !self.has_diabetes {
            bail!("diabetes_type requires has_diabetes");
        }
        match (self.target_blood_sugar_min, self.target_blood_sugar_max) {
            (Some(min), _) if min <= 0 => bail!("Blood sugar targets must be positive"),
            (_, Some(max)) if max <= 0 => bail!("Blood sugar targets must be positive"),
            (Some(min), Some(max)) if min >= max => {
                bail!("target_blood_sugar_min must be below target_blood_sugar_max ({min} >= {max})")
            }
            _ => {}
        }
        Ok(())
    }
}

fn normalize_choice(kind: &str, value: Option<String>, allowed: &[&str]) -> Result<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => validate_choice(kind, &v, allowed).map(Some),
    }
}

fn clean_list(list: &mut Vec<String>) {
    let cleaned: Vec<String> = list
        .iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    *list = cleaned;
}

/// Split a comma-separated form field (e.g. allergies) into trimmed items.
#[must_use]
pub fn parse_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Infer diabetes status from onboarding condition labels.
#[must_use]
pub fn derive_diabetes(conditions: &[String]) -> (bool, Option<&'static str>) {
    let mut has_diabetes = false;
    let mut kind = None;
    for condition in conditions {
        let lower = condition.to_lowercase();
        if !lower.contains("diabetes") {
            continue;
        }
        has_diabetes = true;
        if kind.is_none() {
            kind = match lower.as_str() {
                "type 1 diabetes" => Some("type1"),
                "type 2 diabetes" => Some("type2"),
                "prediabetes" => Some("prediabetes"),
                "gestational diabetes" => Some("gestational"),
                _ => None,
            };
        }
    }
    (has_diabetes, kind)
}

/// Health flags fed into every assistant prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConditions {
    #[serde(rename = "hasDiabetes")]
    pub has_diabetes: bool,
    pub hypertension: bool,
    pub ulcer: bool,
    pub weight_loss: bool,
}

impl UserConditions {
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        let has_condition = |name: &str| {
            profile
                .health_conditions
                .as_deref()
                .unwrap_or_default()
                .iter()
                .any(|c| c.to_lowercase().contains(name))
        };
        let weight_loss = profile.primary_goal.as_deref() == Some("weight_loss")
            || profile
                .secondary_goals
                .as_deref()
                .unwrap_or_default()
                .iter()
                .any(|g| g == "weight_loss");

        Self {
            has_diabetes: profile.has_diabetes,
            hypertension: has_condition("hypertension"),
            ulcer: has_condition("ulcer"),
            weight_loss,
        }
    }
}

// --- Chat ---

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => bail!("Unknown message role '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: String,
}

// --- Food logs ---

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

#[derive(Debug, Clone, Serialize)]
pub struct FoodLog {
    pub id: String,
    pub user_id: String,
    pub meal_type: String,
    pub food_name: String,
    pub food_description: Option<String>,
    pub image_url: Option<String>,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub glycemic_index: Option<f64>,
    pub glycemic_load: Option<f64>,
    pub predicted_blood_sugar_spike: Option<f64>,
    pub portion_size: Option<String>,
    pub cost_usd: Option<f64>,
    pub logged_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFoodLog {
    pub meal_type: String,
    pub food_name: String,
    pub food_description: Option<String>,
    pub image_url: Option<String>,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub glycemic_index: Option<f64>,
    pub portion_size: Option<String>,
    pub cost_usd: Option<f64>,
    /// RFC 3339; defaults to now.
    pub logged_at: Option<String>,
}

impl NewFoodLog {
    pub fn normalize(&mut self) -> Result<()> {
        self.meal_type = validate_meal_type(&self.meal_type)?;
        self.food_name = self.food_name.trim().to_string();
        if self.food_name.is_empty() {
            bail!("food_name must not be empty");
        }
        let amounts = [
            ("calories", self.calories),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fat_g", self.fat_g),
            ("fiber_g", self.fiber_g),
            ("sugar_g", self.sugar_g),
            ("sodium_mg", self.sodium_mg),
            ("cost_usd", self.cost_usd),
        ];
        for (name, value) in amounts {
            if value.is_some_and(|v| v < 0.0 || !v.is_finite()) {
                bail!("{name} must be a non-negative number");
            }
        }
        if let Some(gi) = self.glycemic_index {
            if !(0.0..=100.0).contains(&gi) {
                bail!("glycemic_index must be between 0 and 100");
            }
        }
        if let Some(ref ts) = self.logged_at {
            parse_timestamp(ts)?;
        }
        Ok(())
    }

    /// Glycemic load = GI × available carbs / 100.
    #[must_use]
    pub fn glycemic_load(&self) -> Option<f64> {
        let gi = self.glycemic_index?;
        let carbs = self.carbs_g?;
        let fiber = self.fiber_g.unwrap_or(0.0);
        Some(gi * (carbs - fiber).max(0.0) / 100.0)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyTotals {
    pub date: String,
    pub entries: i64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub sodium_mg: f64,
}

// --- Blood sugar ---

pub const READING_TYPES: &[&str] = &["fasting", "before_meal", "after_meal", "bedtime", "random"];

#[derive(Debug, Clone, Serialize)]
pub struct BloodSugarReading {
    pub id: String,
    pub user_id: String,
    pub reading_mg_dl: f64,
    pub reading_type: String,
    pub notes: Option<String>,
    pub measured_at: String,
    pub created_at: String,
    /// `low`, `in_range` or `high` relative to the profile targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBloodSugarReading {
    pub reading_mg_dl: f64,
    #[serde(default = "default_reading_type")]
    pub reading_type: String,
    pub notes: Option<String>,
    pub measured_at: Option<String>,
}

fn default_reading_type() -> String {
    "random".to_string()
}

impl NewBloodSugarReading {
    pub fn normalize(&mut self) -> Result<()> {
        self.reading_type = validate_choice("reading type", &self.reading_type, READING_TYPES)?;
        if !(self.reading_mg_dl > 0.0 && self.reading_mg_dl < 1000.0) {
            bail!("reading_mg_dl must be between 0 and 1000");
        }
        if let Some(ref ts) = self.measured_at {
            parse_timestamp(ts)?;
        }
        Ok(())
    }
}

// --- Meal suggestions ---

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "hard"];

#[derive(Debug, Clone, Serialize)]
pub struct MealSuggestion {
    pub id: String,
    pub user_id: String,
    pub meal_name: String,
    pub meal_description: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Option<String>,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub estimated_cost_usd: Option<f64>,
    pub cultural_cuisine: Option<String>,
    pub prep_time_minutes: Option<i64>,
    pub difficulty: Option<String>,
    pub addresses_gaps: Option<Vec<String>>,
    pub diabetes_friendly: bool,
    pub glycemic_load: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMealSuggestion {
    pub meal_name: String,
    pub meal_description: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    pub instructions: Option<String>,
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub estimated_cost_usd: Option<f64>,
    pub cultural_cuisine: Option<String>,
    pub prep_time_minutes: Option<i64>,
    pub difficulty: Option<String>,
    #[serde(default)]
    pub addresses_gaps: Vec<String>,
    #[serde(default)]
    pub diabetes_friendly: bool,
    pub glycemic_load: Option<f64>,
}

impl NewMealSuggestion {
    pub fn normalize(&mut self) -> Result<()> {
        self.meal_name = self.meal_name.trim().to_string();
        if self.meal_name.is_empty() {
            bail!("meal_name must not be empty");
        }
        self.difficulty = normalize_choice("difficulty", self.difficulty.take(), DIFFICULTIES)?;
        clean_list(&mut self.ingredients);
        clean_list(&mut self.addresses_gaps);
        if self.prep_time_minutes.is_some_and(|m| m < 0) {
            bail!("prep_time_minutes must not be negative");
        }
        Ok(())
    }
}

// --- Nutritional gaps ---

pub const SEVERITIES: &[&str] = &["low", "moderate", "high"];

#[derive(Debug, Clone, Serialize)]
pub struct NutritionalGap {
    pub id: String,
    pub user_id: String,
    pub nutrient_name: String,
    pub current_intake: f64,
    pub recommended_intake: f64,
    pub unit: String,
    pub severity: String,
    pub analysis_date: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNutritionalGap {
    pub nutrient_name: String,
    pub current_intake: f64,
    pub recommended_intake: f64,
    pub unit: String,
    /// Derived from the intake ratio when omitted.
    pub severity: Option<String>,
    /// YYYY-MM-DD; defaults to today.
    pub analysis_date: Option<String>,
}

impl NewNutritionalGap {
    pub fn normalize(&mut self) -> Result<()> {
        self.nutrient_name = self.nutrient_name.trim().to_string();
        if self.nutrient_name.is_empty() {
            bail!("nutrient_name must not be empty");
        }
        if self.current_intake < 0.0 || self.recommended_intake <= 0.0 {
            bail!("Intake values must be positive");
        }
        self.severity = match self.severity.take() {
            Some(s) => Some(validate_choice("severity", &s, SEVERITIES)?),
            None => Some(gap_severity(self.current_intake, self.recommended_intake).to_string()),
        };
        if let Some(ref date) = self.analysis_date {
            chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid analysis_date '{date}'. Use YYYY-MM-DD"))?;
        }
        Ok(())
    }
}

/// Severity of a shortfall: below half the recommendation is high, below
/// 80% moderate, anything else low.
#[must_use]
pub fn gap_severity(current: f64, recommended: f64) -> &'static str {
    let ratio = current / recommended;
    if ratio < 0.5 {
        "high"
    } else if ratio < 0.8 {
        "moderate"
    } else {
        "low"
    }
}

// --- Validation helpers ---

pub fn validate_choice(kind: &str, value: &str, allowed: &[&str]) -> Result<String> {
    let lower = value.trim().to_lowercase();
    if allowed.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!("Invalid {kind} '{value}'. Must be one of: {}", allowed.join(", "))
    }
}

pub fn validate_meal_type(meal: &str) -> Result<String> {
    validate_choice("meal type", meal, MEAL_TYPES)
}

/// Accept a caller-supplied user id only if it is a UUID; returns the
/// canonical hyphenated form.
pub fn validate_user_id(id: &str) -> Result<String> {
    let parsed = Uuid::parse_str(id.trim()).with_context(|| format!("Invalid user id '{id}'"))?;
    Ok(parsed.hyphenated().to_string())
}

pub fn parse_timestamp(ts: &str) -> Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Local))
        .with_context(|| format!("Invalid timestamp '{ts}'. Use RFC 3339"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4().to_string(),
            email: "ada@example.com".to_string(),
            full_name: Some("Ada".to_string()),
            age: None,
            weight_kg: None,
            height_cm: None,
            gender: None,
            activity_level: None,
            dietary_preferences: None,
            allergies: None,
            health_conditions: None,
            monthly_budget_usd: None,
            cultural_cuisine_preferences: None,
            has_diabetes: false,
            diabetes_type: None,
            target_blood_sugar_min: None,
            target_blood_sugar_max: None,
            primary_goal: None,
            secondary_goals: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_user_conditions_json_shape() {
        let conditions = UserConditions {
            has_diabetes: true,
            hypertension: false,
            ulcer: true,
            weight_loss: false,
        };
        let json = serde_json::to_string(&conditions).unwrap();
        assert_eq!(
            json,
            r#"{"hasDiabetes":true,"hypertension":false,"ulcer":true,"weight_loss":false}"#
        );
    }

    #[test]
    fn test_user_conditions_from_profile() {
        let mut p = profile();
        p.has_diabetes = true;
        p.health_conditions = Some(vec!["Hypertension".to_string(), "Asthma".to_string()]);
        p.secondary_goals = Some(vec!["weight_loss".to_string()]);

        let c = UserConditions::from_profile(&p);
        assert!(c.has_diabetes);
        assert!(c.hypertension);
        assert!(!c.ulcer);
        assert!(c.weight_loss);
    }

    #[test]
    fn test_user_conditions_primary_goal() {
        let mut p = profile();
        p.primary_goal = Some("weight_loss".to_string());
        assert!(UserConditions::from_profile(&p).weight_loss);

        p.primary_goal = Some("muscle_gain".to_string());
        assert!(!UserConditions::from_profile(&p).weight_loss);
    }

    #[test]
    fn test_derive_diabetes() {
        let conditions = vec!["Type 2 Diabetes".to_string(), "Ulcer".to_string()];
        assert_eq!(derive_diabetes(&conditions), (true, Some("type2")));

        let conditions = vec!["Prediabetes".to_string()];
        assert_eq!(derive_diabetes(&conditions), (true, Some("prediabetes")));

        let conditions = vec!["Hypertension".to_string()];
        assert_eq!(derive_diabetes(&conditions), (false, None));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" peanuts, shellfish ,,"), vec!["peanuts", "shellfish"]);
        assert!(parse_list("  ").is_empty());
    }

    #[test]
    fn test_profile_update_normalize() {
        let mut update = ProfileUpdate {
            gender: Some("Female".to_string()),
            activity_level: Some(String::new()),
            health_conditions: vec!["Type 1 Diabetes".to_string(), " ".to_string()],
            allergies: vec![" nuts ".to_string()],
            target_blood_sugar_min: Some(70),
            target_blood_sugar_max: Some(140),
            ..ProfileUpdate::default()
        };
        update.normalize().unwrap();
        assert_eq!(update.gender.as_deref(), Some("female"));
        assert!(update.activity_level.is_none());
        assert_eq!(update.health_conditions, vec!["Type 1 Diabetes"]);
        assert_eq!(update.allergies, vec!["nuts"]);
        assert!(update.has_diabetes);
        assert_eq!(update.diabetes_type.as_deref(), Some("type1"));
    }

    #[test]
    fn test_profile_update_rejects_bad_values() {
        let mut update = ProfileUpdate {
            gender: Some("robot".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(update.normalize().is_err());

        let mut update = ProfileUpdate {
            target_blood_sugar_min: Some(180),
            target_blood_sugar_max: Some(70),
            ..ProfileUpdate::default()
        };
        assert!(update.normalize().is_err());

        let mut update = ProfileUpdate {
            diabetes_type: Some("type2".to_string()),
            ..ProfileUpdate::default()
        };
        assert!(update.normalize().is_err());

        let mut update = ProfileUpdate {
            age: Some(0),
            ..ProfileUpdate::default()
        };
        assert!(update.normalize().is_err());
    }

    #[test]
    fn test_validate_user_id() {
        let id = Uuid::new_v4();
        let upper = id.to_string().to_uppercase();
        assert_eq!(validate_user_id(&upper).unwrap(), id.to_string());
        assert!(validate_user_id("demo-user").is_err());
        assert!(validate_user_id("").is_err());
    }

    #[test]
    fn test_validate_meal_type() {
        assert_eq!(validate_meal_type("Lunch").unwrap(), "lunch");
        assert!(validate_meal_type("brunch").is_err());
    }

    #[test]
    fn test_food_log_normalize_and_glycemic_load() {
        let mut log = NewFoodLog {
            meal_type: "DINNER".to_string(),
            food_name: "  Jollof Rice ".to_string(),
            carbs_g: Some(50.0),
            fiber_g: Some(2.0),
            glycemic_index: Some(70.0),
            ..NewFoodLog::default()
        };
        log.normalize().unwrap();
        assert_eq!(log.meal_type, "dinner");
        assert_eq!(log.food_name, "Jollof Rice");
        let gl = log.glycemic_load().unwrap();
        assert!((gl - 33.6).abs() < 1e-9);

        let mut bad = NewFoodLog {
            meal_type: "snack".to_string(),
            food_name: "Chips".to_string(),
            calories: Some(-5.0),
            ..NewFoodLog::default()
        };
        assert!(bad.normalize().is_err());
    }

    #[test]
    fn test_blood_sugar_reading_normalize() {
        let mut reading = NewBloodSugarReading {
            reading_mg_dl: 110.0,
            reading_type: "Fasting".to_string(),
            notes: None,
            measured_at: Some("2025-03-01T08:00:00+00:00".to_string()),
        };
        reading.normalize().unwrap();
        assert_eq!(reading.reading_type, "fasting");

        reading.reading_mg_dl = 0.0;
        assert!(reading.normalize().is_err());
    }

    #[test]
    fn test_gap_severity() {
        assert_eq!(gap_severity(10.0, 30.0), "high");
        assert_eq!(gap_severity(20.0, 30.0), "moderate");
        assert_eq!(gap_severity(28.0, 30.0), "low");
    }

    #[test]
    fn test_nutritional_gap_defaults_severity() {
        let mut gap = NewNutritionalGap {
            nutrient_name: "Fiber".to_string(),
            current_intake: 12.0,
            recommended_intake: 30.0,
            unit: "g".to_string(),
            severity: None,
            analysis_date: None,
        };
        gap.normalize().unwrap();
        assert_eq!(gap.severity.as_deref(), Some("high"));
    }

    #[test]
    fn test_role_roundtrip() {
        assert_eq!(Role::parse("user").unwrap(), Role::User);
        assert_eq!(Role::Assistant.as_str(), "assistant");
        assert!(Role::parse("system").is_err());
    }
}
