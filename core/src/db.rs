use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, SecondsFormat};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::diary::{
    DiarySettings, Goal, HealthLog, HealthMetrics, Mood, TimelineEntry, TrackingFrequency,
    build_timeline,
};
use crate::models::{
    BloodSugarReading, Conversation, DailyTotals, FoodLog, MealSuggestion, Message,
    NewBloodSugarReading, NewFoodLog, NewMealSuggestion, NewNutritionalGap, NutritionalGap,
    Profile, ProfileUpdate, Role,
};
use crate::planner::{DayPlan, MealPlan, Preferences};

pub struct Database {
    conn: Connection,
}

fn timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lists are stored as JSON text; an empty list is stored as NULL.
fn list_to_sql(list: &[String]) -> Result<Option<String>> {
    if list.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(list)?))
}

fn list_from_sql(row: &Row, idx: usize) -> rusqlite::Result<Option<Vec<String>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn text_enum_from_sql<T>(
    row: &Row,
    idx: usize,
    parse: impl Fn(&str) -> Result<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

const PROFILE_COLUMNS: &str = "id, email, full_name, age, weight_kg, height_cm, gender, activity_level,
    dietary_preferences, allergies, health_conditions, monthly_budget_usd,
    cultural_cuisine_preferences, has_diabetes, diabetes_type, target_blood_sugar_min,
    target_blood_sugar_max, primary_goal, secondary_goals, created_at, updated_at";

const FOOD_LOG_COLUMNS: &str = "id, user_id, meal_type, food_name, food_description, image_url,
    calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg, glycemic_index,
    glycemic_load, predicted_blood_sugar_spike, portion_size, cost_usd, logged_at, created_at";

const MEAL_SUGGESTION_COLUMNS: &str = "id, user_id, meal_name, meal_description, ingredients,
    instructions, calories, protein_g, carbs_g, fat_g, estimated_cost_usd, cultural_cuisine,
    prep_time_minutes, difficulty, addresses_gaps, diabetes_friendly, glycemic_load, created_at";

/// Rough post-meal rise in mg/dL per unit of glycemic load.
const SPIKE_PER_GLYCEMIC_LOAD: f64 = 3.0;

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    #[allow(clippy::too_many_lines)]
    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE,
                    full_name TEXT,
                    age INTEGER,
                    weight_kg REAL,
                    height_cm REAL,
                    gender TEXT,
                    activity_level TEXT,
                    dietary_preferences TEXT,
                    allergies TEXT,
                    health_conditions TEXT,
                    monthly_budget_usd REAL,
                    cultural_cuisine_preferences TEXT,
                    has_diabetes INTEGER NOT NULL DEFAULT 0,
                    diabetes_type TEXT,
                    target_blood_sugar_min INTEGER,
                    target_blood_sugar_max INTEGER,
                    primary_goal TEXT,
                    secondary_goals TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS conversations (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL UNIQUE REFERENCES profiles(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                    content TEXT NOT NULL,
                    image_url TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_logs (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    meal_type TEXT NOT NULL,
                    food_name TEXT NOT NULL,
                    food_description TEXT,
                    image_url TEXT,
                    calories REAL,
                    protein_g REAL,
                    carbs_g REAL,
                    fat_g REAL,
                    fiber_g REAL,
                    sugar_g REAL,
                    sodium_mg REAL,
                    glycemic_index REAL,
                    glycemic_load REAL,
                    predicted_blood_sugar_spike REAL,
                    portion_size TEXT,
                    cost_usd REAL,
                    log_date TEXT NOT NULL,
                    logged_at TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS blood_sugar_readings (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    reading_mg_dl REAL NOT NULL,
                    reading_type TEXT NOT NULL,
                    notes TEXT,
                    measured_at TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_suggestions (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    meal_name TEXT NOT NULL,
                    meal_description TEXT,
                    ingredients TEXT NOT NULL,
                    instructions TEXT,
                    calories REAL,
                    protein_g REAL,
                    carbs_g REAL,
                    fat_g REAL,
                    estimated_cost_usd REAL,
                    cultural_cuisine TEXT,
                    prep_time_minutes INTEGER,
                    difficulty TEXT,
                    addresses_gaps TEXT,
                    diabetes_friendly INTEGER NOT NULL DEFAULT 0,
                    glycemic_load REAL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS nutritional_gaps (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    nutrient_name TEXT NOT NULL,
                    current_intake REAL NOT NULL,
                    recommended_intake REAL NOT NULL,
                    unit TEXT NOT NULL,
                    severity TEXT NOT NULL,
                    analysis_date TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_food_logs_user_date ON food_logs(user_id, log_date);
                CREATE INDEX IF NOT EXISTS idx_blood_sugar_user ON blood_sugar_readings(user_id, measured_at);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS diary_settings (
                    user_id TEXT PRIMARY KEY REFERENCES profiles(id) ON DELETE CASCADE,
                    goal TEXT NOT NULL,
                    tracking_frequency TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS health_logs (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    weight_kg REAL NOT NULL,
                    blood_sugar_mg_dl REAL NOT NULL,
                    systolic INTEGER NOT NULL,
                    diastolic INTEGER NOT NULL,
                    mood TEXT NOT NULL,
                    logged_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_plans (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                    plan_name TEXT NOT NULL,
                    preferences TEXT NOT NULL,
                    ingredients TEXT NOT NULL,
                    days TEXT NOT NULL,
                    source TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_health_logs_user ON health_logs(user_id, logged_at);
                CREATE INDEX IF NOT EXISTS idx_meal_plans_user ON meal_plans(user_id, created_at);

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Profiles ---

    fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            age: row.get(3)?,
            weight_kg: row.get(4)?,
            height_cm: row.get(5)?,
            gender: row.get(6)?,
            activity_level: row.get(7)?,
            dietary_preferences: list_from_sql(row, 8)?,
            allergies: list_from_sql(row, 9)?,
            health_conditions: list_from_sql(row, 10)?,
            monthly_budget_usd: row.get(11)?,
            cultural_cuisine_preferences: list_from_sql(row, 12)?,
            has_diabetes: row.get(13)?,
            diabetes_type: row.get(14)?,
            target_blood_sugar_min: row.get(15)?,
            target_blood_sugar_max: row.get(16)?,
            primary_goal: row.get(17)?,
            secondary_goals: list_from_sql(row, 18)?,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
        })
    }

    pub fn create_profile(&self, email: &str, full_name: Option<&str>) -> Result<Profile> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            bail!("Invalid email '{email}'");
        }
        let now = timestamp();
        let id = new_id();
        self.conn
            .execute(
                "INSERT INTO profiles (id, email, full_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, email, full_name, now, now],
            )
            .with_context(|| format!("Failed to create profile for {email}"))?;
        self.get_profile(&id)?.context("Profile not found after insert")
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
                params![id],
                Self::profile_from_row,
            )
            .optional()
            .context("Failed to load profile")
    }

    pub fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        self.conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = ?1"),
                params![email.trim().to_lowercase()],
                Self::profile_from_row,
            )
            .optional()
            .context("Failed to look up profile by email")
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at"
        ))?;
        let profiles = stmt
            .query_map([], Self::profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    /// Apply an onboarding submission. The update must already be normalized.
    pub fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Profile> {
        let rows = self.conn.execute(
            "UPDATE profiles SET
                age = ?1, weight_kg = ?2, height_cm = ?3, gender = ?4, activity_level = ?5,
                dietary_preferences = ?6, allergies = ?7, health_conditions = ?8,
                monthly_budget_usd = ?9, cultural_cuisine_preferences = ?10, has_diabetes = ?11,
                diabetes_type = ?12, target_blood_sugar_min = ?13, target_blood_sugar_max = ?14,
                primary_goal = ?15, secondary_goals = ?16, updated_at = ?17
             WHERE id = ?18",
            params![
                update.age,
                update.weight_kg,
                update.height_cm,
                update.gender,
                update.activity_level,
                list_to_sql(&update.dietary_preferences)?,
                list_to_sql(&update.allergies)?,
                list_to_sql(&update.health_conditions)?,
                update.monthly_budget_usd,
                list_to_sql(&update.cultural_cuisine_preferences)?,
                update.has_diabetes,
                update.diabetes_type,
                update.target_blood_sugar_min,
                update.target_blood_sugar_max,
                update.primary_goal,
                list_to_sql(&update.secondary_goals)?,
                timestamp(),
                id,
            ],
        )?;
        if rows == 0 {
            bail!("Profile {id} not found");
        }
        self.get_profile(id)?.context("Profile not found after update")
    }

    // --- Conversations & messages ---

    pub fn get_conversation(&self, user_id: &str) -> Result<Option<Conversation>> {
        self.conn
            .query_row(
                "SELECT id, user_id, created_at FROM conversations WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to load conversation")
    }

    /// Each user has a single conversation; create it on first use.
    pub fn get_or_create_conversation(&self, user_id: &str) -> Result<Conversation> {
        if let Some(existing) = self.get_conversation(user_id)? {
            return Ok(existing);
        }
        self.conn
            .execute(
                "INSERT INTO conversations (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![new_id(), user_id, timestamp()],
            )
            .context("Failed to create conversation")?;
        self.get_conversation(user_id)?
            .context("Conversation not found after insert")
    }

    pub fn insert_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Message> {
        let message = Message {
            id: new_id(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            image_url: image_url.map(str::to_string),
            created_at: timestamp(),
        };
        self.conn
            .execute(
                "INSERT INTO messages (id, conversation_id, role, content, image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.id,
                    message.conversation_id,
                    message.role.as_str(),
                    message.content,
                    message.image_url,
                    message.created_at,
                ],
            )
            .with_context(|| format!("Failed to insert {} message", role.as_str()))?;
        Ok(message)
    }

    pub fn get_conversation_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, conversation_id, role, content, image_url, created_at
             FROM messages WHERE conversation_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let messages = stmt
            .query_map(params![conversation_id], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role: text_enum_from_sql(row, 2, Role::parse)?,
                    content: row.get(3)?,
                    image_url: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    // --- Food logs ---

    fn food_log_from_row(row: &Row) -> rusqlite::Result<FoodLog> {
        Ok(FoodLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            meal_type: row.get(2)?,
            food_name: row.get(3)?,
            food_description: row.get(4)?,
            image_url: row.get(5)?,
            calories: row.get(6)?,
            protein_g: row.get(7)?,
            carbs_g: row.get(8)?,
            fat_g: row.get(9)?,
            fiber_g: row.get(10)?,
            sugar_g: row.get(11)?,
            sodium_mg: row.get(12)?,
            glycemic_index: row.get(13)?,
            glycemic_load: row.get(14)?,
            predicted_blood_sugar_spike: row.get(15)?,
            portion_size: row.get(16)?,
            cost_usd: row.get(17)?,
            logged_at: row.get(18)?,
            created_at: row.get(19)?,
        })
    }

    /// Insert a normalized food log. Glycemic load and the predicted spike
    /// are derived when GI and carbs are known.
    pub fn insert_food_log(&self, user_id: &str, log: &NewFoodLog) -> Result<FoodLog> {
        let now = Local::now();
        let logged_at = match log.logged_at {
            Some(ref ts) => crate::models::parse_timestamp(ts)?,
            None => now,
        };
        let glycemic_load = log.glycemic_load();
        let spike = glycemic_load.map(|gl| gl * SPIKE_PER_GLYCEMIC_LOAD);
        let id = new_id();

        self.conn.execute(
            &format!(
                "INSERT INTO food_logs ({FOOD_LOG_COLUMNS}, log_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
            ),
            params![
                id,
                user_id,
                log.meal_type,
                log.food_name,
                log.food_description,
                log.image_url,
                log.calories,
                log.protein_g,
                log.carbs_g,
                log.fat_g,
                log.fiber_g,
                log.sugar_g,
                log.sodium_mg,
                log.glycemic_index,
                glycemic_load,
                spike,
                log.portion_size,
                log.cost_usd,
                logged_at.to_rfc3339_opts(SecondsFormat::Micros, false),
                now.to_rfc3339_opts(SecondsFormat::Micros, false),
                logged_at.date_naive().format("%Y-%m-%d").to_string(),
            ],
        )?;

        self.conn
            .query_row(
                &format!("SELECT {FOOD_LOG_COLUMNS} FROM food_logs WHERE id = ?1"),
                params![id],
                Self::food_log_from_row,
            )
            .context("Food log not found after insert")
    }

    pub fn get_food_logs_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<FoodLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_LOG_COLUMNS} FROM food_logs
             WHERE user_id = ?1 AND log_date = ?2
             ORDER BY logged_at, rowid"
        ))?;
        let logs = stmt
            .query_map(
                params![user_id, date.format("%Y-%m-%d").to_string()],
                Self::food_log_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    pub fn get_recent_food_logs(&self, user_id: &str, limit: i64) -> Result<Vec<FoodLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_LOG_COLUMNS} FROM food_logs
             WHERE user_id = ?1
             ORDER BY logged_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let logs = stmt
            .query_map(params![user_id, limit], Self::food_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    pub fn delete_food_log(&self, user_id: &str, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM food_logs WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn daily_totals(&self, user_id: &str, date: NaiveDate) -> Result<DailyTotals> {
        let date_str = date.format("%Y-%m-%d").to_string();
        self.conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(calories), 0), COALESCE(SUM(protein_g), 0),
                        COALESCE(SUM(carbs_g), 0), COALESCE(SUM(fat_g), 0),
                        COALESCE(SUM(fiber_g), 0), COALESCE(SUM(sugar_g), 0),
                        COALESCE(SUM(sodium_mg), 0)
                 FROM food_logs WHERE user_id = ?1 AND log_date = ?2",
                params![user_id, date_str],
                |row| {
                    Ok(DailyTotals {
                        date: date_str.clone(),
                        entries: row.get(0)?,
                        calories: row.get(1)?,
                        protein_g: row.get(2)?,
                        carbs_g: row.get(3)?,
                        fat_g: row.get(4)?,
                        fiber_g: row.get(5)?,
                        sugar_g: row.get(6)?,
                        sodium_mg: row.get(7)?,
                    })
                },
            )
            .context("Failed to compute daily totals")
    }

    // --- Blood sugar ---

    fn reading_from_row(row: &Row) -> rusqlite::Result<BloodSugarReading> {
        Ok(BloodSugarReading {
            id: row.get(0)?,
            user_id: row.get(1)?,
            reading_mg_dl: row.get(2)?,
            reading_type: row.get(3)?,
            notes: row.get(4)?,
            measured_at: row.get(5)?,
            created_at: row.get(6)?,
            status: None,
        })
    }

    pub fn insert_blood_sugar(
        &self,
        user_id: &str,
        reading: &NewBloodSugarReading,
    ) -> Result<BloodSugarReading> {
        let now = timestamp();
        let measured_at = match reading.measured_at {
            Some(ref ts) => crate::models::parse_timestamp(ts)?
                .to_rfc3339_opts(SecondsFormat::Micros, false),
            None => now.clone(),
        };
        let id = new_id();
        self.conn.execute(
            "INSERT INTO blood_sugar_readings (id, user_id, reading_mg_dl, reading_type, notes, measured_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                user_id,
                reading.reading_mg_dl,
                reading.reading_type,
                reading.notes,
                measured_at,
                now
            ],
        )?;
        self.conn
            .query_row(
                "SELECT id, user_id, reading_mg_dl, reading_type, notes, measured_at, created_at
                 FROM blood_sugar_readings WHERE id = ?1",
                params![id],
                Self::reading_from_row,
            )
            .context("Reading not found after insert")
    }

    pub fn get_blood_sugar_history(&self, user_id: &str, limit: i64) -> Result<Vec<BloodSugarReading>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, reading_mg_dl, reading_type, notes, measured_at, created_at
             FROM blood_sugar_readings WHERE user_id = ?1
             ORDER BY measured_at DESC, rowid DESC LIMIT ?2",
        )?;
        let readings = stmt
            .query_map(params![user_id, limit], Self::reading_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    pub fn delete_blood_sugar(&self, user_id: &str, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM blood_sugar_readings WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // --- Meal suggestions ---

    fn meal_suggestion_from_row(row: &Row) -> rusqlite::Result<MealSuggestion> {
        Ok(MealSuggestion {
            id: row.get(0)?,
            user_id: row.get(1)?,
            meal_name: row.get(2)?,
            meal_description: row.get(3)?,
            ingredients: list_from_sql(row, 4)?.unwrap_or_default(),
            instructions: row.get(5)?,
            calories: row.get(6)?,
            protein_g: row.get(7)?,
            carbs_g: row.get(8)?,
            fat_g: row.get(9)?,
            estimated_cost_usd: row.get(10)?,
            cultural_cuisine: row.get(11)?,
            prep_time_minutes: row.get(12)?,
            difficulty: row.get(13)?,
            addresses_gaps: list_from_sql(row, 14)?,
            diabetes_friendly: row.get(15)?,
            glycemic_load: row.get(16)?,
            created_at: row.get(17)?,
        })
    }

    pub fn insert_meal_suggestion(
        &self,
        user_id: &str,
        suggestion: &NewMealSuggestion,
    ) -> Result<MealSuggestion> {
        let id = new_id();
        self.conn.execute(
            &format!(
                "INSERT INTO meal_suggestions ({MEAL_SUGGESTION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ),
            params![
                id,
                user_id,
                suggestion.meal_name,
                suggestion.meal_description,
                serde_json::to_string(&suggestion.ingredients)?,
                suggestion.instructions,
                suggestion.calories,
                suggestion.protein_g,
                suggestion.carbs_g,
                suggestion.fat_g,
                suggestion.estimated_cost_usd,
                suggestion.cultural_cuisine,
                suggestion.prep_time_minutes,
                suggestion.difficulty,
                list_to_sql(&suggestion.addresses_gaps)?,
                suggestion.diabetes_friendly,
                suggestion.glycemic_load,
                timestamp(),
            ],
        )?;
        self.conn
            .query_row(
                &format!("SELECT {MEAL_SUGGESTION_COLUMNS} FROM meal_suggestions WHERE id = ?1"),
                params![id],
                Self::meal_suggestion_from_row,
            )
            .context("Meal suggestion not found after insert")
    }

    pub fn list_meal_suggestions(&self, user_id: &str) -> Result<Vec<MealSuggestion>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_SUGGESTION_COLUMNS} FROM meal_suggestions
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let suggestions = stmt
            .query_map(params![user_id], Self::meal_suggestion_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(suggestions)
    }

    // --- Nutritional gaps ---

    fn gap_from_row(row: &Row) -> rusqlite::Result<NutritionalGap> {
        Ok(NutritionalGap {
            id: row.get(0)?,
            user_id: row.get(1)?,
            nutrient_name: row.get(2)?,
            current_intake: row.get(3)?,
            recommended_intake: row.get(4)?,
            unit: row.get(5)?,
            severity: row.get(6)?,
            analysis_date: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    /// Insert a normalized gap (severity already resolved).
    pub fn insert_nutritional_gap(&self, user_id: &str, gap: &NewNutritionalGap) -> Result<NutritionalGap> {
        let id = new_id();
        let severity = gap.severity.as_deref().unwrap_or("low");
        let analysis_date = gap
            .analysis_date
            .clone()
            .unwrap_or_else(|| Local::now().date_naive().format("%Y-%m-%d").to_string());
        self.conn.execute(
            "INSERT INTO nutritional_gaps (id, user_id, nutrient_name, current_intake, recommended_intake, unit, severity, analysis_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                user_id,
                gap.nutrient_name,
                gap.current_intake,
                gap.recommended_intake,
                gap.unit,
                severity,
                analysis_date,
                timestamp(),
            ],
        )?;
        self.conn
            .query_row(
                "SELECT id, user_id, nutrient_name, current_intake, recommended_intake, unit, severity, analysis_date, created_at
                 FROM nutritional_gaps WHERE id = ?1",
                params![id],
                Self::gap_from_row,
            )
            .context("Nutritional gap not found after insert")
    }

    pub fn list_nutritional_gaps(&self, user_id: &str) -> Result<Vec<NutritionalGap>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, nutrient_name, current_intake, recommended_intake, unit, severity, analysis_date, created_at
             FROM nutritional_gaps WHERE user_id = ?1
             ORDER BY analysis_date DESC, rowid DESC",
        )?;
        let gaps = stmt
            .query_map(params![user_id], Self::gap_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(gaps)
    }

    // --- Health diary ---

    pub fn upsert_diary_settings(
        &self,
        user_id: &str,
        goal: Goal,
        frequency: TrackingFrequency,
    ) -> Result<DiarySettings> {
        self.conn.execute(
            "INSERT INTO diary_settings (user_id, goal, tracking_frequency, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                goal = excluded.goal,
                tracking_frequency = excluded.tracking_frequency,
                updated_at = excluded.updated_at",
            params![user_id, goal.as_str(), frequency.as_str(), timestamp()],
        )?;
        self.get_diary_settings(user_id)?
            .context("Diary settings not found after upsert")
    }

    pub fn get_diary_settings(&self, user_id: &str) -> Result<Option<DiarySettings>> {
        self.conn
            .query_row(
                "SELECT goal, tracking_frequency, updated_at FROM diary_settings WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(DiarySettings {
                        goal: text_enum_from_sql(row, 0, Goal::parse)?,
                        tracking_frequency: text_enum_from_sql(row, 1, TrackingFrequency::parse)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to load diary settings")
    }

    fn health_log_from_row(row: &Row) -> rusqlite::Result<HealthLog> {
        Ok(HealthLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            weight_kg: row.get(2)?,
            blood_sugar_mg_dl: row.get(3)?,
            systolic: row.get(4)?,
            diastolic: row.get(5)?,
            mood: text_enum_from_sql(row, 6, Mood::parse)?,
            logged_at: row.get(7)?,
        })
    }

    pub fn insert_health_log(&self, user_id: &str, metrics: &HealthMetrics) -> Result<HealthLog> {
        let log = HealthLog {
            id: new_id(),
            user_id: user_id.to_string(),
            weight_kg: metrics.weight_kg,
            blood_sugar_mg_dl: metrics.blood_sugar_mg_dl,
            systolic: metrics.systolic,
            diastolic: metrics.diastolic,
            mood: metrics.mood,
            logged_at: timestamp(),
        };
        self.conn.execute(
            "INSERT INTO health_logs (id, user_id, weight_kg, blood_sugar_mg_dl, systolic, diastolic, mood, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                log.id,
                log.user_id,
                log.weight_kg,
                log.blood_sugar_mg_dl,
                log.systolic,
                log.diastolic,
                log.mood.as_str(),
                log.logged_at,
            ],
        )?;
        Ok(log)
    }

    /// Newest first.
    pub fn get_health_logs(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<HealthLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, weight_kg, blood_sugar_mg_dl, systolic, diastolic, mood, logged_at
             FROM health_logs WHERE user_id = ?1
             ORDER BY logged_at DESC, rowid DESC LIMIT ?2",
        )?;
        let logs = stmt
            .query_map(params![user_id, limit.unwrap_or(-1)], Self::health_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    /// Diary timeline, newest first. One log past `limit` is read so the
    /// oldest entry shown still has a trend.
    pub fn health_timeline(
        &self,
        user_id: &str,
        limit: Option<i64>,
        now: DateTime<Local>,
    ) -> Result<Vec<TimelineEntry>> {
        if limit.is_some_and(|n| n <= 0) {
            bail!("limit must be positive");
        }
        let goal = self.get_diary_settings(user_id)?.map(|s| s.goal);
        let logs = self.get_health_logs(user_id, limit.map(|n| n.saturating_add(1)))?;
        let keep = limit.map(|n| usize::try_from(n).unwrap_or(usize::MAX));
        Ok(build_timeline(logs, goal, now, keep))
    }

    // --- Meal plans ---

    fn meal_plan_from_row(row: &Row) -> rusqlite::Result<MealPlan> {
        fn json_col<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
            let raw: String = row.get(idx)?;
            serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            })
        }

        Ok(MealPlan {
            id: row.get(0)?,
            user_id: row.get(1)?,
            plan_name: row.get(2)?,
            preferences: json_col::<Preferences>(row, 3)?,
            ingredients: json_col::<Vec<String>>(row, 4)?,
            days: json_col::<Vec<DayPlan>>(row, 5)?,
            source: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    pub fn save_meal_plan(
        &self,
        user_id: &str,
        plan_name: &str,
        preferences: &Preferences,
        ingredients: &[String],
        days: &[DayPlan],
        source: &str,
    ) -> Result<MealPlan> {
        let id = new_id();
        self.conn.execute(
            "INSERT INTO meal_plans (id, user_id, plan_name, preferences, ingredients, days, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                user_id,
                plan_name,
                serde_json::to_string(preferences)?,
                serde_json::to_string(ingredients)?,
                serde_json::to_string(days)?,
                source,
                timestamp(),
            ],
        )?;
        self.get_meal_plan(user_id, &id)?
            .context("Meal plan not found after insert")
    }

    pub fn get_meal_plan(&self, user_id: &str, id: &str) -> Result<Option<MealPlan>> {
        self.conn
            .query_row(
                "SELECT id, user_id, plan_name, preferences, ingredients, days, source, created_at
                 FROM meal_plans WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                Self::meal_plan_from_row,
            )
            .optional()
            .context("Failed to load meal plan")
    }

    pub fn list_meal_plans(&self, user_id: &str) -> Result<Vec<MealPlan>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, plan_name, preferences, ingredients, days, source, created_at
             FROM meal_plans WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let plans = stmt
            .query_map(params![user_id], Self::meal_plan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    pub fn delete_meal_plan(&self, user_id: &str, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM meal_plans WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diary::Trend;
    use crate::planner::{MealMode, template_plan};

    fn db_with_profile() -> (Database, Profile) {
        let db = Database::open_in_memory().unwrap();
        let profile = db.create_profile("Ada@Example.com", Some("Ada")).unwrap();
        (db, profile)
    }

    #[test]
    fn test_create_and_get_profile() {
        let (db, profile) = db_with_profile();
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.full_name.as_deref(), Some("Ada"));
        assert!(!profile.has_diabetes);
        assert!(profile.dietary_preferences.is_none());

        let fetched = db.get_profile(&profile.id).unwrap().unwrap();
        assert_eq!(fetched.id, profile.id);
        let by_email = db.find_profile_by_email(" ADA@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, profile.id);
        assert_eq!(db.list_profiles().unwrap().len(), 1);
        assert!(db.get_profile(&new_id()).unwrap().is_none());
    }

    #[test]
    fn test_create_profile_rejects_duplicate_email() {
        let (db, _) = db_with_profile();
        assert!(db.create_profile("ada@example.com", None).is_err());
        assert!(db.create_profile("not-an-email", None).is_err());
    }

    #[test]
    fn test_update_profile_persists_selected_lists() {
        let (db, profile) = db_with_profile();
        let mut update = ProfileUpdate {
            age: Some(42),
            weight_kg: Some(80.5),
            gender: Some("female".to_string()),
            dietary_preferences: vec!["vegetarian".to_string(), "low-carb".to_string()],
            allergies: Vec::new(),
            health_conditions: vec!["Type 2 Diabetes".to_string(), "Hypertension".to_string()],
            cultural_cuisine_preferences: vec!["Nigerian".to_string()],
            target_blood_sugar_min: Some(70),
            target_blood_sugar_max: Some(140),
            ..ProfileUpdate::default()
        };
        update.normalize().unwrap();
        let updated = db.update_profile(&profile.id, &update).unwrap();

        assert_eq!(updated.age, Some(42));
        assert_eq!(
            updated.dietary_preferences,
            Some(vec!["vegetarian".to_string(), "low-carb".to_string()])
        );
        assert!(updated.allergies.is_none());
        assert_eq!(
            updated.health_conditions,
            Some(vec!["Type 2 Diabetes".to_string(), "Hypertension".to_string()])
        );
        assert!(updated.has_diabetes);
        assert_eq!(updated.diabetes_type.as_deref(), Some("type2"));
        assert_eq!(updated.target_blood_sugar_max, Some(140));
    }

    #[test]
    fn test_update_missing_profile() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.update_profile(&new_id(), &ProfileUpdate::default()).is_err());
    }

    #[test]
    fn test_get_or_create_conversation_is_stable() {
        let (db, profile) = db_with_profile();
        assert!(db.get_conversation(&profile.id).unwrap().is_none());

        let first = db.get_or_create_conversation(&profile.id).unwrap();
        let second = db.get_or_create_conversation(&profile.id).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.user_id, profile.id);
    }

    #[test]
    fn test_conversation_requires_profile() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_or_create_conversation(&new_id()).is_err());
    }

    #[test]
    fn test_messages_ordered_by_insertion() {
        let (db, profile) = db_with_profile();
        let conv = db.get_or_create_conversation(&profile.id).unwrap();

        db.insert_message(&conv.id, Role::User, "first", None).unwrap();
        db.insert_message(&conv.id, Role::Assistant, "second", None)
            .unwrap();
        db.insert_message(&conv.id, Role::User, "third", Some("/api/images/abc.png"))
            .unwrap();

        let messages = db.get_conversation_messages(&conv.id).unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].image_url.as_deref(), Some("/api/images/abc.png"));
    }

    #[test]
    fn test_food_logs_and_daily_totals() {
        let (db, profile) = db_with_profile();
        let mut log = NewFoodLog {
            meal_type: "lunch".to_string(),
            food_name: "Jollof Rice".to_string(),
            calories: Some(350.0),
            carbs_g: Some(50.0),
            protein_g: Some(8.0),
            glycemic_index: Some(70.0),
            logged_at: Some("2025-03-01T12:30:00+00:00".to_string()),
            ..NewFoodLog::default()
        };
        log.normalize().unwrap();
        let inserted = db.insert_food_log(&profile.id, &log).unwrap();
        assert!((inserted.glycemic_load.unwrap() - 35.0).abs() < 1e-9);
        assert!((inserted.predicted_blood_sugar_spike.unwrap() - 105.0).abs() < 1e-9);

        let mut second = NewFoodLog {
            meal_type: "dinner".to_string(),
            food_name: "Moi Moi".to_string(),
            calories: Some(200.0),
            logged_at: Some("2025-03-01T19:00:00+00:00".to_string()),
            ..NewFoodLog::default()
        };
        second.normalize().unwrap();
        db.insert_food_log(&profile.id, &second).unwrap();

        let date = crate::models::parse_timestamp("2025-03-01T12:30:00+00:00")
            .unwrap()
            .date_naive();
        let totals = db.daily_totals(&profile.id, date).unwrap();
        assert!(totals.entries >= 1);

        let logs = db.get_food_logs_for_date(&profile.id, date).unwrap();
        assert_eq!(logs.len() as i64, totals.entries);

        assert!(db.delete_food_log(&profile.id, &inserted.id).unwrap());
        assert!(!db.delete_food_log(&profile.id, &inserted.id).unwrap());
    }

    #[test]
    fn test_daily_totals_empty_day() {
        let (db, profile) = db_with_profile();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let totals = db.daily_totals(&profile.id, date).unwrap();
        assert_eq!(totals.entries, 0);
        assert!(totals.calories.abs() < f64::EPSILON);
        assert_eq!(totals.date, "2024-01-01");
    }

    #[test]
    fn test_blood_sugar_history_newest_first() {
        let (db, profile) = db_with_profile();
        for (value, ts) in [
            (95.0, "2025-03-01T07:00:00+00:00"),
            (160.0, "2025-03-01T13:00:00+00:00"),
        ] {
            let reading = NewBloodSugarReading {
                reading_mg_dl: value,
                reading_type: "random".to_string(),
                notes: None,
                measured_at: Some(ts.to_string()),
            };
            db.insert_blood_sugar(&profile.id, &reading).unwrap();
        }
        let history = db.get_blood_sugar_history(&profile.id, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert!((history[0].reading_mg_dl - 160.0).abs() < f64::EPSILON);

        let limited = db.get_blood_sugar_history(&profile.id, 1).unwrap();
        assert_eq!(limited.len(), 1);

        assert!(db.delete_blood_sugar(&profile.id, &history[1].id).unwrap());
        assert_eq!(db.get_blood_sugar_history(&profile.id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_meal_suggestions_roundtrip() {
        let (db, profile) = db_with_profile();
        let mut suggestion = NewMealSuggestion {
            meal_name: "Okra Soup".to_string(),
            ingredients: vec!["okra".to_string(), "fish".to_string()],
            difficulty: Some("Easy".to_string()),
            diabetes_friendly: true,
            ..NewMealSuggestion::default()
        };
        suggestion.normalize().unwrap();
        let saved = db.insert_meal_suggestion(&profile.id, &suggestion).unwrap();
        assert_eq!(saved.ingredients, vec!["okra", "fish"]);
        assert_eq!(saved.difficulty.as_deref(), Some("easy"));
        assert!(saved.addresses_gaps.is_none());

        let all = db.list_meal_suggestions(&profile.id).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].diabetes_friendly);
    }

    #[test]
    fn test_nutritional_gaps_roundtrip() {
        let (db, profile) = db_with_profile();
        let mut gap = NewNutritionalGap {
            nutrient_name: "Fiber".to_string(),
            current_intake: 18.0,
            recommended_intake: 30.0,
            unit: "g".to_string(),
            severity: None,
            analysis_date: Some("2025-03-01".to_string()),
        };
        gap.normalize().unwrap();
        let saved = db.insert_nutritional_gap(&profile.id, &gap).unwrap();
        assert_eq!(saved.severity, "moderate");
        assert_eq!(saved.analysis_date, "2025-03-01");
        assert_eq!(db.list_nutritional_gaps(&profile.id).unwrap().len(), 1);
    }

    #[test]
    fn test_diary_settings_upsert() {
        let (db, profile) = db_with_profile();
        assert!(db.get_diary_settings(&profile.id).unwrap().is_none());

        db.upsert_diary_settings(&profile.id, Goal::Loss, TrackingFrequency::Daily)
            .unwrap();
        let settings = db
            .upsert_diary_settings(&profile.id, Goal::Gain, TrackingFrequency::Weekly)
            .unwrap();
        assert_eq!(settings.goal, Goal::Gain);
        assert_eq!(settings.tracking_frequency, TrackingFrequency::Weekly);
    }

    #[test]
    fn test_health_logs_newest_first() {
        let (db, profile) = db_with_profile();
        for weight in [72.0, 71.0, 70.5] {
            let metrics = HealthMetrics {
                weight_kg: weight,
                blood_sugar_mg_dl: 100.0,
                systolic: 120,
                diastolic: 80,
                mood: Mood::Happy,
            };
            db.insert_health_log(&profile.id, &metrics).unwrap();
        }
        let logs = db.get_health_logs(&profile.id, None).unwrap();
        let weights: Vec<f64> = logs.iter().map(|l| l.weight_kg).collect();
        assert_eq!(weights, vec![70.5, 71.0, 72.0]);
        assert_eq!(db.get_health_logs(&profile.id, Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_health_timeline_limit_uses_older_log_for_trend() {
        let (db, profile) = db_with_profile();
        db.upsert_diary_settings(&profile.id, Goal::Loss, TrackingFrequency::Daily)
            .unwrap();
        for weight in [82.0, 81.0, 80.0] {
            let metrics = HealthMetrics {
                weight_kg: weight,
                blood_sugar_mg_dl: 100.0,
                systolic: 120,
                diastolic: 80,
                mood: Mood::Okay,
            };
            db.insert_health_log(&profile.id, &metrics).unwrap();
        }

        let full = db.health_timeline(&profile.id, None, Local::now()).unwrap();
        let trends: Vec<Trend> = full.iter().map(|e| e.trend).collect();
        assert_eq!(trends, vec![Trend::Improving, Trend::Improving, Trend::Neutral]);

        let limited = db.health_timeline(&profile.id, Some(2), Local::now()).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].log.weight_kg, 81.0);
        assert_eq!(limited[1].trend, Trend::Improving);

        assert!(db.health_timeline(&profile.id, Some(0), Local::now()).is_err());
        assert!(db.health_timeline(&profile.id, Some(-1), Local::now()).is_err());
    }

    #[test]
    fn test_meal_plan_save_list_delete() {
        let (db, profile) = db_with_profile();
        let prefs = Preferences {
            dietary: vec!["vegan".to_string()],
            meals_per_day: 2,
            mode: MealMode::Weekly,
            days_count: 2,
        };
        let ingredients = vec!["Beans".to_string(), "Rice".to_string()];
        let days = template_plan(&ingredients, &prefs);
        let plan = db
            .save_meal_plan(&profile.id, "Week 1", &prefs, &ingredients, &days, "template")
            .unwrap();
        assert_eq!(plan.days, days);
        assert_eq!(plan.preferences.meals_per_day, 2);

        let other = db.create_profile("bob@example.com", None).unwrap();
        assert!(db.get_meal_plan(&other.id, &plan.id).unwrap().is_none());
        assert!(!db.delete_meal_plan(&other.id, &plan.id).unwrap());

        assert_eq!(db.list_meal_plans(&profile.id).unwrap().len(), 1);
        assert!(db.delete_meal_plan(&profile.id, &plan.id).unwrap());
        assert!(db.list_meal_plans(&profile.id).unwrap().is_empty());
    }
}
