mod assistant;
mod commands;
mod config;
mod gemini;
mod images;
mod scanner;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_subscriber::EnvFilter;

use crate::assistant::Assistant;
use crate::commands::{
    cmd_chat_analyze, cmd_chat_history, cmd_chat_send, cmd_diary_log, cmd_diary_settings,
    cmd_diary_timeline, cmd_food_delete, cmd_food_list, cmd_food_log, cmd_food_summary,
    cmd_plan_delete, cmd_plan_generate, cmd_plan_list, cmd_plan_show, cmd_profile_create,
    cmd_profile_list, cmd_profile_onboard, cmd_profile_show, cmd_scan, cmd_sugar_delete,
    cmd_sugar_list, cmd_sugar_log,
};
use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::images::ImageStore;
use crate::scanner::ScanClient;
use nutrisense_core::db::Database;
use nutrisense_core::diary::{Mood, NewHealthLog};
use nutrisense_core::models::{NewBloodSugarReading, NewFoodLog, ProfileUpdate, parse_list};
use nutrisense_core::planner::{MealMode, PlanRequest, Preferences};

#[derive(Parser)]
#[command(
    name = "nutrisense",
    version,
    about = "Diabetes-aware nutrition assistant",
    long_about = "Track meals, blood sugar and health metrics, chat with a nutrition \
                  assistant, scan food photos and plan meals from what you have."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage user profiles and onboarding
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Talk to the nutrition assistant
    Chat {
        #[command(subcommand)]
        command: ChatCommands,
    },
    /// Scan a food photo and show the nutrition estimate
    Scan {
        /// User ID
        user: String,
        /// Path to a JPEG, PNG or WebP photo
        image: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log food and show daily totals
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Record and review blood sugar readings
    Sugar {
        #[command(subcommand)]
        command: SugarCommands,
    },
    /// Health diary: goals, metric logs and the timeline
    Diary {
        #[command(subcommand)]
        command: DiaryCommands,
    },
    /// Generate and manage meal plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
        /// Address to bind to (use 0.0.0.0 for network access)
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Create a profile
    Create {
        /// Email address
        email: String,
        /// Full name
        #[arg(long)]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a profile
    Show {
        /// User ID
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all profiles
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save onboarding answers (replaces all onboarding fields)
    Onboard {
        /// User ID
        user: String,
        #[arg(long)]
        age: Option<i64>,
        /// Weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// male, female, other, prefer_not_to_say
        #[arg(long)]
        gender: Option<String>,
        /// sedentary, light, moderate, active, very_active
        #[arg(long)]
        activity: Option<String>,
        /// Comma-separated health conditions (e.g. "Type 2 Diabetes, Hypertension")
        #[arg(long, default_value = "")]
        conditions: String,
        /// Comma-separated dietary preferences
        #[arg(long, default_value = "")]
        diet: String,
        /// Comma-separated allergies
        #[arg(long, default_value = "")]
        allergies: String,
        /// Comma-separated cuisines (e.g. "Nigerian, Ghanaian")
        #[arg(long, default_value = "")]
        cuisines: String,
        /// Monthly food budget in USD
        #[arg(long)]
        budget: Option<f64>,
        /// type1, type2, prediabetes, gestational
        #[arg(long)]
        diabetes_type: Option<String>,
        /// Target blood sugar lower bound (mg/dL)
        #[arg(long)]
        target_min: Option<i64>,
        /// Target blood sugar upper bound (mg/dL)
        #[arg(long)]
        target_max: Option<i64>,
        /// Primary goal (e.g. weight_loss)
        #[arg(long)]
        goal: Option<String>,
        /// Comma-separated secondary goals
        #[arg(long, default_value = "")]
        secondary_goals: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ChatCommands {
    /// Send a message and print the reply
    Send {
        /// User ID
        user: String,
        /// Message text
        message: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the conversation
    History {
        /// User ID
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scan a food photo and ask the assistant about it
    Analyze {
        /// User ID
        user: String,
        /// Path to a JPEG, PNG or WebP photo
        image: PathBuf,
        /// Question about the meal
        #[arg(long, default_value = "What do you think of this meal?")]
        prompt: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Log a food entry
    Log {
        /// User ID
        user: String,
        /// Food name
        food: String,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        #[arg(long)]
        calories: Option<f64>,
        #[arg(long)]
        protein: Option<f64>,
        #[arg(long)]
        carbs: Option<f64>,
        #[arg(long)]
        fat: Option<f64>,
        #[arg(long)]
        fiber: Option<f64>,
        #[arg(long)]
        sugar: Option<f64>,
        /// Sodium in mg
        #[arg(long)]
        sodium: Option<f64>,
        /// Glycemic index (0-100)
        #[arg(long)]
        gi: Option<f64>,
        /// Portion description (e.g. "1 cup")
        #[arg(long)]
        portion: Option<String>,
        /// When it was eaten (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List food entries for a day, or the most recent ones
    List {
        /// User ID
        user: String,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Show the N most recent entries instead of one day
        #[arg(long, conflicts_with = "date")]
        recent: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show nutrient totals for a day
    Summary {
        /// User ID
        user: String,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food entry
    Delete {
        /// User ID
        user: String,
        /// Food log ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SugarCommands {
    /// Record a blood sugar reading
    Log {
        /// User ID
        user: String,
        /// Reading in mg/dL
        value: f64,
        /// fasting, before_meal, after_meal, bedtime, random
        #[arg(short = 't', long = "type", default_value = "random")]
        reading_type: String,
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show recent readings, newest first
    List {
        /// User ID
        user: String,
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a reading
    Delete {
        /// User ID
        user: String,
        /// Reading ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum DiaryCommands {
    /// Show or change the diary goal and tracking frequency
    Settings {
        /// User ID
        user: String,
        /// loss, gain or maintain
        #[arg(long)]
        goal: Option<String>,
        /// daily, weekly or custom
        #[arg(long)]
        frequency: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a diary entry
    Log {
        /// User ID
        user: String,
        /// Weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Blood sugar in mg/dL
        #[arg(long)]
        sugar: Option<f64>,
        #[arg(long)]
        systolic: Option<i64>,
        #[arg(long)]
        diastolic: Option<i64>,
        /// Happy, Okay, Stressed, Tired or Sick
        #[arg(long)]
        mood: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show diary entries with weight trends
    Timeline {
        /// User ID
        user: String,
        /// Number of entries to show (default: all)
        #[arg(short, long)]
        limit: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Generate and save a meal plan from ingredients
    Generate {
        /// User ID
        user: String,
        /// Comma-separated ingredients you have
        ingredients: String,
        /// Comma-separated dietary preferences (e.g. "vegetarian, low-carb")
        #[arg(long, default_value = "")]
        diet: String,
        #[arg(long, default_value_t = 3)]
        meals_per_day: u8,
        /// Plan several days (1-7) instead of a single day
        #[arg(long)]
        days: Option<u8>,
        /// Plan name
        #[arg(long)]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved plans
    List {
        /// User ID
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a saved plan
    Show {
        /// User ID
        user: String,
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a saved plan
    Delete {
        /// User ID
        user: String,
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn lock(db: &Mutex<Database>) -> MutexGuard<'_, Database> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}

fn init_tracing(default: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Arc::new(Mutex::new(Database::open(&config.db_path)?));
    let assistant = Assistant::new(
        Arc::clone(&db),
        GeminiClient::new(&config.gemini)?,
        ScanClient::new(&config.scan_url)?,
        ImageStore::open(&config.images_dir)?,
    );

    match cli.command {
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            init_tracing("nutrisense=info,tower_http=info");
            if config.gemini.api_key.is_none() {
                tracing::warn!("GEMINI_API_KEY is not set; chat and meal planning will fail over");
            }
            let (api_key, new_api_key) = if no_auth {
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            server::start_server(db, Arc::new(assistant), port, &bind, api_key, new_api_key).await
        }
        Commands::Profile { command } => match command {
            ProfileCommands::Create { email, name, json } => {
                cmd_profile_create(&lock(&db), &email, name.as_deref(), json)
            }
            ProfileCommands::Show { user, json } => cmd_profile_show(&lock(&db), &user, json),
            ProfileCommands::List { json } => cmd_profile_list(&lock(&db), json),
            ProfileCommands::Onboard {
                user,
                age,
                weight,
                height,
                gender,
                activity,
                conditions,
                diet,
                allergies,
                cuisines,
                budget,
                diabetes_type,
                target_min,
                target_max,
                goal,
                secondary_goals,
                json,
            } => {
                let update = ProfileUpdate {
                    age,
                    weight_kg: weight,
                    height_cm: height,
                    gender,
                    activity_level: activity,
                    dietary_preferences: parse_list(&diet),
                    allergies: parse_list(&allergies),
                    health_conditions: parse_list(&conditions),
                    monthly_budget_usd: budget,
                    cultural_cuisine_preferences: parse_list(&cuisines),
                    has_diabetes: diabetes_type.is_some(),
                    diabetes_type,
                    target_blood_sugar_min: target_min,
                    target_blood_sugar_max: target_max,
                    primary_goal: goal,
                    secondary_goals: parse_list(&secondary_goals),
                };
                cmd_profile_onboard(&lock(&db), &user, update, json)
            }
        },
        Commands::Chat { command } => match command {
            ChatCommands::Send {
                user,
                message,
                json,
            } => cmd_chat_send(&assistant, &user, &message, json).await,
            ChatCommands::History { user, json } => cmd_chat_history(&assistant, &user, json),
            ChatCommands::Analyze {
                user,
                image,
                prompt,
                json,
            } => cmd_chat_analyze(&assistant, &user, &image, &prompt, json).await,
        },
        Commands::Scan { user, image, json } => cmd_scan(&assistant, &user, &image, json).await,
        Commands::Food { command } => match command {
            FoodCommands::Log {
                user,
                food,
                meal,
                calories,
                protein,
                carbs,
                fat,
                fiber,
                sugar,
                sodium,
                gi,
                portion,
                at,
                json,
            } => {
                let entry = NewFoodLog {
                    meal_type: meal,
                    food_name: food,
                    calories,
                    protein_g: protein,
                    carbs_g: carbs,
                    fat_g: fat,
                    fiber_g: fiber,
                    sugar_g: sugar,
                    sodium_mg: sodium,
                    glycemic_index: gi,
                    portion_size: portion,
                    logged_at: at,
                    ..NewFoodLog::default()
                };
                cmd_food_log(&lock(&db), &user, entry, json)
            }
            FoodCommands::List {
                user,
                date,
                recent,
                json,
            } => cmd_food_list(&lock(&db), &user, date, recent, json),
            FoodCommands::Summary { user, date, json } => {
                cmd_food_summary(&lock(&db), &user, date, json)
            }
            FoodCommands::Delete { user, id, json } => {
                cmd_food_delete(&lock(&db), &user, &id, json)
            }
        },
        Commands::Sugar { command } => match command {
            SugarCommands::Log {
                user,
                value,
                reading_type,
                notes,
                json,
            } => {
                let reading = NewBloodSugarReading {
                    reading_mg_dl: value,
                    reading_type,
                    notes,
                    measured_at: None,
                };
                cmd_sugar_log(&lock(&db), &user, reading, json)
            }
            SugarCommands::List { user, limit, json } => {
                cmd_sugar_list(&lock(&db), &user, limit, json)
            }
            SugarCommands::Delete { user, id, json } => {
                cmd_sugar_delete(&lock(&db), &user, &id, json)
            }
        },
        Commands::Diary { command } => match command {
            DiaryCommands::Settings {
                user,
                goal,
                frequency,
                json,
            } => cmd_diary_settings(
                &lock(&db),
                &user,
                goal.as_deref(),
                frequency.as_deref(),
                json,
            ),
            DiaryCommands::Log {
                user,
                weight,
                sugar,
                systolic,
                diastolic,
                mood,
                json,
            } => {
                let form = NewHealthLog {
                    weight_kg: weight,
                    blood_sugar_mg_dl: sugar,
                    systolic,
                    diastolic,
                    mood: mood.as_deref().map(Mood::parse).transpose()?,
                };
                cmd_diary_log(&lock(&db), &user, &form, json)
            }
            DiaryCommands::Timeline { user, limit, json } => {
                cmd_diary_timeline(&lock(&db), &user, limit, json)
            }
        },
        Commands::Plan { command } => match command {
            PlanCommands::Generate {
                user,
                ingredients,
                diet,
                meals_per_day,
                days,
                name,
                json,
            } => {
                let preferences = Preferences {
                    dietary: parse_list(&diet),
                    meals_per_day,
                    mode: if days.is_some() {
                        MealMode::Weekly
                    } else {
                        MealMode::Daily
                    },
                    days_count: days.unwrap_or(1),
                };
                let request = PlanRequest {
                    ingredients: parse_list(&ingredients),
                    preferences,
                    plan_name: name,
                };
                cmd_plan_generate(&assistant, &user, request, json).await
            }
            PlanCommands::List { user, json } => cmd_plan_list(&lock(&db), &user, json),
            PlanCommands::Show { user, id, json } => {
                cmd_plan_show(&lock(&db), &user, &id, json)
            }
            PlanCommands::Delete { user, id, json } => {
                cmd_plan_delete(&lock(&db), &user, &id, json)
            }
        },
    }
}
