//! Assistant actions: the chat, food-analysis, scan, and meal-plan
//! operations that combine the store with the language model and the scan
//! backend. The database lock is only taken between awaits.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use nutrisense_core::db::Database;
use nutrisense_core::models::{Conversation, Message, Profile, Role, UserConditions, validate_user_id};
use nutrisense_core::planner::{MealPlan, PlanRequest, parse_plan_response, plan_prompt, template_plan};
use nutrisense_core::prompt::{
    DIABETES_GREETING, FALLBACK_ANALYSIS, IMAGE_ATTACHED_SUFFIX, WELCOME_GREETING, chat_prompt,
    food_analysis_prompt,
};
use nutrisense_core::scan::{ScanOutput, build_scan_output};

use crate::gemini::GeminiClient;
use crate::images::{ImageKind, ImageStore};
use crate::scanner::ScanClient;

#[derive(Debug)]
pub enum ActionError {
    /// Malformed caller input (bad user id, empty message, invalid form).
    Invalid(anyhow::Error),
    NotFound(String),
    /// The language model or the scan backend failed.
    Upstream(anyhow::Error),
    Internal(anyhow::Error),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(e) | Self::Upstream(e) | Self::Internal(e) => write!(f, "{e:#}"),
            Self::NotFound(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<anyhow::Error> for ActionError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

type ActionResult<T> = Result<T, ActionError>;

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub conversation_id: String,
    pub assistant_response: String,
}

#[derive(Debug, Serialize)]
pub struct ChatSession {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    /// Shown by clients while the conversation is still empty.
    pub greeting: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ScanResult {
    pub image_url: String,
    pub scan_output: ScanOutput,
}

pub struct Assistant {
    db: Arc<Mutex<Database>>,
    llm: GeminiClient,
    scanner: ScanClient,
    images: ImageStore,
}

impl Assistant {
    pub fn new(
        db: Arc<Mutex<Database>>,
        llm: GeminiClient,
        scanner: ScanClient,
        images: ImageStore,
    ) -> Self {
        Self {
            db,
            llm,
            scanner,
            images,
        }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    fn require_profile(db: &Database, user_id: &str) -> ActionResult<Profile> {
        db.get_profile(user_id)?
            .ok_or_else(|| ActionError::NotFound(format!("Profile {user_id} not found")))
    }

    pub fn get_user_profile(&self, user_id: &str) -> ActionResult<Profile> {
        let user_id = validate_user_id(user_id).map_err(ActionError::Invalid)?;
        Self::require_profile(&self.db(), &user_id)
    }

    pub fn get_or_create_conversation(&self, user_id: &str) -> ActionResult<Conversation> {
        let user_id = validate_user_id(user_id).map_err(ActionError::Invalid)?;
        let db = self.db();
        Self::require_profile(&db, &user_id)?;
        Ok(db.get_or_create_conversation(&user_id)?)
    }

    pub fn get_conversation_messages(&self, conversation_id: &str) -> ActionResult<Vec<Message>> {
        Ok(self.db().get_conversation_messages(conversation_id)?)
    }

    /// Conversation, its messages, and the greeting for an empty chat.
    pub fn chat_session(&self, user_id: &str) -> ActionResult<ChatSession> {
        let profile = self.get_user_profile(user_id)?;
        let conversation = self.get_or_create_conversation(&profile.id)?;
        let messages = self.get_conversation_messages(&conversation.id)?;
        let greeting = messages.is_empty().then_some(if profile.has_diabetes {
            DIABETES_GREETING
        } else {
            WELCOME_GREETING
        });
        Ok(ChatSession {
            conversation_id: conversation.id,
            messages,
            greeting,
        })
    }

    /// Store the user's message, ask the model with recent history, and
    /// store its answer. A model failure leaves only the user's row.
    pub async fn send_user_message(
        &self,
        user_id: &str,
        content: &str,
        image_url: Option<&str>,
    ) -> ActionResult<ChatReply> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ActionError::Invalid(anyhow::anyhow!("Message must not be empty")));
        }
        let (conversation_id, prompt) = self.record_user_turn(user_id, content, image_url, |history, conditions| {
            chat_prompt(history, content, conditions)
        })?;
        self.complete_turn(conversation_id, &prompt).await
    }

    /// Like [`Self::send_user_message`], but the model answers about a food
    /// scan and the stored user message is marked as carrying an image.
    pub async fn send_food_analysis_message(
        &self,
        user_id: &str,
        user_prompt: &str,
        scan_output: &ScanOutput,
        image_url: Option<&str>,
    ) -> ActionResult<ChatReply> {
        let user_prompt = user_prompt.trim();
        let stored = format!("{user_prompt}{IMAGE_ATTACHED_SUFFIX}");
        let (conversation_id, prompt) = self.record_user_turn(user_id, &stored, image_url, |_, conditions| {
            food_analysis_prompt(scan_output, user_prompt, conditions)
        })?;
        self.complete_turn(conversation_id, &prompt).await
    }

    fn record_user_turn(
        &self,
        user_id: &str,
        stored_content: &str,
        image_url: Option<&str>,
        compose: impl FnOnce(&[Message], &UserConditions) -> anyhow::Result<String>,
    ) -> ActionResult<(String, String)> {
        let user_id = validate_user_id(user_id).map_err(ActionError::Invalid)?;
        let db = self.db();
        let profile = Self::require_profile(&db, &user_id)?;
        let conversation = db.get_or_create_conversation(&user_id)?;
        db.insert_message(&conversation.id, Role::User, stored_content, image_url)?;

        let conditions = UserConditions::from_profile(&profile);
        let history = db.get_conversation_messages(&conversation.id)?;
        let prompt = compose(&history, &conditions)?;
        Ok((conversation.id, prompt))
    }

    async fn complete_turn(&self, conversation_id: String, prompt: &str) -> ActionResult<ChatReply> {
        let answer = self.llm.generate(prompt).await.map_err(|e| {
            warn!(conversation = %conversation_id, error = %format!("{e:#}"), "model call failed");
            ActionError::Upstream(e)
        })?;

        self.db()
            .insert_message(&conversation_id, Role::Assistant, &answer, None)?;
        info!(conversation = %conversation_id, "assistant replied");

        Ok(ChatReply {
            conversation_id,
            assistant_response: answer,
        })
    }

    /// Stateless analysis of a scan. Never fails: model errors yield the
    /// canned fallback analysis.
    pub async fn analyze_food(
        &self,
        scan_output: &ScanOutput,
        user_prompt: &str,
        conditions: &UserConditions,
    ) -> String {
        let result = match food_analysis_prompt(scan_output, user_prompt, conditions) {
            Ok(prompt) => self.llm.generate(&prompt).await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %format!("{e:#}"), "food analysis failed, using fallback");
            FALLBACK_ANALYSIS.to_string()
        })
    }

    /// Store the photo, send it to the scan backend with the user's
    /// conditions, and summarize the result.
    pub async fn scan_image(&self, user_id: &str, bytes: &[u8], kind: ImageKind) -> ActionResult<ScanResult> {
        let profile = self.get_user_profile(user_id)?;
        let conditions = UserConditions::from_profile(&profile);
        ImageStore::check(bytes, kind).map_err(ActionError::Invalid)?;
        let stored = self.images.save(bytes, kind)?;

        let foods = self
            .scanner
            .scan(bytes.to_vec(), &stored.name, kind.content_type(), &conditions)
            .await
            .map_err(|e| {
                warn!(user = %profile.id, error = %format!("{e:#}"), "food scan failed");
                ActionError::Upstream(e)
            })?;
        info!(user = %profile.id, items = foods.len(), "food scan complete");

        Ok(ScanResult {
            image_url: stored.url,
            scan_output: build_scan_output(foods, &conditions),
        })
    }

    /// Generate a plan with the model, falling back to the template plan
    /// when the call fails or its answer cannot be used, then save it.
    pub async fn generate_meal_plan(&self, user_id: &str, mut request: PlanRequest) -> ActionResult<MealPlan> {
        request.normalize().map_err(ActionError::Invalid)?;
        let profile = self.get_user_profile(user_id)?;
        let conditions = UserConditions::from_profile(&profile);
        let prefs = &request.preferences;

        let prompt = plan_prompt(&request.ingredients, prefs, &conditions);
        let generated = match self.llm.generate(&prompt).await {
            Ok(answer) => parse_plan_response(&answer, prefs),
            Err(e) => Err(e),
        };
        let (days, source) = match generated {
            Ok(days) => (days, "model"),
            Err(e) => {
                warn!(user = %profile.id, error = %format!("{e:#}"), "meal plan generation failed, using template");
                (template_plan(&request.ingredients, prefs), "template")
            }
        };

        let plan_name = request
            .plan_name
            .clone()
            .unwrap_or_else(|| format!("Meal plan {}", chrono::Local::now().format("%Y-%m-%d")));
        let plan = self.db().save_meal_plan(
            &profile.id,
            &plan_name,
            prefs,
            &request.ingredients,
            &days,
            source,
        )?;
        info!(user = %profile.id, plan = %plan.id, source, "meal plan saved");
        Ok(plan)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gemini::tests::{mock_gemini, settings, spawn_mock};
    use crate::scanner::tests::mock_scanner;
    use nutrisense_core::models::ProfileUpdate;
    use nutrisense_core::prompt::CHAT_ERROR_REPLY;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];

    /// Assistant backed by an in-memory store and local mock upstreams.
    /// `llm_url` of `None` points the model at a closed port.
    pub(crate) async fn test_assistant(
        llm_url: Option<String>,
        images_dir: &std::path::Path,
    ) -> (Assistant, Arc<Mutex<Database>>) {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let llm_url = llm_url.unwrap_or_else(|| "http://127.0.0.1:9".to_string());
        let scan_url = spawn_mock(mock_scanner()).await;
        let assistant = Assistant::new(
            Arc::clone(&db),
            GeminiClient::new(&settings(&llm_url)).unwrap(),
            ScanClient::new(&scan_url).unwrap(),
            ImageStore::open(images_dir).unwrap(),
        );
        (assistant, db)
    }

    pub(crate) fn diabetic_profile(db: &Arc<Mutex<Database>>) -> Profile {
        let db = db.lock().unwrap();
        let profile = db.create_profile("ada@example.com", Some("Ada")).unwrap();
        let mut update = ProfileUpdate {
            health_conditions: vec!["Type 2 Diabetes".to_string(), "Hypertension".to_string()],
            ..ProfileUpdate::default()
        };
        update.normalize().unwrap();
        db.update_profile(&profile.id, &update).unwrap()
    }

    fn message_count(db: &Arc<Mutex<Database>>, conversation_id: &str) -> usize {
        db.lock()
            .unwrap()
            .get_conversation_messages(conversation_id)
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_send_user_message_appends_both_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let llm = spawn_mock(mock_gemini("Choose ofada rice in small portions.")).await;
        let (assistant, db) = test_assistant(Some(llm), tmp.path()).await;
        let profile = diabetic_profile(&db);

        let reply = assistant
            .send_user_message(&profile.id, "Can I eat rice?", None)
            .await
            .unwrap();
        assert_eq!(reply.assistant_response, "Choose ofada rice in small portions.");

        let messages = assistant.get_conversation_messages(&reply.conversation_id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Can I eat rice?");
        assert_eq!(messages[1].role, Role::Assistant);

        assistant
            .send_user_message(&profile.id, "And beans?", None)
            .await
            .unwrap();
        assert_eq!(message_count(&db, &reply.conversation_id), 4);
    }

    #[tokio::test]
    async fn test_send_user_message_llm_failure_keeps_user_row() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (assistant, db) = test_assistant(None, tmp.path()).await;
        let profile = diabetic_profile(&db);

        let err = assistant
            .send_user_message(&profile.id, "Hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Upstream(_)));

        let conversation = assistant.get_or_create_conversation(&profile.id).unwrap();
        let messages = assistant.get_conversation_messages(&conversation.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(!messages.iter().any(|m| m.content == CHAT_ERROR_REPLY));
    }

    #[tokio::test]
    async fn test_send_user_message_validates_input() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (assistant, db) = test_assistant(None, tmp.path()).await;
        let profile = diabetic_profile(&db);

        let err = assistant.send_user_message("demo-user", "Hi", None).await.unwrap_err();
        assert!(matches!(err, ActionError::Invalid(_)));

        let err = assistant.send_user_message(&profile.id, "   ", None).await.unwrap_err();
        assert!(matches!(err, ActionError::Invalid(_)));

        let missing = uuid::Uuid::new_v4().to_string();
        let err = assistant.send_user_message(&missing, "Hi", None).await.unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_food_analysis_message_marks_image() {
        let tmp = tempfile::TempDir::new().unwrap();
        let llm = spawn_mock(mock_gemini("**Identified Foods**: Jollof Rice")).await;
        let (assistant, db) = test_assistant(Some(llm), tmp.path()).await;
        let profile = diabetic_profile(&db);

        let scan = assistant.scan_image(&profile.id, JPEG, ImageKind::Jpeg).await.unwrap();
        let reply = assistant
            .send_food_analysis_message(&profile.id, "What is this?", &scan.scan_output, Some(&scan.image_url))
            .await
            .unwrap();

        let messages = assistant.get_conversation_messages(&reply.conversation_id).unwrap();
        assert_eq!(messages[0].content, "What is this? [Food Image Attached]");
        assert_eq!(messages[0].image_url.as_deref(), Some(scan.image_url.as_str()));
        assert_eq!(messages[1].content, "**Identified Foods**: Jollof Rice");
    }

    #[tokio::test]
    async fn test_scan_image_uses_profile_conditions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (assistant, db) = test_assistant(None, tmp.path()).await;
        let profile = diabetic_profile(&db);

        let result = assistant.scan_image(&profile.id, JPEG, ImageKind::Jpeg).await.unwrap();
        assert!(result.image_url.starts_with("/api/images/"));
        let item = &result.scan_output.detected_items[0];
        assert_eq!(item.name, "Jollof Rice");
        assert!(item.flags.contains(&"high_gi".to_string()));
        assert!(item.flags.contains(&"high_sodium".to_string()));
    }

    #[tokio::test]
    async fn test_scan_image_storage_failure_is_internal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let images = tmp.path().join("images");
        let (assistant, db) = test_assistant(None, &images).await;
        let profile = diabetic_profile(&db);
        std::fs::remove_dir(&images).unwrap();
        std::fs::write(&images, b"not a directory").unwrap();

        let result = assistant.scan_image(&profile.id, JPEG, ImageKind::Jpeg).await;
        assert!(matches!(result, Err(ActionError::Internal(_))));
        let result = assistant.scan_image(&profile.id, JPEG, ImageKind::Png).await;
        assert!(matches!(result, Err(ActionError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_analyze_food_falls_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (assistant, _db) = test_assistant(None, tmp.path()).await;
        let scan = build_scan_output(Vec::new(), &UserConditions::default());
        let text = assistant
            .analyze_food(&scan, "What is this?", &UserConditions::default())
            .await;
        assert_eq!(text, FALLBACK_ANALYSIS);
    }

    #[tokio::test]
    async fn test_chat_session_greeting() {
        let tmp = tempfile::TempDir::new().unwrap();
        let llm = spawn_mock(mock_gemini("Hi!")).await;
        let (assistant, db) = test_assistant(Some(llm), tmp.path()).await;
        let profile = diabetic_profile(&db);

        let session = assistant.chat_session(&profile.id).unwrap();
        assert!(session.messages.is_empty());
        assert_eq!(session.greeting, Some(DIABETES_GREETING));

        assistant.send_user_message(&profile.id, "Hello", None).await.unwrap();
        let session = assistant.chat_session(&profile.id).unwrap();
        assert_eq!(session.messages.len(), 2);
        assert!(session.greeting.is_none());
    }

    #[tokio::test]
    async fn test_generate_meal_plan_template_fallback() {
        let tmp = tempfile::TempDir::new().unwrap();
        let llm = spawn_mock(mock_gemini("I cannot make a plan right now.")).await;
        let (assistant, db) = test_assistant(Some(llm), tmp.path()).await;
        let profile = diabetic_profile(&db);

        let request: PlanRequest = serde_json::from_value(serde_json::json!({
            "ingredients": ["Beans", "Plantain"],
            "preferences": {"dietary": ["diabetic-friendly"], "meals_per_day": 2}
        }))
        .unwrap();
        let plan = assistant.generate_meal_plan(&profile.id, request).await.unwrap();
        assert_eq!(plan.source, "template");
        assert_eq!(plan.days.len(), 1);
        assert_eq!(plan.days[0].meals.len(), 2);
        assert!(plan.days[0].meals.iter().all(|m| m.diabetic_friendly));

        let plans = db.lock().unwrap().list_meal_plans(&profile.id).unwrap();
        assert_eq!(plans.len(), 1);
    }

    #[tokio::test]
    async fn test_generate_meal_plan_from_model() {
        let tmp = tempfile::TempDir::new().unwrap();
        let llm = spawn_mock(mock_gemini(
            r#"```json
{"days":[{"day":1,"meals":[{"title":"Bean porridge","ingredients":["Beans"],"prep_minutes":30,"instructions":"Boil.","diabetic_friendly":true}]}]}
```"#,
        ))
        .await;
        let (assistant, db) = test_assistant(Some(llm), tmp.path()).await;
        let profile = diabetic_profile(&db);

        let request: PlanRequest = serde_json::from_value(serde_json::json!({
            "ingredients": ["Beans"],
            "preferences": {"meals_per_day": 1},
            "plan_name": "Quick"
        }))
        .unwrap();
        let plan = assistant.generate_meal_plan(&profile.id, request).await.unwrap();
        assert_eq!(plan.source, "model");
        assert_eq!(plan.plan_name, "Quick");
        assert_eq!(plan.days[0].meals[0].title, "Bean porridge");
    }
}
