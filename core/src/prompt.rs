//! Prompt templates for the hosted language model.

use anyhow::{Context, Result};

use crate::models::{Message, UserConditions};
use crate::scan::ScanOutput;

/// Number of prior messages included as chat context.
pub const HISTORY_WINDOW: usize = 5;

pub const CHAT_SYSTEM_PROMPT: &str = "You are an empathetic diabetes health assistant. Respond conversationally to user queries about nutrition, diabetes management, meals, etc. Personalize based on user conditions: diabetes (low-GI, portion control), hypertension (low-sodium), ulcer (bland), weight loss (calorie control). Keep positive, under 200 words, use markdown. End with a question.";

pub const FOOD_ANALYSIS_SYSTEM_PROMPT: &str = "You are an empathetic diabetes health assistant. Generate a helpful, conversational response based on the food scan output. Focus on diabetes management if the user has diabetes (emphasize low-GI foods, portion control, balanced macros). Consider other conditions like hypertension (low-sodium suggestions), ulcers (bland foods), weight loss (calorie control). Structure the response with:
- **Identified Foods**: List detected items with confidence.
- **Nutritional Breakdown**: Key macros, calories, GI.
- **Health Impact**: Personalized analysis based on conditions.
- **Recommendations**: Actionable tips, alternatives.

Keep it positive, encouraging, under 300 words. Use markdown for formatting (bold, bullets). End with a question to continue the conversation.";

/// Returned by the standalone analysis action when the model call fails.
pub const FALLBACK_ANALYSIS: &str = "I've analyzed your food image based on the scan. Here's a summary:

**Detected Items:** Mixed foods with moderate carbs.

**Nutrition:** ~350 calories, balanced but watch portions for diabetes.

**Tips:** Add veggies for fiber. Great choice overall!

What else can I help with?";

pub const CHAT_ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

pub const DIABETES_GREETING: &str = "Hello! I'm your diabetes health assistant. I can help you track meals, analyze nutrition, and manage your blood sugar levels. How can I assist you today?";

pub const WELCOME_GREETING: &str = "Welcome! I'm your health assistant. I can help you with nutrition and wellness advice. How can I assist you today?";

/// Suffix appended to the stored user message of a food-photo analysis.
pub const IMAGE_ATTACHED_SUFFIX: &str = " [Food Image Attached]";

/// Render the last few messages as `role: content` lines.
#[must_use]
pub fn format_history(messages: &[Message]) -> String {
    let start = messages.len().saturating_sub(HISTORY_WINDOW);
    messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn chat_prompt(history: &[Message], content: &str, conditions: &UserConditions) -> Result<String> {
    let conditions = serde_json::to_string(conditions).context("failed to serialize conditions")?;
    Ok(format!(
        "{CHAT_SYSTEM_PROMPT}\n\nRecent Chat History:\n{}\n\nUser: {content}\n\nUser Conditions: {conditions}",
        format_history(history)
    ))
}

pub fn food_analysis_prompt(
    scan: &ScanOutput,
    user_prompt: &str,
    conditions: &UserConditions,
) -> Result<String> {
    let scan = serde_json::to_string_pretty(scan).context("failed to serialize scan output")?;
    let conditions = serde_json::to_string(conditions).context("failed to serialize conditions")?;
    Ok(format!(
        "{FOOD_ANALYSIS_SYSTEM_PROMPT}\n\nScan Output: {scan}\n\nUser Prompt: {user_prompt}\n\nUser Conditions: {conditions}"
    ))
}
