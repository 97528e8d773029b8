use std::path::Path;

use anyhow::{Context, Result};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrisense_core::models::Role;
use nutrisense_core::scan::ScanOutput;

use crate::assistant::{Assistant, ScanResult};
use crate::images::ImageKind;

use super::helpers::{print_json, short_time};

pub(crate) async fn cmd_chat_send(
    assistant: &Assistant,
    user_id: &str,
    message: &str,
    json: bool,
) -> Result<()> {
    let reply = assistant.send_user_message(user_id, message, None).await?;
    if json {
        print_json(&reply)?;
    } else {
        println!("{}", reply.assistant_response);
    }
    Ok(())
}

pub(crate) fn cmd_chat_history(assistant: &Assistant, user_id: &str, json: bool) -> Result<()> {
    let session = assistant.chat_session(user_id)?;
    if json {
        return print_json(&session);
    }

    if let Some(greeting) = session.greeting {
        println!("{greeting}");
        return Ok(());
    }
    for message in &session.messages {
        let who = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!("[{}] {who}:", short_time(&message.created_at));
        println!("{}", message.content);
        if let Some(ref url) = message.image_url {
            println!("  (image: {url})");
        }
        println!();
    }
    Ok(())
}

/// Scan a food photo and ask the assistant about it in the user's chat.
pub(crate) async fn cmd_chat_analyze(
    assistant: &Assistant,
    user_id: &str,
    image: &Path,
    prompt: &str,
    json: bool,
) -> Result<()> {
    let scan = scan_file(assistant, user_id, image).await?;
    let reply = assistant
        .send_food_analysis_message(user_id, prompt, &scan.scan_output, Some(&scan.image_url))
        .await?;

    if json {
        print_json(&serde_json::json!({ "scan": scan, "reply": reply }))?;
    } else {
        print_scan(&scan.scan_output);
        println!();
        println!("{}", reply.assistant_response);
    }
    Ok(())
}

pub(crate) async fn cmd_scan(
    assistant: &Assistant,
    user_id: &str,
    image: &Path,
    json: bool,
) -> Result<()> {
    let scan = scan_file(assistant, user_id, image).await?;
    if json {
        print_json(&scan)?;
    } else {
        print_scan(&scan.scan_output);
        println!("\nImage saved as {}", scan.image_url);
    }
    Ok(())
}

async fn scan_file(assistant: &Assistant, user_id: &str, image: &Path) -> Result<ScanResult> {
    let bytes = std::fs::read(image)
        .with_context(|| format!("Failed to read image {}", image.display()))?;
    let kind = ImageKind::sniff(&bytes)
        .with_context(|| format!("{} is not a JPEG, PNG or WebP image", image.display()))?;
    Ok(assistant.scan_image(user_id, &bytes, kind).await?)
}

fn print_scan(scan: &ScanOutput) {
    if scan.detected_items.is_empty() {
        println!("No foods detected.");
    } else {
        #[derive(Tabled)]
        struct ItemRow {
            #[tabled(rename = "Food")]
            name: String,
            #[tabled(rename = "Conf")]
            confidence: String,
            #[tabled(rename = "Cal")]
            calories: String,
            #[tabled(rename = "Carbs")]
            carbs: String,
            #[tabled(rename = "GI")]
            gi: String,
            #[tabled(rename = "Flags")]
            flags: String,
            #[tabled(rename = "Advice")]
            advice: String,
        }

        let rows: Vec<ItemRow> = scan
            .detected_items
            .iter()
            .map(|item| ItemRow {
                name: item.name.clone(),
                confidence: format!("{:.0}%", item.confidence * 100.0),
                calories: format!("{:.0}", item.calories),
                carbs: format!("{:.0}g", item.carbs),
                gi: format!("{:.0}", item.glycemic_index),
                flags: item.flags.join(", "),
                advice: item.advice.clone(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..5)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    let summary = &scan.meal_summary;
    println!(
        "Total: {:.0} kcal | Score {}/100 ({})",
        summary.total_calories, summary.score, summary.quality
    );
    for tip in summary
        .recommendations
        .iter()
        .chain(&scan.recommendations.healthy_alternatives)
        .chain(&scan.recommendations.portion_adjustments)
    {
        println!("  - {tip}");
    }
}
