use serde::{Deserialize, Serialize};

use crate::models::UserConditions;

/// Response body of the image-scan backend's `POST /scan-food/`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanResponse {
    #[serde(default)]
    pub foods: Vec<ScannedFood>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannedFood {
    pub name: String,
    pub confidence: f64,
    pub calories: Option<f64>,
    pub carbs: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub fiber: Option<f64>,
    pub glycemic_index: Option<f64>,
    #[serde(default)]
    pub advice: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Structured estimate handed to the assistant alongside a food photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutput {
    pub detected_items: Vec<DetectedItem>,
    pub meal_summary: MealSummary,
    pub recommendations: ScanRecommendations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedItem {
    pub name: String,
    pub confidence: f64,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fiber: f64,
    pub glycemic_index: f64,
    pub flags: Vec<String>,
    /// Backend advice, or the GI-band advice when the backend sent none.
    #[serde(default)]
    pub advice: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealSummary {
    pub total_calories: f64,
    pub score: u8,
    pub quality: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRecommendations {
    pub healthy_alternatives: Vec<String>,
    pub portion_adjustments: Vec<String>,
}

const MAX_ITEMS: usize = 5;
const HIGH_SODIUM_FOODS: &[&str] = &["fried chicken", "stew", "pepper soup", "jollof rice"];
const ULCER_IRRITANTS: &[&str] = &["pepper soup", "fried", "stew"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiBand {
    Low,
    Medium,
    High,
}

#[must_use]
pub fn gi_band(gi: f64) -> GiBand {
    if gi < 55.0 {
        GiBand::Low
    } else if gi <= 69.0 {
        GiBand::Medium
    } else {
        GiBand::High
    }
}

#[must_use]
pub fn gi_advice(gi: Option<f64>) -> &'static str {
    match gi.map(gi_band) {
        None => "No GI data available",
        Some(GiBand::Low) => "Low GI – safer for diabetes",
        Some(GiBand::Medium) => "Medium GI – moderate consumption advised",
        Some(GiBand::High) => "High GI – minimize for diabetes",
    }
}

/// Condition-specific warnings for one scanned food.
#[must_use]
pub fn health_flags(food: &ScannedFood, conditions: &UserConditions) -> Vec<String> {
    let mut flags = Vec::new();
    let name = food.name.to_lowercase();

    if conditions.has_diabetes {
        if food.glycemic_index.is_some_and(|gi| gi > 55.0) {
            flags.push("high_gi".to_string());
        }
        if food.carbs.is_some_and(|c| c > 30.0) {
            flags.push("high_carbs".to_string());
        }
    }
    if conditions.hypertension && HIGH_SODIUM_FOODS.iter().any(|f| name.contains(f)) {
        flags.push("high_sodium".to_string());
    }
    if conditions.ulcer && ULCER_IRRITANTS.iter().any(|f| name.contains(f)) {
        flags.push("ulcer_irritant".to_string());
    }
    if conditions.weight_loss && food.calories.is_some_and(|c| c > 200.0) {
        flags.push("high_calorie".to_string());
    }
    flags
}

/// Deduplicate by name (highest confidence wins), keep the five most
/// confident items, and summarize the meal for the given conditions.
#[must_use]
pub fn build_scan_output(foods: Vec<ScannedFood>, conditions: &UserConditions) -> ScanOutput {
    let mut unique: Vec<ScannedFood> = Vec::new();
    for food in foods {
        match unique
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(&food.name))
        {
            Some(existing) if existing.confidence < food.confidence => *existing = food,
            Some(_) => {}
            None => unique.push(food),
        }
    }
    unique.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    unique.truncate(MAX_ITEMS);

    let mut recommendations = ScanRecommendations::default();
    let mut penalty: u32 = 0;

    let detected_items: Vec<DetectedItem> = unique
        .iter()
        .map(|food| {
            let flags = health_flags(food, conditions);
            match food.glycemic_index.map(gi_band) {
                Some(GiBand::High) => {
                    penalty += 15;
                    recommendations.healthy_alternatives.push(format!(
                        "Swap {} for a lower-GI option such as whole grains or legumes",
                        food.name
                    ));
                }
                Some(GiBand::Medium) => penalty += 5,
                _ => {}
            }
            if flags.iter().any(|f| f == "high_sodium" || f == "ulcer_irritant") {
                penalty += 10;
            }
            if flags.iter().any(|f| f == "high_calorie" || f == "high_carbs") {
                penalty += 5;
                recommendations
                    .portion_adjustments
                    .push(format!("Reduce the portion of {} by about half", food.name));
            }
            DetectedItem {
                name: food.name.clone(),
                confidence: food.confidence,
                calories: food.calories.unwrap_or(0.0),
                carbs: food.carbs.unwrap_or(0.0),
                protein: food.protein.unwrap_or(0.0),
                fiber: food.fiber.unwrap_or(0.0),
                glycemic_index: food.glycemic_index.unwrap_or(0.0),
                flags,
                advice: food
                    .advice
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| gi_advice(food.glycemic_index))
                    .to_string(),
                source: food.source.clone().unwrap_or_else(|| "scan".to_string()),
            }
        })
        .collect();

    let total_calories: f64 = detected_items.iter().map(|i| i.calories).sum();
    let total_fiber: f64 = detected_items.iter().map(|i| i.fiber).sum();
    if total_calories > 800.0 {
        penalty += 10;
    }

    let mut summary_recs = Vec::new();
    if detected_items.is_empty() {
        summary_recs.push("No foods were recognized; try a clearer photo".to_string());
    } else {
        if total_fiber < 5.0 {
            summary_recs.push("Add vegetables or legumes for more fiber".to_string());
        }
        if !recommendations.healthy_alternatives.is_empty() {
            summary_recs.push("Balance high-GI foods with protein to slow glucose rise".to_string());
        }
        if total_calories > 800.0 {
            summary_recs.push("This meal is calorie-dense; consider a smaller plate".to_string());
        }
    }

    let score = if detected_items.is_empty() {
        0
    } else {
        100u32.saturating_sub(penalty) as u8
    };
    let quality = match score {
        75..=100 => "good",
        50..=74 => "fair",
        _ => "poor",
    };

    ScanOutput {
        detected_items,
        meal_summary: MealSummary {
            total_calories,
            score,
            quality: quality.to_string(),
            recommendations: summary_recs,
        },
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn food(name: &str, confidence: f64, calories: f64, carbs: f64, gi: Option<f64>) -> ScannedFood {
        ScannedFood {
            name: name.to_string(),
            confidence,
            calories: Some(calories),
            carbs: Some(carbs),
            protein: Some(5.0),
            fat: Some(3.0),
            fiber: Some(1.0),
            glycemic_index: gi,
            advice: None,
            source: Some("YOLO".to_string()),
        }
    }

    fn diabetic() -> UserConditions {
        UserConditions {
            has_diabetes: true,
            ..UserConditions::default()
        }
    }

    #[test]
    fn test_gi_band_boundaries() {
        assert_eq!(gi_band(54.9), GiBand::Low);
        assert_eq!(gi_band(55.0), GiBand::Medium);
        assert_eq!(gi_band(69.0), GiBand::Medium);
        assert_eq!(gi_band(70.0), GiBand::High);
        assert_eq!(gi_advice(None), "No GI data available");
    }

    #[test]
    fn test_health_flags_by_condition() {
        let rice = food("Jollof Rice", 0.9, 350.0, 45.0, Some(72.0));

        assert!(health_flags(&rice, &UserConditions::default()).is_empty());
        assert_eq!(health_flags(&rice, &diabetic()), vec!["high_gi", "high_carbs"]);

        let hypertensive = UserConditions {
            hypertension: true,
            weight_loss: true,
            ..UserConditions::default()
        };
        assert_eq!(
            health_flags(&rice, &hypertensive),
            vec!["high_sodium", "high_calorie"]
        );

        let ulcer = UserConditions {
            ulcer: true,
            ..UserConditions::default()
        };
        let soup = food("Pepper Soup", 0.8, 150.0, 5.0, None);
        assert_eq!(health_flags(&soup, &ulcer), vec!["ulcer_irritant"]);
    }

    #[test]
    fn test_build_scan_output_dedups_and_ranks() {
        let foods = vec![
            food("Plantain", 0.4, 120.0, 30.0, Some(40.0)),
            food("plantain", 0.7, 120.0, 30.0, Some(40.0)),
            food("Beans", 0.9, 130.0, 20.0, Some(30.0)),
        ];
        let output = build_scan_output(foods, &UserConditions::default());
        assert_eq!(output.detected_items.len(), 2);
        assert_eq!(output.detected_items[0].name, "Beans");
        assert!((output.detected_items[1].confidence - 0.7).abs() < f64::EPSILON);
        assert!((output.meal_summary.total_calories - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_build_scan_output_truncates_to_five() {
        let foods = (0..8u8)
            .map(|i| food(&format!("Food {i}"), f64::from(i) / 10.0, 10.0, 1.0, None))
            .collect();
        let output = build_scan_output(foods, &UserConditions::default());
        assert_eq!(output.detected_items.len(), 5);
        assert_eq!(output.detected_items[0].name, "Food 7");
    }

    #[test]
    fn test_build_scan_output_scores_high_gi_meal() {
        let foods = vec![
            food("White Rice", 0.9, 400.0, 45.0, Some(73.0)),
            food("Fried Chicken", 0.8, 500.0, 10.0, Some(0.0)),
        ];
        let output = build_scan_output(foods, &diabetic());

        // 15 (high GI) + 5 (high carbs) + 10 (calorie-dense meal)
        assert_eq!(output.meal_summary.score, 70);
        assert_eq!(output.meal_summary.quality, "fair");
        assert_eq!(output.recommendations.healthy_alternatives.len(), 1);
        assert_eq!(output.recommendations.portion_adjustments.len(), 1);
        assert!(
            output
                .meal_summary
                .recommendations
                .iter()
                .any(|r| r.contains("fiber"))
        );
    }

    #[test]
    fn test_build_scan_output_keeps_backend_advice() {
        let mut egusi = food("Egusi Soup", 0.9, 320.0, 12.0, None);
        egusi.advice = Some("Pair with vegetables".to_string());
        let mut yam = food("Pounded Yam", 0.8, 300.0, 70.0, Some(90.0));
        yam.advice = Some("  ".to_string());
        let beans = food("Beans", 0.7, 130.0, 20.0, Some(30.0));

        let output = build_scan_output(vec![egusi, yam, beans], &diabetic());
        let advice: Vec<&str> = output
            .detected_items
            .iter()
            .map(|i| i.advice.as_str())
            .collect();
        assert_eq!(
            advice,
            vec![
                "Pair with vegetables",
                "High GI – minimize for diabetes",
                "Low GI – safer for diabetes"
            ]
        );
    }

    #[test]
    fn test_build_scan_output_empty() {
        let output = build_scan_output(Vec::new(), &diabetic());
        assert!(output.detected_items.is_empty());
        assert_eq!(output.meal_summary.score, 0);
        assert_eq!(output.meal_summary.quality, "poor");
    }

    #[test]
    fn test_scan_response_parses_backend_payload() {
        let body = r#"{"foods":[{"name":"Egusi Soup","confidence":0.83,"calories":320,
            "carbs":12,"protein":18,"fat":22,"fiber":4,"glycemic_index":null,
            "advice":"No GI data available","source":"YOLO"}]}"#;
        let parsed: ScanResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.foods.len(), 1);
        assert_eq!(parsed.foods[0].name, "Egusi Soup");
        assert!(parsed.foods[0].glycemic_index.is_none());
    }
}
