//! Health diary: per-user goal settings, metric logs, and the timeline view
//! with weight trends.

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::{BloodSugarReading, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Loss,
    Gain,
    Maintain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingFrequency {
    Daily,
    Weekly,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mood {
    Happy,
    Okay,
    Stressed,
    Tired,
    Sick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Neutral,
}

macro_rules! text_enum {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Result<Self> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                bail!(
                    "Invalid value '{s}'. Must be one of: {}",
                    [$($text),+].join(", ")
                )
            }
        }
    };
}

text_enum!(Goal { Loss => "loss", Gain => "gain", Maintain => "maintain" });
text_enum!(TrackingFrequency { Daily => "daily", Weekly => "weekly", Custom => "custom" });
text_enum!(Mood {
    Happy => "Happy",
    Okay => "Okay",
    Stressed => "Stressed",
    Tired => "Tired",
    Sick => "Sick",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarySettings {
    pub goal: Goal,
    pub tracking_frequency: TrackingFrequency,
    #[serde(default, skip_deserializing)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthLog {
    pub id: String,
    pub user_id: String,
    pub weight_kg: f64,
    pub blood_sugar_mg_dl: f64,
    pub systolic: i64,
    pub diastolic: i64,
    pub mood: Mood,
    pub logged_at: String,
}

/// Form payload; every metric is required before a log can be saved.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewHealthLog {
    pub weight_kg: Option<f64>,
    pub blood_sugar_mg_dl: Option<f64>,
    pub systolic: Option<i64>,
    pub diastolic: Option<i64>,
    pub mood: Option<Mood>,
}

/// A validated log ready for insertion.
#[derive(Debug, Clone, Copy)]
pub struct HealthMetrics {
    pub weight_kg: f64,
    pub blood_sugar_mg_dl: f64,
    pub systolic: i64,
    pub diastolic: i64,
    pub mood: Mood,
}

impl NewHealthLog {
    pub fn validate(&self) -> Result<HealthMetrics> {
        let (Some(weight_kg), Some(blood_sugar_mg_dl), Some(systolic), Some(diastolic)) = (
            self.weight_kg,
            self.blood_sugar_mg_dl,
            self.systolic,
            self.diastolic,
        ) else {
            bail!("Please fill in all health metrics before saving");
        };

        if weight_kg <= 0.0 || blood_sugar_mg_dl <= 0.0 || systolic <= 0 || diastolic <= 0 {
            bail!("Health metrics must be greater than 0");
        }
        if systolic <= diastolic {
            bail!("Systolic pressure must be higher than diastolic ({systolic}/{diastolic})");
        }

        Ok(HealthMetrics {
            weight_kg,
            blood_sugar_mg_dl,
            systolic,
            diastolic,
            mood: self.mood.unwrap_or(Mood::Okay),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    #[serde(flatten)]
    pub log: HealthLog,
    pub blood_pressure: String,
    pub trend: Trend,
    pub relative_date: String,
}

/// Weight trend of `current` against the previous log, judged by the goal.
/// Without a goal the user is treated as maintaining.
#[must_use]
pub fn weight_trend(goal: Option<Goal>, current: f64, previous: Option<f64>) -> Trend {
    let Some(previous) = previous else {
        return Trend::Neutral;
    };

    match goal {
        Some(Goal::Loss) => directional(previous - current),
        Some(Goal::Gain) => directional(current - previous),
        Some(Goal::Maintain) | None => {
            if (current - previous).abs() < 0.5 {
                Trend::Neutral
            } else {
                Trend::Declining
            }
        }
    }
}

fn directional(progress: f64) -> Trend {
    if progress > 0.0 {
        Trend::Improving
    } else if progress < 0.0 {
        Trend::Declining
    } else {
        Trend::Neutral
    }
}

/// "Today", "Yesterday", or "N days ago", counted in whole 24-hour periods.
#[must_use]
pub fn relative_date(logged_at: DateTime<Local>, now: DateTime<Local>) -> String {
    match (now - logged_at).num_days() {
        i64::MIN..=0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        n => format!("{n} days ago"),
    }
}

/// Build the timeline from logs sorted newest first, keeping at most `limit`
/// entries. Logs past the limit only supply the previous weight.
#[must_use]
pub fn build_timeline(
    logs: Vec<HealthLog>,
    goal: Option<Goal>,
    now: DateTime<Local>,
    limit: Option<usize>,
) -> Vec<TimelineEntry> {
    let previous_weights: Vec<Option<f64>> = (0..logs.len())
        .map(|i| logs.get(i + 1).map(|l| l.weight_kg))
        .collect();

    logs.into_iter()
        .zip(previous_weights)
        .take(limit.unwrap_or(usize::MAX))
        .map(|(log, previous)| {
            let trend = weight_trend(goal, log.weight_kg, previous);
            let relative = DateTime::parse_from_rfc3339(&log.logged_at)
                .map(|dt| relative_date(dt.with_timezone(&Local), now))
                .unwrap_or_default();
            TimelineEntry {
                blood_pressure: format!("{}/{}", log.systolic, log.diastolic),
                trend,
                relative_date: relative,
                log,
            }
        })
        .collect()
}

/// Classify a blood-sugar reading against the profile's target range.
#[must_use]
pub fn blood_sugar_status(reading: f64, min: Option<i64>, max: Option<i64>) -> Option<&'static str> {
    #[allow(clippy::cast_precision_loss)]
    let (min, max) = (min? as f64, max? as f64);
    Some(if reading < min {
        "low"
    } else if reading > max {
        "high"
    } else {
        "in_range"
    })
}

/// Fill in each reading's status from the profile's target range.
pub fn classify_readings(readings: &mut [BloodSugarReading], profile: &Profile) {
    for reading in readings {
        reading.status = blood_sugar_status(
            reading.reading_mg_dl,
            profile.target_blood_sugar_min,
            profile.target_blood_sugar_max,
        )
        .map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn log(weight: f64, logged_at: DateTime<Local>) -> HealthLog {
        HealthLog {
            id: "x".to_string(),
            user_id: "u".to_string(),
            weight_kg: weight,
            blood_sugar_mg_dl: 100.0,
            systolic: 120,
            diastolic: 80,
            mood: Mood::Happy,
            logged_at: logged_at.to_rfc3339(),
        }
    }

    #[test]
    fn test_weight_trend_loss() {
        assert_eq!(weight_trend(Some(Goal::Loss), 70.0, Some(71.0)), Trend::Improving);
        assert_eq!(weight_trend(Some(Goal::Loss), 72.0, Some(71.0)), Trend::Declining);
        assert_eq!(weight_trend(Some(Goal::Loss), 71.0, Some(71.0)), Trend::Neutral);
    }

    #[test]
    fn test_weight_trend_gain() {
        assert_eq!(weight_trend(Some(Goal::Gain), 72.0, Some(71.0)), Trend::Improving);
        assert_eq!(weight_trend(Some(Goal::Gain), 70.0, Some(71.0)), Trend::Declining);
    }

    #[test]
    fn test_weight_trend_maintain() {
        assert_eq!(weight_trend(Some(Goal::Maintain), 71.3, Some(71.0)), Trend::Neutral);
        assert_eq!(weight_trend(Some(Goal::Maintain), 72.0, Some(71.0)), Trend::Declining);
        assert_eq!(weight_trend(None, 60.0, Some(71.0)), Trend::Declining);
    }

    #[test]
    fn test_weight_trend_without_previous() {
        assert_eq!(weight_trend(Some(Goal::Loss), 70.0, None), Trend::Neutral);
    }

    #[test]
    fn test_relative_date() {
        let now = Local::now();
        assert_eq!(relative_date(now - Duration::hours(3), now), "Today");
        assert_eq!(relative_date(now - Duration::hours(30), now), "Yesterday");
        assert_eq!(relative_date(now - Duration::days(4), now), "4 days ago");
    }

    #[test]
    fn test_build_timeline_compares_with_older_entry() {
        let now = Local::now();
        let logs = vec![
            log(70.0, now),
            log(71.0, now - Duration::days(1)),
            log(72.0, now - Duration::days(2)),
        ];
        let timeline = build_timeline(logs, Some(Goal::Loss), now, None);
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[0].trend, Trend::Improving);
        assert_eq!(timeline[0].relative_date, "Today");
        assert_eq!(timeline[1].relative_date, "Yesterday");
        assert_eq!(timeline[2].trend, Trend::Neutral);
        assert_eq!(timeline[0].blood_pressure, "120/80");
    }

    #[test]
    fn test_build_timeline_limit_keeps_trend_of_last_entry() {
        let now = Local::now();
        let logs = vec![
            log(80.0, now),
            log(81.0, now - Duration::days(1)),
            log(82.0, now - Duration::days(2)),
        ];
        let timeline = build_timeline(logs, Some(Goal::Loss), now, Some(2));
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[1].log.weight_kg, 81.0);
        assert_eq!(timeline[1].trend, Trend::Improving);
    }

    #[test]
    fn test_new_health_log_requires_all_metrics() {
        let form = NewHealthLog {
            weight_kg: Some(70.0),
            blood_sugar_mg_dl: Some(95.0),
            systolic: Some(120),
            diastolic: None,
            mood: None,
        };
        assert!(form.validate().is_err());

        let form = NewHealthLog {
            diastolic: Some(80),
            ..form
        };
        let metrics = form.validate().unwrap();
        assert_eq!(metrics.mood, Mood::Okay);
    }

    #[test]
    fn test_new_health_log_rejects_inverted_pressure() {
        let form = NewHealthLog {
            weight_kg: Some(70.0),
            blood_sugar_mg_dl: Some(95.0),
            systolic: Some(80),
            diastolic: Some(120),
            mood: Some(Mood::Tired),
        };
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_blood_sugar_status() {
        assert_eq!(blood_sugar_status(65.0, Some(70), Some(140)), Some("low"));
        assert_eq!(blood_sugar_status(100.0, Some(70), Some(140)), Some("in_range"));
        assert_eq!(blood_sugar_status(190.0, Some(70), Some(140)), Some("high"));
        assert_eq!(blood_sugar_status(190.0, None, Some(140)), None);
    }

    #[test]
    fn test_text_enum_parse() {
        assert_eq!(Goal::parse("LOSS").unwrap(), Goal::Loss);
        assert_eq!(Mood::parse("stressed").unwrap(), Mood::Stressed);
        assert_eq!(TrackingFrequency::parse("weekly").unwrap().as_str(), "weekly");
        assert!(Goal::parse("bulk").is_err());
    }
}
