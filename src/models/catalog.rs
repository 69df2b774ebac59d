use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = anyhow::Error;

    /// Accepts full English names and three-letter abbreviations, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let day = match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => DayOfWeek::Monday,
            "tuesday" | "tue" => DayOfWeek::Tuesday,
            "wednesday" | "wed" => DayOfWeek::Wednesday,
            "thursday" | "thu" => DayOfWeek::Thursday,
            "friday" | "fri" => DayOfWeek::Friday,
            "saturday" | "sat" => DayOfWeek::Saturday,
            "sunday" | "sun" => DayOfWeek::Sunday,
            other => anyhow::bail!("Unknown day of week: {other}"),
        };
        Ok(day)
    }
}

/// Decode an availability value written in either legacy shape:
/// `["mon", "Friday"]` or `{"monday": true, "tuesday": ["9-12"], "sunday": false}`.
///
/// Returns sorted, deduplicated days.
pub fn days_from_json(value: &Value) -> anyhow::Result<Vec<DayOfWeek>> {
    let mut days = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.parse(),
                other => Err(anyhow::anyhow!("Availability entries must be day names, got {other}")),
            })
            .collect::<anyhow::Result<Vec<DayOfWeek>>>()?,
        Value::Object(map) => {
            let mut days = Vec::new();
            for (key, v) in map {
                let day: DayOfWeek = key.parse()?;
                if is_truthy(v) {
                    days.push(day);
                }
            }
            days
        }
        other => anyhow::bail!("Availability must be an array or an object, got {other}"),
    };
    days.sort();
    days.dedup();
    Ok(days)
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Object(_) => true,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Specialty {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct SetSpecialtiesRequest {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotInput {
    pub day_of_week: String,
    pub start_time: String, // "HH:MM" or "HH:MM:SS"
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAvailabilityRequest {
    pub slots: Vec<SlotInput>,
}
