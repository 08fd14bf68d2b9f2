use serde::{Deserialize, Serialize};

pub const MAX_GOALS: usize = 3;

/// Self-reported activity, five buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very_active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sedentary" => Some(ActivityLevel::Sedentary),
            "light" => Some(ActivityLevel::Light),
            "moderate" => Some(ActivityLevel::Moderate),
            "active" => Some(ActivityLevel::Active),
            "very_active" => Some(ActivityLevel::VeryActive),
            _ => None,
        }
    }
}

/// Wholesale profile payload; PUT replaces the whole document.
#[derive(Debug, Deserialize)]
pub struct PutProfileRequest {
    pub age: Option<i32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    #[serde(default)]
    pub goals: Vec<String>,
    pub diet: Option<String>,
    pub conditions: Option<String>,
    pub allergies: Option<String>,
    pub supplements: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub age: Option<i32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goals: Vec<String>,
    pub diet: Option<String>,
    pub conditions: Option<String>,
    pub allergies: Option<String>,
    pub supplements: Option<String>,
    /// Derived: the profile counts as complete once age is filled in.
    pub complete: bool,
}

impl From<crate::profile::repo::HealthProfile> for ProfileResponse {
    fn from(p: crate::profile::repo::HealthProfile) -> Self {
        let complete = p.is_complete();
        Self {
            age: p.age,
            sex: p.sex,
            height_cm: p.height_cm,
            weight_kg: p.weight_kg,
            activity_level: p.activity_level.as_deref().and_then(ActivityLevel::parse),
            goals: p.goals.0,
            diet: p.diet,
            conditions: p.conditions,
            allergies: p.allergies,
            supplements: p.supplements,
            complete,
        }
    }
}
