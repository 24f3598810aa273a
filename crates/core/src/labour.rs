use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_LABOUR_STATUS: &str = "Active";

/// Trade a labour member is hired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabourCategory {
    Tailor,
    #[serde(rename = "Iron Master")]
    IronMaster,
    Embroider,
}

impl LabourCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tailor => "Tailor",
            Self::IronMaster => "Iron Master",
            Self::Embroider => "Embroider",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Tailor" => Some(Self::Tailor),
            "Iron Master" => Some(Self::IronMaster),
            "Embroider" => Some(Self::Embroider),
            _ => None,
        }
    }
}

/// Labour fields as submitted when adding someone to the roster.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLabourRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub specialist: Option<String>,
    /// Number or numeric string; empty, zero or null means unknown.
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub join_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Partial roster update. Absent fields are left alone; `age` and `photo`
/// may be cleared with an explicit `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabourChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub specialist: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub age: Option<Option<Value>>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub photo: Option<Option<String>>,
    #[serde(default)]
    pub join_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Validated roster entry, everything except identity and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabourDraft {
    pub name: String,
    pub category: LabourCategory,
    pub specialist: String,
    pub age: Option<u32>,
    pub phone: String,
    pub photo: Option<String>,
    /// Local `YYYY-MM-DD`.
    pub join_date: String,
    pub status: String,
}

impl LabourDraft {
    /// Validates a new roster entry. `today` is the join date when none is given.
    pub fn from_request(
        request: NewLabourRequest,
        today: &str,
    ) -> Result<Self, LabourValidationError> {
        let name = required(request.name, "name")?;
        let phone = required(request.phone, "phone")?;
        let specialist = required(request.specialist, "specialist")?;
        let category = category(request.category.as_deref())?;

        Ok(Self {
            name,
            category,
            specialist,
            age: age(request.age.as_ref())?,
            phone,
            photo: request.photo.filter(|photo| !photo.is_empty()),
            join_date: non_empty(request.join_date).unwrap_or_else(|| today.to_string()),
            status: non_empty(request.status)
                .unwrap_or_else(|| DEFAULT_LABOUR_STATUS.to_string()),
        })
    }

    pub fn apply(&self, changes: LabourChanges) -> Result<Self, LabourValidationError> {
        let mut next = self.clone();
        if let Some(name) = changes.name {
            next.name = required(Some(name), "name")?;
        }
        if let Some(phone) = changes.phone {
            next.phone = required(Some(phone), "phone")?;
        }
        if let Some(specialist) = changes.specialist {
            next.specialist = required(Some(specialist), "specialist")?;
        }
        if let Some(value) = changes.category {
            next.category = category(Some(&value))?;
        }
        if let Some(value) = changes.age {
            next.age = age(value.as_ref())?;
        }
        if let Some(photo) = changes.photo {
            next.photo = photo.filter(|photo| !photo.is_empty());
        }
        if let Some(join_date) = non_empty(changes.join_date) {
            next.join_date = join_date;
        }
        if let Some(status) = non_empty(changes.status) {
            next.status = status;
        }
        Ok(next)
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, LabourValidationError> {
    non_empty(value).ok_or(LabourValidationError::MissingField(field))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn category(value: Option<&str>) -> Result<LabourCategory, LabourValidationError> {
    value
        .and_then(LabourCategory::parse)
        .ok_or(LabourValidationError::InvalidCategory)
}

/// Whole years from a number or the leading digits of a string. Falsy input
/// (null, 0, empty string) means the age is unknown.
fn age(value: Option<&Value>) -> Result<Option<u32>, LabourValidationError> {
    let years = match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => return Ok(None),
        Some(Value::Number(number)) => number
            .as_f64()
            .filter(|years| years.is_finite() && *years >= 0.0)
            .map(|years| years.trunc() as u64),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
        Some(Value::String(text)) => {
            let digits: String = text
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse::<u64>().ok()
        }
        Some(_) => None,
    };

    match years {
        Some(0) => Ok(None),
        Some(years) => u32::try_from(years)
            .map(Some)
            .map_err(|_| LabourValidationError::InvalidAge),
        None => Err(LabourValidationError::InvalidAge),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabourValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("category must be one of Tailor, Iron Master or Embroider")]
    InvalidCategory,
    #[error("age must be a whole number of years")]
    InvalidAge,
}

/// Persisted roster entry, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Labour {
    pub id: String,
    pub name: String,
    pub category: LabourCategory,
    pub specialist: String,
    pub age: Option<u32>,
    pub phone: String,
    pub photo: Option<String>,
    pub join_date: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Labour {
    pub fn draft(&self) -> LabourDraft {
        LabourDraft {
            name: self.name.clone(),
            category: self.category,
            specialist: self.specialist.clone(),
            age: self.age,
            phone: self.phone.clone(),
            photo: self.photo.clone(),
            join_date: self.join_date.clone(),
            status: self.status.clone(),
        }
    }
}
