use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-unit wage rates paid to labour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WageRates {
    pub pant: f64,
    pub shirt: f64,
    pub ironing_pant: f64,
    pub ironing_shirt: f64,
    pub embroidery: f64,
}

impl Default for WageRates {
    fn default() -> Self {
        Self {
            pant: 110.0,
            shirt: 100.0,
            ironing_pant: 12.0,
            ironing_shirt: 10.0,
            embroidery: 25.0,
        }
    }
}

impl WageRates {
    /// Rejects negative or non-finite rates.
    pub fn validate(&self) -> Result<(), WageValidationError> {
        let fields = [
            ("pant", self.pant),
            ("shirt", self.shirt),
            ("ironing_pant", self.ironing_pant),
            ("ironing_shirt", self.ironing_shirt),
            ("embroidery", self.embroidery),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(WageValidationError::InvalidRate(name));
            }
        }
        Ok(())
    }

    /// Standard rate for a work type. Ironing is paid at the pant ironing rate.
    pub fn rate_for(&self, work_type: WorkType) -> f64 {
        match work_type {
            WorkType::Pant => self.pant,
            WorkType::Shirt => self.shirt,
            WorkType::Ironing => self.ironing_pant,
            WorkType::Embroidery => self.embroidery,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkType {
    Pant,
    Shirt,
    Ironing,
    Embroidery,
}

impl WorkType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pant => "Pant",
            Self::Shirt => "Shirt",
            Self::Ironing => "Ironing",
            Self::Embroidery => "Embroidery",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pant" => Some(Self::Pant),
            "Shirt" => Some(Self::Shirt),
            "Ironing" => Some(Self::Ironing),
            "Embroidery" => Some(Self::Embroidery),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "Assigned",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Assigned" => Some(Self::Assigned),
            "InProgress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Wages owed for one assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WageQuote {
    pub wage_per_unit: f64,
    pub total_wages: f64,
}

/// Computes wages for `quantity` units of `work_type`.
///
/// A non-zero custom wage overrides the configured rate.
pub fn quote(
    rates: &WageRates,
    work_type: WorkType,
    quantity: u32,
    custom_wage: Option<f64>,
) -> WageQuote {
    let wage_per_unit = match custom_wage {
        Some(custom) if custom != 0.0 => custom,
        _ => rates.rate_for(work_type),
    };
    WageQuote {
        wage_per_unit,
        total_wages: wage_per_unit * f64::from(quantity),
    }
}

/// Work assignment payload as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignmentRequest {
    #[serde(default)]
    pub labour_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub work_type: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub custom_wage: Option<f64>,
    #[serde(default)]
    pub order_customer_name: Option<String>,
    #[serde(default)]
    pub order_date: Option<String>,
}

/// Validated assignment with wages fixed at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentDraft {
    pub labour_id: String,
    pub order_id: String,
    pub work_type: WorkType,
    pub quantity: u32,
    pub custom_wage: Option<f64>,
    pub quote: WageQuote,
    pub order_customer_name: String,
    pub order_date: Option<String>,
}

impl AssignmentDraft {
    pub fn build(
        request: NewAssignmentRequest,
        rates: &WageRates,
    ) -> Result<Self, WageValidationError> {
        let labour_id = non_empty(request.labour_id).ok_or(WageValidationError::MissingField("labourId"))?;
        let order_id = non_empty(request.order_id).ok_or(WageValidationError::MissingField("orderId"))?;
        let raw_type = non_empty(request.work_type).ok_or(WageValidationError::MissingField("workType"))?;
        let work_type =
            WorkType::parse(&raw_type).ok_or(WageValidationError::InvalidWorkType(raw_type))?;
        let quantity = request
            .quantity
            .ok_or(WageValidationError::MissingField("quantity"))?;
        if let Some(custom) = request.custom_wage {
            if !custom.is_finite() || custom < 0.0 {
                return Err(WageValidationError::InvalidRate("customWage"));
            }
        }
        let custom_wage = request.custom_wage.filter(|custom| *custom != 0.0);

        Ok(Self {
            labour_id,
            order_id,
            work_type,
            quantity,
            custom_wage,
            quote: quote(rates, work_type, quantity, custom_wage),
            order_customer_name: request.order_customer_name.unwrap_or_default(),
            order_date: non_empty(request.order_date),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Persisted work assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkAssignment {
    pub id: String,
    pub labour_id: String,
    pub order_id: String,
    pub work_type: WorkType,
    pub quantity: u32,
    pub wage_per_unit: f64,
    pub total_wages: f64,
    pub custom_wage: Option<f64>,
    pub order_customer_name: String,
    pub order_date: String,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregated wages for one labour member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabourSummary {
    pub total_assignments: usize,
    pub completed_assignments: usize,
    pub total_wages: f64,
    pub total_quantity: u64,
    pub assignments: Vec<WorkAssignment>,
}

impl LabourSummary {
    pub fn from_assignments(assignments: Vec<WorkAssignment>) -> Self {
        Self {
            total_assignments: assignments.len(),
            completed_assignments: assignments
                .iter()
                .filter(|a| a.status == AssignmentStatus::Completed)
                .count(),
            total_wages: assignments.iter().fold(0.0, |sum, a| sum + a.total_wages),
            total_quantity: assignments.iter().map(|a| u64::from(a.quantity)).sum(),
            assignments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WageValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("invalid work type {0}; must be one of Pant, Shirt, Ironing, Embroidery")]
    InvalidWorkType(String),
    #[error("{0} must be a non-negative number")]
    InvalidRate(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> NewAssignmentRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn standard_rates_drive_wages() {
        let rates = WageRates::default();
        let quote = quote(&rates, WorkType::Pant, 3, None);
        assert_eq!(quote.wage_per_unit, 110.0);
        assert_eq!(quote.total_wages, 330.0);
    }

    #[test]
    fn ironing_uses_pant_ironing_rate() {
        let rates = WageRates::default();
        assert_eq!(quote(&rates, WorkType::Ironing, 5, None).total_wages, 60.0);
    }

    #[test]
    fn custom_wage_overrides_unless_zero() {
        let rates = WageRates::default();
        assert_eq!(quote(&rates, WorkType::Shirt, 2, Some(130.0)).total_wages, 260.0);
        assert_eq!(quote(&rates, WorkType::Shirt, 2, Some(0.0)).wage_per_unit, 100.0);
    }

    #[test]
    fn rejects_negative_rates() {
        let rates = WageRates {
            embroidery: -1.0,
            ..WageRates::default()
        };
        assert_eq!(
            rates.validate(),
            Err(WageValidationError::InvalidRate("embroidery"))
        );
        assert!(WageRates::default().validate().is_ok());
    }

    #[test]
    fn draft_requires_known_work_type() {
        let err = AssignmentDraft::build(
            request(json!({
                "labourId": "l-1",
                "orderId": "ORD001",
                "workType": "Hemming",
                "quantity": 1,
            })),
            &WageRates::default(),
        )
        .unwrap_err();
        assert_eq!(err, WageValidationError::InvalidWorkType("Hemming".into()));
    }

    #[test]
    fn draft_requires_quantity() {
        let err = AssignmentDraft::build(
            request(json!({
                "labourId": "l-1",
                "orderId": "ORD001",
                "workType": "Pant",
            })),
            &WageRates::default(),
        )
        .unwrap_err();
        assert_eq!(err, WageValidationError::MissingField("quantity"));
    }

    #[test]
    fn draft_fixes_quote_from_rates() {
        let rates = WageRates {
            embroidery: 30.0,
            ..WageRates::default()
        };
        let draft = AssignmentDraft::build(
            request(json!({
                "labourId": "l-1",
                "orderId": "ORD002",
                "workType": "Embroidery",
                "quantity": 4,
            })),
            &rates,
        )
        .unwrap();
        assert_eq!(draft.quote.total_wages, 120.0);
        assert_eq!(draft.custom_wage, None);
    }

    fn assignment(quantity: u32, total_wages: f64, status: AssignmentStatus) -> WorkAssignment {
        let at = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 3, 14, 9, 0, 0).unwrap();
        WorkAssignment {
            id: format!("a-{quantity}"),
            labour_id: "l-1".into(),
            order_id: "ORD001".into(),
            work_type: WorkType::Shirt,
            quantity,
            wage_per_unit: total_wages / f64::from(quantity),
            total_wages,
            custom_wage: None,
            order_customer_name: String::new(),
            order_date: "2025-03-14".into(),
            assigned_at: at,
            status,
            completed_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn summary_counts_completed_and_totals() {
        let summary = LabourSummary::from_assignments(vec![
            assignment(2, 200.0, AssignmentStatus::Completed),
            assignment(3, 300.0, AssignmentStatus::InProgress),
            assignment(1, 100.0, AssignmentStatus::Completed),
        ]);
        assert_eq!(summary.total_assignments, 3);
        assert_eq!(summary.completed_assignments, 2);
        assert_eq!(summary.total_wages, 600.0);
        assert_eq!(summary.total_quantity, 6);
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let summary = LabourSummary::from_assignments(Vec::new());
        assert_eq!(summary.total_assignments, 0);
        assert_eq!(summary.total_wages, 0.0);
        assert!(summary.assignments.is_empty());
    }
}
