use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::period::Period;
use crate::sequence::OrderIdentifier;

pub const DEFAULT_SHIRT_AMOUNT: f64 = 500.0;
pub const DEFAULT_PANT_AMOUNT: f64 = 400.0;
pub const DEFAULT_PAYMENT_METHOD: &str = "Cash";

/// Lifecycle of a tailoring order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Ready,
    Delivered,
    Completed,
}

impl OrderStatus {
    /// Returns the canonical database representation for the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Ready => "Ready",
            Self::Delivered => "Delivered",
            Self::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(Self::Pending),
            "In Progress" => Some(Self::InProgress),
            "Ready" => Some(Self::Ready),
            "Delivered" => Some(Self::Delivered),
            "Completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Order fields as submitted by the client.
///
/// Any `orderId` in the payload is ignored; identifiers are always issued by
/// the sequencer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company_id: Option<String>,
    #[serde(default)]
    pub no_of_sets: Option<u32>,
    #[serde(default)]
    pub shirt_amount: Option<f64>,
    #[serde(default)]
    pub pant_amount: Option<f64>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub shirt: Option<Value>,
    #[serde(default)]
    pub pant: Option<Value>,
}

/// Validated order contents, everything except the identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub company_id: Option<String>,
    pub no_of_sets: u32,
    pub shirt_amount: f64,
    pub pant_amount: f64,
    pub payment_method: String,
    pub shirt: Value,
    pub pant: Value,
}

impl OrderDraft {
    pub fn total_amount(&self) -> f64 {
        (self.shirt_amount + self.pant_amount) * f64::from(self.no_of_sets)
    }

    /// Overlays the fields present in `changes` and validates the result
    /// with the same rules as a new order.
    ///
    /// An empty `companyId` turns the order into a walk-in order.
    pub fn apply(&self, changes: NewOrderRequest) -> Result<Self, OrderValidationError> {
        Self::try_from(NewOrderRequest {
            name: changes.name.or_else(|| Some(self.name.clone())),
            phone: changes.phone.or_else(|| Some(self.phone.clone())),
            email: changes.email.or_else(|| Some(self.email.clone())),
            company_id: changes.company_id.or_else(|| self.company_id.clone()),
            no_of_sets: changes.no_of_sets.or(Some(self.no_of_sets)),
            shirt_amount: changes.shirt_amount.or(Some(self.shirt_amount)),
            pant_amount: changes.pant_amount.or(Some(self.pant_amount)),
            payment_method: changes
                .payment_method
                .or_else(|| Some(self.payment_method.clone())),
            shirt: changes.shirt.or_else(|| Some(self.shirt.clone())),
            pant: changes.pant.or_else(|| Some(self.pant.clone())),
        })
    }
}

impl TryFrom<NewOrderRequest> for OrderDraft {
    type Error = OrderValidationError;

    fn try_from(request: NewOrderRequest) -> Result<Self, Self::Error> {
        let name = required(request.name, "name")?;
        let phone = required(request.phone, "phone")?;
        let shirt_amount = amount(request.shirt_amount, DEFAULT_SHIRT_AMOUNT, "shirtAmount")?;
        let pant_amount = amount(request.pant_amount, DEFAULT_PANT_AMOUNT, "pantAmount")?;
        let no_of_sets = match request.no_of_sets {
            None | Some(0) => 1,
            Some(sets) => sets,
        };
        let payment_method = request
            .payment_method
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());
        let company_id = request
            .company_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            name,
            phone,
            email: request.email.unwrap_or_default().trim().to_string(),
            company_id,
            no_of_sets,
            shirt_amount,
            pant_amount,
            payment_method,
            shirt: measurements(request.shirt),
            pant: measurements(request.pant),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, OrderValidationError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(OrderValidationError::MissingField(field))
}

fn amount(
    value: Option<f64>,
    default: f64,
    field: &'static str,
) -> Result<f64, OrderValidationError> {
    match value {
        None => Ok(default),
        Some(value) if value.is_finite() && value >= 0.0 => Ok(value),
        Some(_) => Err(OrderValidationError::InvalidAmount(field)),
    }
}

fn measurements(value: Option<Value>) -> Value {
    match value {
        Some(Value::Object(map)) => Value::Object(map),
        _ => Value::Object(Default::default()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} must be a non-negative number")]
    InvalidAmount(&'static str),
}

/// Persisted order, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub order_id: OrderIdentifier,
    pub period: Period,
    pub name: String,
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub no_of_sets: u32,
    pub shirt_amount: f64,
    pub pant_amount: f64,
    pub total_amount: f64,
    pub payment_method: String,
    pub shirt: Value,
    pub pant: Value,
    pub status: OrderStatus,
    pub date: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_civil(&self) -> bool {
        self.company_id.is_none()
    }

    /// The editable contents of the order.
    pub fn draft(&self) -> OrderDraft {
        OrderDraft {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            company_id: self.company_id.clone(),
            no_of_sets: self.no_of_sets,
            shirt_amount: self.shirt_amount,
            pant_amount: self.pant_amount,
            payment_method: self.payment_method.clone(),
            shirt: self.shirt.clone(),
            pant: self.pant.clone(),
        }
    }
}
