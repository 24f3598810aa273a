use std::{cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::period::Period;

/// Sentinel key of the single counter row.
pub const ORDER_COUNTER_KEY: &str = "order_counter";

const ORDER_ID_PREFIX: &str = "ORD";

/// Human readable order identifier (`ORD001`, `ORD002`, ..., `ORD1000`).
///
/// Only unique within the period it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderIdentifier(u64);

impl OrderIdentifier {
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    pub fn count(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ORDER_ID_PREFIX}{:03}", self.0)
    }
}

impl FromStr for OrderIdentifier {
    type Err = OrderIdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value
            .strip_prefix(ORDER_ID_PREFIX)
            .filter(|digits| digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| OrderIdentifierError(value.to_string()))?;
        digits
            .parse()
            .map(Self)
            .map_err(|_| OrderIdentifierError(value.to_string()))
    }
}

impl Serialize for OrderIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OrderIdentifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a valid order identifier: {0}")]
pub struct OrderIdentifierError(String);

/// Persisted state of the order counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterState {
    pub period: Period,
    pub count: u64,
    pub last_reset_at: DateTime<Utc>,
}

/// Outcome of [`plan_next`]: where the next identifier falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextIssue {
    pub period: Period,
    pub count: u64,
    /// The stored period is older than the current one and numbering restarts.
    pub resets: bool,
    /// The clock reports a month earlier than the stored one.
    pub clock_behind: bool,
}

impl NextIssue {
    pub fn identifier(&self) -> OrderIdentifier {
        OrderIdentifier(self.count)
    }
}

/// Decides the next identifier given the stored counter and the current month.
///
/// The preview evaluates it directly and the storage upsert applies the same
/// rules in one statement. A current month earlier than the stored one never
/// rolls the counter back; numbering continues in the stored month.
pub fn plan_next(stored: Option<&CounterState>, current: Period) -> NextIssue {
    let Some(state) = stored else {
        return NextIssue {
            period: current,
            count: 1,
            resets: false,
            clock_behind: false,
        };
    };

    match current.cmp(&state.period) {
        Ordering::Greater => NextIssue {
            period: current,
            count: 1,
            resets: true,
            clock_behind: false,
        },
        Ordering::Equal => NextIssue {
            period: state.period,
            count: state.count + 1,
            resets: false,
            clock_behind: false,
        },
        Ordering::Less => NextIssue {
            period: state.period,
            count: state.count + 1,
            resets: false,
            clock_behind: true,
        },
    }
}

/// Read-only view of what the next issuance would return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencePreview {
    pub identifier: OrderIdentifier,
    pub period_will_reset: bool,
    pub period: Period,
}

impl From<NextIssue> for SequencePreview {
    fn from(next: NextIssue) -> Self {
        Self {
            identifier: next.identifier(),
            period_will_reset: next.resets,
            period: next.period,
        }
    }
}

/// Identifier handed out by the sequencer together with the month it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedIdentifier {
    pub identifier: OrderIdentifier,
    pub period: Period,
    pub reset: bool,
}
