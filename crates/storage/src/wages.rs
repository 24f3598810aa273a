use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use tailor_core::wages::WageRates;

use crate::to_rfc3339;

const WAGE_CONFIG_ID: &str = "default";

/// Repository for the shop-wide wage rate configuration.
#[derive(Clone)]
pub struct WageRepository {
    pool: SqlitePool,
}

impl WageRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Loads the configured rates, falling back to the defaults.
    pub async fn fetch(&self) -> Result<WageRates, WageError> {
        let row = sqlx::query(
            "SELECT pant, shirt, ironing_pant, ironing_shirt, embroidery FROM wage_rates WHERE id = ?",
        )
        .bind(WAGE_CONFIG_ID)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|row| WageRates {
                pant: row.get("pant"),
                shirt: row.get("shirt"),
                ironing_pant: row.get("ironing_pant"),
                ironing_shirt: row.get("ironing_shirt"),
                embroidery: row.get("embroidery"),
            })
            .unwrap_or_default())
    }

    /// Replaces every rate at once.
    pub async fn replace(
        &self,
        rates: &WageRates,
        updated_at: DateTime<Utc>,
    ) -> Result<WageRates, WageError> {
        rates
            .validate()
            .map_err(|err| WageError::Invalid(err.to_string()))?;

        let timestamp = to_rfc3339(updated_at);
        sqlx::query(
            "INSERT INTO wage_rates (id, pant, shirt, ironing_pant, ironing_shirt, embroidery, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                 pant = excluded.pant, \
                 shirt = excluded.shirt, \
                 ironing_pant = excluded.ironing_pant, \
                 ironing_shirt = excluded.ironing_shirt, \
                 embroidery = excluded.embroidery, \
                 updated_at = excluded.updated_at",
        )
        .bind(WAGE_CONFIG_ID)
        .bind(rates.pant)
        .bind(rates.shirt)
        .bind(rates.ironing_pant)
        .bind(rates.ironing_shirt)
        .bind(rates.embroidery)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;

        Ok(*rates)
    }

    /// Restores the default rates.
    pub async fn reset(&self, updated_at: DateTime<Utc>) -> Result<WageRates, WageError> {
        self.replace(&WageRates::default(), updated_at).await
    }
}

#[derive(Debug, Error)]
pub enum WageError {
    #[error("invalid wage rates: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;

    #[tokio::test]
    async fn fetch_returns_defaults_when_unset() {
        let test_db = setup_db().await;
        let rates = test_db.db.wages().fetch().await.expect("fetch");
        assert_eq!(rates, WageRates::default());
    }

    #[tokio::test]
    async fn replace_then_reset() {
        let test_db = setup_db().await;
        let repo = test_db.db.wages();
        let custom = WageRates {
            pant: 120.0,
            embroidery: 30.0,
            ..WageRates::default()
        };

        repo.replace(&custom, Utc::now()).await.expect("replace");
        assert_eq!(repo.fetch().await.expect("fetch"), custom);

        repo.reset(Utc::now()).await.expect("reset");
        assert_eq!(repo.fetch().await.expect("fetch"), WageRates::default());
    }

    #[tokio::test]
    async fn replace_rejects_negative_rates() {
        let test_db = setup_db().await;
        let repo = test_db.db.wages();
        let invalid = WageRates {
            shirt: -10.0,
            ..WageRates::default()
        };

        let err = repo.replace(&invalid, Utc::now()).await.unwrap_err();
        assert!(matches!(err, WageError::Invalid(_)));
        assert_eq!(repo.fetch().await.expect("fetch"), WageRates::default());
    }
}
