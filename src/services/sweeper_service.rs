use sqlx::PgPool;
use tracing::info;

use crate::error::{Error, Result};

/// Cron expression for the nightly run, 03:00 server time.
pub const SWEEP_SCHEDULE: &str = "0 0 3 * * *";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub revoked: u64,
    pub purged: u64,
}

/// Nightly lifecycle sweep: paid offers whose window has lapsed lose
/// visibility, and unpaid offers past their grace period are removed
/// outright.
#[derive(Clone)]
pub struct OfferSweeper {
    pool: PgPool,
}

impl OfferSweeper {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_once(&self) -> Result<SweepOutcome> {
        let revoked = sqlx::query(
            "UPDATE offers SET is_paid = FALSE, updated_at = NOW() \
             WHERE is_paid = TRUE AND is_deleted = FALSE AND active_until <= NOW()",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::internal("Offer sweep failed", e))?
        .rows_affected();

        let purged = sqlx::query(
            "DELETE FROM offers \
             WHERE is_paid = FALSE AND expire_at IS NOT NULL AND expire_at <= NOW()",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::internal("Offer sweep failed", e))?
        .rows_affected();

        if revoked > 0 || purged > 0 {
            info!(revoked, purged, "Offer sweep applied changes");
        }
        Ok(SweepOutcome { revoked, purged })
    }
}
