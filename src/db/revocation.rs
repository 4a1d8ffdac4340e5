//! Revocation registry for token ids.
//!
//! An access/refresh pair shares one `jti`, so a row here invalidates both
//! tokens of the pair. Rows carry the token's own expiry and are purged once
//! the token could no longer verify anyway.

use sqlx::sqlite::SqlitePool;

/// Why a token id was added to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    /// Explicit logout.
    Logout,
    /// Refresh token already exchanged for a new pair.
    Consumed,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::Logout => "logout",
            RevocationReason::Consumed => "consumed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "logout" => Some(RevocationReason::Logout),
            "consumed" => Some(RevocationReason::Consumed),
            _ => None,
        }
    }
}

pub struct RevocationStore {
    pool: SqlitePool,
}

impl RevocationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mark `jti` as revoked. Revoking an already revoked id is a no-op.
    pub async fn revoke(&self, jti: &str, expires_at: u64) -> Result<(), sqlx::Error> {
        self.insert(jti, RevocationReason::Logout, expires_at).await?;
        Ok(())
    }

    /// Atomically check and mark `jti` as used.
    ///
    /// Returns `false` if the id was already consumed or revoked, in which
    /// case the caller is looking at a replay.
    pub async fn consume(&self, jti: &str, expires_at: u64) -> Result<bool, sqlx::Error> {
        self.insert(jti, RevocationReason::Consumed, expires_at)
            .await
    }

    async fn insert(
        &self,
        jti: &str,
        reason: RevocationReason,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (jti, reason, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(jti) DO NOTHING",
        )
        .bind(jti)
        .bind(reason.as_str())
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, sqlx::Error> {
        Ok(self.reason(jti).await?.is_some())
    }

    /// The reason `jti` was revoked, if it was.
    pub async fn reason(&self, jti: &str) -> Result<Option<RevocationReason>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT reason FROM revoked_tokens WHERE jti = ?")
                .bind(jti)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(reason,)| RevocationReason::from_str(&reason)))
    }

    /// Delete entries whose token has already expired.
    pub async fn purge_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= ?")
            .bind(now as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
