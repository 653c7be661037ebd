//! Profile repository for document-style database access.
//!
//! The whole record lives in a single JSONB column; queries only ever
//! address it by uid or by the `signupNumber` key inside the document.

use std::collections::HashMap;

use serde_json::Value;
use sqlx::PgPool;

use prysm_core::{ProfileRecord, Uid};

use super::RepositoryError;

/// Repository for profile documents.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read a profile document by uid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored document
    /// does not decode as a profile record.
    pub async fn get(&self, uid: &Uid) -> Result<Option<ProfileRecord>, RepositoryError> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT doc FROM profile WHERE uid = $1")
            .bind(uid.as_str())
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some((doc,)) => Ok(Some(decode_doc(doc)?)),
            None => Ok(None),
        }
    }

    /// Create a profile document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a document already exists for
    /// the uid, and `RepositoryError::Database` for other failures.
    pub async fn create(&self, record: &ProfileRecord) -> Result<(), RepositoryError> {
        let doc = serde_json::to_value(record)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        sqlx::query("INSERT INTO profile (uid, doc) VALUES ($1, $2)")
            .bind(record.uid.as_str())
            .bind(&doc)
            .execute(self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return RepositoryError::Conflict("profile already exists".to_owned());
                }
                RepositoryError::Database(e)
            })?;

        Ok(())
    }

    /// Shallow-merge `patch` into the document and return the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no document exists for the
    /// uid, and `RepositoryError::Database`/`DataCorruption` otherwise.
    pub async fn merge(
        &self,
        uid: &Uid,
        patch: &Value,
    ) -> Result<ProfileRecord, RepositoryError> {
        let row: Option<(Value,)> =
            sqlx::query_as("UPDATE profile SET doc = doc || $2 WHERE uid = $1 RETURNING doc")
                .bind(uid.as_str())
                .bind(patch)
                .fetch_optional(self.pool)
                .await?;

        match row {
            Some((doc,)) => decode_doc(doc),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Current signup numbers for the given uids.
    ///
    /// Uids without a stored profile are absent from the result; callers
    /// distinguish "no profile" from "profile without a number".
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn signup_numbers(
        &self,
        uids: &[Uid],
    ) -> Result<HashMap<Uid, Option<u32>>, RepositoryError> {
        let keys: Vec<String> = uids.iter().map(|u| u.as_str().to_owned()).collect();

        let rows: Vec<(String, Option<i64>)> = sqlx::query_as(
            "SELECT uid, (doc ->> 'signupNumber')::bigint FROM profile WHERE uid = ANY($1)",
        )
        .bind(&keys)
        .fetch_all(self.pool)
        .await?;

        let mut numbers = HashMap::with_capacity(rows.len());
        for (uid, number) in rows {
            let uid = Uid::parse(&uid)
                .map_err(|e| RepositoryError::DataCorruption(format!("invalid uid: {e}")))?;
            numbers.insert(uid, number.and_then(|n| u32::try_from(n).ok()));
        }

        Ok(numbers)
    }

    /// Conditionally write a signup number into the document.
    ///
    /// The update is a no-op when the document already carries exactly this
    /// number, which is what makes re-running the seeding routine safe.
    /// Also flags the record as an early user.
    ///
    /// # Returns
    ///
    /// `true` if a row was written, `false` if the value was already
    /// correct or no profile exists for the uid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_signup_number(
        &self,
        uid: &Uid,
        number: u32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE profile
            SET doc = jsonb_set(
                jsonb_set(doc, '{signupNumber}', to_jsonb($2::bigint)),
                '{earlyUser}', 'true'::jsonb
            )
            WHERE uid = $1 AND (doc ->> 'signupNumber') IS DISTINCT FROM $3
            ",
        )
        .bind(uid.as_str())
        .bind(i64::from(number))
        .bind(number.to_string())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn decode_doc(doc: Value) -> Result<ProfileRecord, RepositoryError> {
    serde_json::from_value(doc)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid profile document: {e}")))
}
