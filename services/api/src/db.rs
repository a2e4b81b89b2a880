//! Data Access Layer
//!
//! This module contains all the functions for interacting with the PostgreSQL database:
//! learner profiles, per-session text logs and the usage log.

use anyhow::Result;
use sqlx::PgPool;

use crate::models::{
    CreateUserPayload, SeUser, TextLog, USAGE_SUMMARY_LIMIT, UpdateUserPayload, UsageEntry,
};

const USER_COLUMNS: &str =
    "uid, first_name, last_name, grade_level, group_ids, language, preferred_type, created_at";
const TEXT_LOG_COLUMNS: &str = "id, uid, session_id, timestamp, text_type, text_content";

/// One row for the usage log.
#[derive(Debug, Clone)]
pub struct NewUsage<'a> {
    pub uid: &'a str,
    pub service_type: &'a str,
    pub grade_level: Option<i32>,
    pub essay_type: Option<&'a str>,
    pub word_count: Option<i32>,
}

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts a new profile. Returns `None` if a profile with this uid already exists.
    pub async fn create_user(&self, uid: &str, payload: &CreateUserPayload) -> Result<Option<SeUser>> {
        let sql = format!(
            r#"
            INSERT INTO se_users (uid, first_name, last_name, grade_level, group_ids, language, preferred_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (uid) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, SeUser>(&sql)
            .bind(uid)
            .bind(&payload.first_name)
            .bind(&payload.last_name)
            .bind(payload.grade_level)
            .bind(&payload.group_ids)
            .bind(&payload.language)
            .bind(&payload.preferred_type)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, uid: &str) -> Result<Option<SeUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM se_users WHERE uid = $1");
        let user = sqlx::query_as::<_, SeUser>(&sql)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Applies the fields present in `payload`, leaving the rest untouched.
    pub async fn update_user(
        &self,
        uid: &str,
        payload: &UpdateUserPayload,
    ) -> Result<Option<SeUser>> {
        let sql = format!(
            r#"
            UPDATE se_users
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                grade_level = COALESCE($4, grade_level),
                group_ids = COALESCE($5, group_ids),
                language = COALESCE($6, language),
                preferred_type = COALESCE($7, preferred_type)
            WHERE uid = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, SeUser>(&sql)
            .bind(uid)
            .bind(payload.first_name.as_deref())
            .bind(payload.last_name.as_deref())
            .bind(payload.grade_level)
            .bind(payload.group_ids.as_deref())
            .bind(payload.language.as_deref())
            .bind(payload.preferred_type.as_deref())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Deletes a profile. Returns `false` if there was nothing to delete.
    pub async fn delete_user(&self, uid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM se_users WHERE uid = $1")
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Appends a text log entry to a session.
    pub async fn add_text_log(
        &self,
        uid: &str,
        session_id: &str,
        text_type: &str,
        text_content: &str,
    ) -> Result<TextLog> {
        let sql = format!(
            r#"
            INSERT INTO textlog (uid, session_id, text_type, text_content)
            VALUES ($1, $2, $3, $4)
            RETURNING {TEXT_LOG_COLUMNS}
            "#
        );
        let log = sqlx::query_as::<_, TextLog>(&sql)
            .bind(uid)
            .bind(session_id)
            .bind(text_type)
            .bind(text_content)
            .fetch_one(&self.pool)
            .await?;
        Ok(log)
    }

    /// Retrieves a session's text logs, ordered chronologically, optionally filtered by type.
    pub async fn get_session_text_logs(
        &self,
        uid: &str,
        session_id: &str,
        text_type: Option<&str>,
    ) -> Result<Vec<TextLog>> {
        let sql = format!(
            r#"
            SELECT {TEXT_LOG_COLUMNS}
            FROM textlog
            WHERE uid = $1 AND session_id = $2 AND ($3::TEXT IS NULL OR text_type = $3)
            ORDER BY timestamp ASC, id ASC
            "#
        );
        let logs = sqlx::query_as::<_, TextLog>(&sql)
            .bind(uid)
            .bind(session_id)
            .bind(text_type)
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    /// Retrieves a learner's most recent text logs across all sessions, newest first.
    pub async fn get_latest_text_logs(&self, uid: &str, limit: i64) -> Result<Vec<TextLog>> {
        let sql = format!(
            r#"
            SELECT {TEXT_LOG_COLUMNS}
            FROM textlog
            WHERE uid = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#
        );
        let logs = sqlx::query_as::<_, TextLog>(&sql)
            .bind(uid)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    /// Writes a text log with an explicit timestamp. Used by the admin tool to seed data.
    pub async fn insert_text_log_at(
        &self,
        uid: &str,
        session_id: &str,
        timestamp: chrono::DateTime<chrono::Utc>,
        text_type: &str,
        text_content: &str,
    ) -> Result<TextLog> {
        let sql = format!(
            r#"
            INSERT INTO textlog (uid, session_id, timestamp, text_type, text_content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TEXT_LOG_COLUMNS}
            "#
        );
        let log = sqlx::query_as::<_, TextLog>(&sql)
            .bind(uid)
            .bind(session_id)
            .bind(timestamp)
            .bind(text_type)
            .bind(text_content)
            .fetch_one(&self.pool)
            .await?;
        Ok(log)
    }

    /// Retrieves the newest text logs across all learners.
    pub async fn get_recent_text_logs(&self, limit: i64) -> Result<Vec<TextLog>> {
        let sql = format!(
            "SELECT {TEXT_LOG_COLUMNS} FROM textlog ORDER BY timestamp DESC, id DESC LIMIT $1"
        );
        let logs = sqlx::query_as::<_, TextLog>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(logs)
    }

    pub async fn log_usage(&self, usage: &NewUsage<'_>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO se_usage_logs (uid, service_type, grade_level, essay_type, word_count)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(usage.uid)
        .bind(usage.service_type)
        .bind(usage.grade_level)
        .bind(usage.essay_type)
        .bind(usage.word_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Retrieves the latest usage entries for a learner, newest first.
    pub async fn fetch_usage_summary(&self, uid: &str) -> Result<Vec<UsageEntry>> {
        let entries = sqlx::query_as::<_, UsageEntry>(
            r#"
            SELECT timestamp, service_type, grade_level, essay_type, word_count
            FROM se_usage_logs
            WHERE uid = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(uid)
        .bind(USAGE_SUMMARY_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
