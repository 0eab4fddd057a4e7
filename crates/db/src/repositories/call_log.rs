use chrono::{DateTime, Utc};
use sqlx::Row;

use horizon_core::domain::call_log::{CallLog, CallLogId, CallOutcome};

use super::{decode_error, CallLogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCallLogRepository {
    pool: DbPool,
}

impl SqlCallLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_call_log(row: &sqlx::sqlite::SqliteRow) -> Result<CallLog, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let caller_phone: String = row.try_get("caller_phone").map_err(decode_error)?;
    let duration_secs: i64 = row.try_get("duration_secs").map_err(decode_error)?;
    let outcome: String = row.try_get("outcome").map_err(decode_error)?;
    let transcript: Option<String> = row.try_get("transcript").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;

    Ok(CallLog {
        id: CallLogId(id),
        caller_phone,
        duration_secs: u32::try_from(duration_secs).map_err(decode_error)?,
        outcome: CallOutcome::parse(&outcome),
        transcript,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl CallLogRepository for SqlCallLogRepository {
    async fn list_latest(&self, limit: u32) -> Result<Vec<CallLog>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, caller_phone, duration_secs, outcome, transcript, created_at
             FROM call_logs
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_call_log).collect()
    }

    async fn record(&self, call: CallLog) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO call_logs (id, caller_phone, duration_secs, outcome, transcript, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&call.id.0)
        .bind(&call.caller_phone)
        .bind(i64::from(call.duration_secs))
        .bind(call.outcome.as_str())
        .bind(&call.transcript)
        .bind(call.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use horizon_core::domain::call_log::{CallLog, CallOutcome};

    use super::SqlCallLogRepository;
    use crate::repositories::CallLogRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn records_and_lists_newest_first_with_limit() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlCallLogRepository::new(pool);

        let mut older = CallLog::initiated("+14155551234");
        older.created_at = Utc::now() - Duration::minutes(10);
        older.outcome = CallOutcome::Other("transferred".to_string());
        let newer = CallLog::initiated("+14155555678");

        repo.record(older.clone()).await.expect("record older");
        repo.record(newer.clone()).await.expect("record newer");

        let recent = repo.list_latest(1).await.expect("list");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].caller_phone, "+14155555678");

        let all = repo.list_latest(10).await.expect("list");
        assert_eq!(all[1].outcome, CallOutcome::Other("transferred".to_string()));
    }
}
