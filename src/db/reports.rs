use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::types::now_unix_secs;

pub async fn create_report(pool: &SqlitePool, filter_id: &str, payload: &serde_json::Value) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let payload_str = serde_json::to_string(payload)?;
    let now = now_unix_secs();

    sqlx::query!(
        r#"INSERT INTO deal_reports (id, filter_id, payload, generated_at, sent_at)
           VALUES (?, ?, ?, ?, NULL)"#,
        id,
        filter_id,
        payload_str,
        now,
    )
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn mark_report_sent(pool: &SqlitePool, report_id: &str) -> Result<()> {
    let now = now_unix_secs();
    sqlx::query!(
        "UPDATE deal_reports SET sent_at = ? WHERE id = ?",
        now,
        report_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool;

    #[tokio::test]
    async fn create_then_mark_sent() {
        let db = pool::init("sqlite::memory:").await.unwrap();
        let payload = serde_json::json!({"deals": []});
        let id = create_report(&db, "filter-1", &payload).await.unwrap();
        mark_report_sent(&db, &id).await.unwrap();
    }
}
