use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{now_unix_secs, DealFilter, UserId};

use super::models::DealFilterRow;

pub async fn create_filter(pool: &SqlitePool, user_id: UserId, filter: &DealFilter) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let user_str = user_id.0.to_string();
    let categories = serde_json::to_string(&filter.categories)?;
    let now = now_unix_secs();

    sqlx::query!(
        r#"
        INSERT INTO deal_filters
            (id, user_id, categories, min_price, max_price, min_discount, max_discount,
             min_rating, active, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
        "#,
        id,
        user_str,
        categories,
        filter.min_price,
        filter.max_price,
        filter.min_discount,
        filter.max_discount,
        filter.min_rating,
        now,
    )
    .execute(pool)
    .await?;

    Ok(id)
}

/// Returns every filter with active=1, for the scheduler to evaluate against
/// freshly collected deals.
pub async fn active_filters(pool: &SqlitePool) -> Result<Vec<DealFilterRow>> {
    let rows = sqlx::query_as!(
        DealFilterRow,
        r#"
        SELECT id, user_id, categories, min_price, max_price, min_discount, max_discount,
               min_rating, active
        FROM deal_filters WHERE active = 1
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn deactivate_filter(pool: &SqlitePool, filter_id: &str) -> Result<()> {
    sqlx::query!("UPDATE deal_filters SET active = 0 WHERE id = ?", filter_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool;

    #[tokio::test]
    async fn active_filters_excludes_deactivated() {
        let db = pool::init("sqlite::memory:").await.unwrap();
        let user = UserId::new();
        let filter = DealFilter {
            id: String::new(),
            user_id: user,
            categories: vec!["Electronics".to_string()],
            min_price: Some(5.0),
            max_price: Some(200.0),
            min_discount: Some(20.0),
            max_discount: None,
            min_rating: Some(4.0),
            active: true,
        };
        let id = create_filter(&db, user, &filter).await.unwrap();

        assert_eq!(active_filters(&db).await.unwrap().len(), 1);
        deactivate_filter(&db, &id).await.unwrap();
        assert_eq!(active_filters(&db).await.unwrap().len(), 0);
    }
}
