use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

/// Current balance for a user, `None` if no credit row exists
pub async fn get_credits(pool: &PgPool, user_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    let row = sqlx::query("SELECT credits FROM user_credits WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| r.try_get("credits")).transpose()
}

/// Deduct one credit, guarded in SQL so a concurrent submission can never
/// drive the balance negative.
///
/// Returns the remaining balance, or `None` if the balance was already
/// below 1 (no row is touched in that case).
pub async fn deduct_credit(pool: &PgPool, user_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE user_credits
        SET credits = credits - 1,
            updated_at = NOW()
        WHERE user_id = $1 AND credits >= 1
        RETURNING credits
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| r.try_get("credits")).transpose()
}

/// Refund one credit, returning the new balance.
///
/// Generic over the executor so it can run inside the failed-job transition
/// transaction as well as standalone.
pub async fn refund_credit<'e, E>(executor: E, user_id: Uuid) -> Result<Option<i32>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(
        r#"
        UPDATE user_credits
        SET credits = credits + 1,
            updated_at = NOW()
        WHERE user_id = $1
        RETURNING credits
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    row.map(|r| r.try_get("credits")).transpose()
}
