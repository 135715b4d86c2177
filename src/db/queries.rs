use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::credit_queries;
use crate::models::job::{JobStatus, RestorationJob};

const JOB_COLUMNS: &str = "id, user_id, replicate_job_id, original_filename, original_image_url, \
                           restored_image_url, status, error, credits_used, created_at, completed_at";

fn job_from_row(row: &PgRow) -> Result<RestorationJob, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    Ok(RestorationJob {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        replicate_job_id: row.try_get("replicate_job_id")?,
        original_filename: row.try_get("original_filename")?,
        original_image_url: row.try_get("original_image_url")?,
        restored_image_url: row.try_get("restored_image_url")?,
        status: JobStatus::from_str(&status_str),
        error: row.try_get("error")?,
        credits_used: row.try_get("credits_used")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// Insert a new restoration job in `processing` state
pub async fn insert_processing(
    pool: &PgPool,
    user_id: Uuid,
    replicate_job_id: &str,
    original_filename: &str,
    original_image_url: &str,
) -> Result<RestorationJob, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO photo_restorations
            (user_id, replicate_job_id, original_filename, original_image_url, status)
        VALUES ($1, $2, $3, $4, 'processing')
        RETURNING {JOB_COLUMNS}
        "#,
    ))
    .bind(user_id)
    .bind(replicate_job_id)
    .bind(original_filename)
    .bind(original_image_url)
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Insert an immediately-completed job (test mode)
pub async fn insert_completed(
    pool: &PgPool,
    user_id: Uuid,
    replicate_job_id: &str,
    original_filename: &str,
    original_image_url: &str,
    restored_image_url: &str,
) -> Result<RestorationJob, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO photo_restorations
            (user_id, replicate_job_id, original_filename, original_image_url,
             restored_image_url, status, completed_at)
        VALUES ($1, $2, $3, $4, $5, 'completed', NOW())
        RETURNING {JOB_COLUMNS}
        "#,
    ))
    .bind(user_id)
    .bind(replicate_job_id)
    .bind(original_filename)
    .bind(original_image_url)
    .bind(restored_image_url)
    .fetch_one(pool)
    .await?;

    job_from_row(&row)
}

/// Get a job by its Replicate prediction id
pub async fn get_job_by_prediction(
    pool: &PgPool,
    replicate_job_id: &str,
) -> Result<Option<RestorationJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM photo_restorations
        WHERE replicate_job_id = $1
        "#,
    ))
    .bind(replicate_job_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Get a job by prediction id, scoped to its owner
pub async fn get_user_job(
    pool: &PgPool,
    user_id: Uuid,
    replicate_job_id: &str,
) -> Result<Option<RestorationJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM photo_restorations
        WHERE replicate_job_id = $1 AND user_id = $2
        "#,
    ))
    .bind(replicate_job_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Recent jobs for a user, newest first
pub async fn list_user_jobs(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<RestorationJob>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM photo_restorations
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Transition a job from `processing` to `completed`, recording the restored
/// image URL. The status guard makes webhook re-delivery a no-op.
///
/// Returns the job's `created_at` if this call won the transition, `None` if
/// the row was missing or already terminal.
pub async fn complete_job(
    pool: &PgPool,
    replicate_job_id: &str,
    restored_image_url: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE photo_restorations
        SET status = 'completed',
            restored_image_url = $2,
            completed_at = NOW()
        WHERE replicate_job_id = $1 AND status = 'processing'
        RETURNING created_at
        "#,
    )
    .bind(replicate_job_id)
    .bind(restored_image_url)
    .fetch_optional(pool)
    .await?;

    row.map(|r| r.try_get("created_at")).transpose()
}

/// Transition a job from `processing` to `failed` and refund its credit.
///
/// This is the single transition shared by the webhook failure path and the
/// client timeout path: whichever caller actually flips the row applies the
/// refund, so duplicate terminal signals can never refund twice. Returns
/// `true` if this call won the transition.
pub async fn fail_job_and_refund(
    pool: &PgPool,
    replicate_job_id: &str,
    error: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"
        UPDATE photo_restorations
        SET status = 'failed',
            error = $2,
            completed_at = NOW()
        WHERE replicate_job_id = $1 AND status = 'processing'
        RETURNING user_id
        "#,
    )
    .bind(replicate_job_id)
    .bind(error)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        tx.rollback().await?;
        return Ok(false);
    };

    let user_id: Uuid = row.try_get("user_id")?;
    let refunded = credit_queries::refund_credit(&mut *tx, user_id).await?;
    if refunded.is_none() {
        tracing::warn!(
            replicate_job_id,
            user_id = %user_id,
            "No credit row found while refunding failed job"
        );
    }

    tx.commit().await?;
    Ok(true)
}

/// Remove a job row whose credit deduction lost a race; the record never
/// became a payable job.
pub async fn delete_job(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM photo_restorations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
