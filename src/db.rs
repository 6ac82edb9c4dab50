use anyhow::Context;
use sqlx::{PgPool, Row};

use crate::dataset::Dataset;
use crate::models::SnapshotHistory;
use crate::selector::Scorecard;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Writes the snapshot and every successful candidate set in one transaction.
pub async fn publish(
    pool: &PgPool,
    dataset: &Dataset,
    scorecard: &Scorecard,
) -> anyhow::Result<usize> {
    let row_count = i32::try_from(dataset.len()).context("dataset too large to publish")?;
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO upsell_candidates.snapshots (id, source, as_of, row_count)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(dataset.snapshot_id)
    .bind(&dataset.source)
    .bind(dataset.as_of)
    .bind(row_count)
    .execute(&mut *tx)
    .await?;

    for err in scorecard.failures() {
        tracing::warn!(error = %err, "skipping failed hypothesis");
    }

    let mut inserted = 0usize;
    for set in scorecard.candidates() {
        for (row, record) in set.records(dataset) {
            let row_index = i32::try_from(row).context("row index out of range")?;
            let result = sqlx::query(
                r#"
                INSERT INTO upsell_candidates.candidates
                (snapshot_id, hypothesis, row_index, account_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (snapshot_id, hypothesis, row_index) DO NOTHING
                "#,
            )
            .bind(dataset.snapshot_id)
            .bind(set.hypothesis.name())
            .bind(row_index)
            .bind(record.label(row))
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
    }

    tx.commit().await?;
    tracing::info!(
        snapshot_id = %dataset.snapshot_id,
        candidates = inserted,
        "published snapshot"
    );
    Ok(inserted)
}

pub async fn fetch_history(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<SnapshotHistory>> {
    let records = sqlx::query(
        r#"
        SELECT s.id, s.source, s.as_of, s.row_count, s.created_at,
               c.hypothesis, COUNT(c.row_index) AS candidate_count
        FROM (
            SELECT * FROM upsell_candidates.snapshots
            ORDER BY created_at DESC
            LIMIT $1
        ) s
        LEFT JOIN upsell_candidates.candidates c ON c.snapshot_id = s.id
        GROUP BY s.id, s.source, s.as_of, s.row_count, s.created_at, c.hypothesis
        ORDER BY s.created_at DESC, c.hypothesis
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut history = Vec::new();
    for row in records {
        history.push(SnapshotHistory {
            snapshot_id: row.get("id"),
            source: row.get("source"),
            as_of: row.get("as_of"),
            row_count: row.get("row_count"),
            created_at: row.get("created_at"),
            hypothesis: row.get("hypothesis"),
            candidate_count: row.get("candidate_count"),
        });
    }

    Ok(history)
}
