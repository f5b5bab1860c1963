use chrono::Utc;
use sqlx::PgConnection;

/// Record who-recommended-whom edges from one expansion pass. Existing edges
/// keep their original discovery time. Returns the number of new edges.
pub async fn insert_edges(
    conn: &mut PgConnection,
    seed_channel_id: i64,
    recommended: &[i64],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    let discovered_at = Utc::now();
    for recommended_channel_id in recommended {
        let result = sqlx::query(
            r#"
            INSERT INTO recommendations
                (seed_channel_id, recommended_channel_id, discovered_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (seed_channel_id, recommended_channel_id) DO NOTHING
            "#,
        )
        .bind(seed_channel_id)
        .bind(*recommended_channel_id)
        .bind(discovered_at)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}
