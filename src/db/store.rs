use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{DailyAggregate, EnergyReading, NewEnergyReading};
use crate::error::StorageFault;

type StoreResult<T> = Result<T, StorageFault>;

/// Measurement columns. `raw_payload` is left out so reads never pull the
/// stored upstream snapshots into memory.
const READING_COLUMNS: &str = r#"
    id, recorded_at,
    battery_soc, battery_voltage, battery_current, battery_power,
    battery_temperature, battery_state,
    solar_power, solar_voltage, solar_current, solar_yield_today,
    consumption_power, temperature, humidity
"#;

/// Append-only store for `energy_readings`.
///
/// All ordering and windowing is done on `recorded_at`, never on insertion
/// order. Cheap to clone: it only wraps the connection pool.
#[derive(Debug, Clone)]
pub struct ReadingStore {
    pool: SqlitePool,
}

impl ReadingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one reading and return the stored row.
    pub async fn append(&self, reading: &NewEnergyReading) -> StoreResult<EnergyReading> {
        let v = &reading.values;
        let sql = format!(
            r#"
            INSERT INTO energy_readings
                (recorded_at,
                 battery_soc, battery_voltage, battery_current, battery_power,
                 battery_temperature, battery_state,
                 solar_power, solar_voltage, solar_current, solar_yield_today,
                 consumption_power, temperature, humidity, raw_payload)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {READING_COLUMNS}, raw_payload
            "#
        );

        let row = sqlx::query_as::<_, EnergyReading>(&sql)
            .bind(reading.recorded_at)
            .bind(v.battery_soc)
            .bind(v.battery_voltage)
            .bind(v.battery_current)
            .bind(v.battery_power)
            .bind(v.battery_temperature)
            .bind(v.battery_state.as_deref())
            .bind(v.solar_power)
            .bind(v.solar_voltage)
            .bind(v.solar_current)
            .bind(v.solar_yield_today)
            .bind(v.consumption_power)
            .bind(v.temperature)
            .bind(v.humidity)
            .bind(reading.raw_payload.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    /// Most recent reading by timestamp, if any.
    pub async fn latest(&self) -> StoreResult<Option<EnergyReading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM energy_readings \
             ORDER BY recorded_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, EnergyReading>(&sql)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Readings with `since <= recorded_at <= until`, oldest first.
    pub async fn range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<EnergyReading>> {
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM energy_readings \
             WHERE recorded_at >= ? AND recorded_at <= ? \
             ORDER BY recorded_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, EnergyReading>(&sql)
            .bind(since)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Delete every reading recorded strictly before `cutoff`.
    /// Returns the number of rows removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM energy_readings WHERE recorded_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Solar peak/mean, consumption mean and row count over a window,
    /// computed by SQLite so memory use does not grow with the row count.
    pub async fn aggregate(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<DailyAggregate> {
        let row = sqlx::query_as::<_, DailyAggregate>(
            r#"
            SELECT MAX(solar_power)       AS solar_peak,
                   AVG(solar_power)       AS solar_avg,
                   AVG(consumption_power) AS consumption_avg,
                   COUNT(id)              AS readings_count
            FROM energy_readings
            WHERE recorded_at >= ? AND recorded_at <= ?
            "#,
        )
        .bind(since)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::vrm::models::DiagnosticReading;

    fn new_reading(recorded_at: DateTime<Utc>, solar: Option<f64>, load: Option<f64>) -> NewEnergyReading {
        NewEnergyReading {
            recorded_at,
            values: DiagnosticReading {
                solar_power: solar,
                consumption_power: load,
                ..DiagnosticReading::default()
            },
            raw_payload: None,
        }
    }

    async fn count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM energy_readings")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn append_returns_stored_row(pool: SqlitePool) {
        let store = ReadingStore::new(pool);
        let now = Utc::now();
        let mut reading = new_reading(now, Some(120.0), Some(35.5));
        reading.values.battery_state = Some("charging".to_owned());
        reading.raw_payload = Some(r#"{"records":[]}"#.to_owned());

        let row = store.append(&reading).await.unwrap();
        assert!(row.id > 0);
        assert_eq!(row.recorded_at, now);
        assert_eq!(row.solar_power, Some(120.0));
        assert_eq!(row.consumption_power, Some(35.5));
        assert_eq!(row.battery_state.as_deref(), Some("charging"));
        assert_eq!(row.battery_soc, None);
        assert_eq!(row.raw_payload.as_deref(), Some(r#"{"records":[]}"#));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn append_all_null_reading_still_records_row(pool: SqlitePool) {
        let store = ReadingStore::new(pool.clone());
        let row = store
            .append(&new_reading(Utc::now(), None, None))
            .await
            .unwrap();

        assert_eq!(count(&pool).await, 1);
        assert_eq!(row.battery_voltage, None);
        assert_eq!(row.solar_power, None);
        assert_eq!(row.humidity, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn latest_empty_store_is_none(pool: SqlitePool) {
        let store = ReadingStore::new(pool);
        assert!(store.latest().await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn latest_uses_timestamp_not_insertion_order(pool: SqlitePool) {
        let store = ReadingStore::new(pool);
        let now = Utc::now();
        store.append(&new_reading(now, Some(2.0), None)).await.unwrap();
        store
            .append(&new_reading(now - Duration::minutes(5), Some(1.0), None))
            .await
            .unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.solar_power, Some(2.0));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn reads_do_not_load_raw_payload(pool: SqlitePool) {
        let store = ReadingStore::new(pool);
        let now = Utc::now();
        let mut reading = new_reading(now, Some(5.0), None);
        reading.raw_payload = Some("y".repeat(10_000));
        store.append(&reading).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.solar_power, Some(5.0));
        assert_eq!(latest.raw_payload, None);

        let rows = store.range(now - Duration::hours(1), now).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].raw_payload, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn range_is_inclusive_and_ascending(pool: SqlitePool) {
        let store = ReadingStore::new(pool);
        let now = Utc::now();
        let since = now - Duration::hours(2);

        // Inserted out of order on purpose.
        store.append(&new_reading(now, Some(3.0), None)).await.unwrap();
        store.append(&new_reading(since, Some(1.0), None)).await.unwrap();
        store
            .append(&new_reading(now - Duration::hours(1), Some(2.0), None))
            .await
            .unwrap();
        store
            .append(&new_reading(since - Duration::seconds(1), Some(0.0), None))
            .await
            .unwrap();

        let rows = store.range(since, now).await.unwrap();
        let solar: Vec<_> = rows.iter().map(|r| r.solar_power).collect();
        assert_eq!(solar, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn delete_older_than_removes_only_expired_rows(pool: SqlitePool) {
        let store = ReadingStore::new(pool.clone());
        let now = Utc::now();
        store
            .append(&new_reading(now - Duration::days(8), Some(1.0), None))
            .await
            .unwrap();
        store
            .append(&new_reading(now - Duration::days(10), Some(2.0), None))
            .await
            .unwrap();
        store
            .append(&new_reading(now - Duration::days(3), Some(3.0), None))
            .await
            .unwrap();
        store.append(&new_reading(now, Some(4.0), None)).await.unwrap();

        let removed = store
            .delete_older_than(now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let remaining = store
            .range(now - Duration::days(30), now)
            .await
            .unwrap();
        let solar: Vec<_> = remaining.iter().map(|r| r.solar_power).collect();
        assert_eq!(solar, vec![Some(3.0), Some(4.0)]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn aggregate_over_window(pool: SqlitePool) {
        let store = ReadingStore::new(pool);
        let now = Utc::now();
        let since = now - Duration::hours(1);

        store
            .append(&new_reading(now - Duration::minutes(30), Some(100.0), Some(40.0)))
            .await
            .unwrap();
        store
            .append(&new_reading(now - Duration::minutes(20), Some(200.0), None))
            .await
            .unwrap();
        store
            .append(&new_reading(now - Duration::minutes(10), None, Some(60.0)))
            .await
            .unwrap();
        // Outside the window
        store
            .append(&new_reading(now - Duration::hours(3), Some(900.0), Some(900.0)))
            .await
            .unwrap();

        let agg = store.aggregate(since, now).await.unwrap();
        assert_eq!(agg.readings_count, 3);
        assert_eq!(agg.solar_peak, Some(200.0));
        assert_eq!(agg.solar_avg, Some(150.0));
        assert_eq!(agg.consumption_avg, Some(50.0));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn aggregate_empty_window(pool: SqlitePool) {
        let store = ReadingStore::new(pool);
        let now = Utc::now();
        let agg = store
            .aggregate(now - Duration::hours(1), now)
            .await
            .unwrap();
        assert_eq!(agg.readings_count, 0);
        assert_eq!(agg.solar_peak, None);
        assert_eq!(agg.solar_avg, None);
    }
}
