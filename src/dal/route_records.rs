use chrono::NaiveDate;
use itertools::Itertools;
use sqlx::{
    Pool, Postgres, QueryBuilder, Transaction, prelude::FromRow, query, query_as, types::Json,
};
use tracing::{Instrument, info, info_span};

use crate::{
    model::{Metadata, OutputRecord, end_date_passed},
    sink::{RecordSink, SinkError},
    utils::normalize_text,
};

const INSERT_CHUNK_SIZE: usize = 1024;

#[derive(Debug, FromRow)]
struct RouteRecordRow {
    code: String,
    stops: Vec<String>,
    metadata: Json<Metadata>,
}

impl From<RouteRecordRow> for OutputRecord {
    fn from(row: RouteRecordRow) -> Self {
        OutputRecord {
            code: row.code,
            stops: row.stops,
            metadata: row.metadata.0,
        }
    }
}

/// Stores route records in the `route_records` table.
/// The pool is owned by the caller, which closes it when the run is over.
#[derive(Clone, Debug)]
pub struct PgRecordSink {
    pool: Pool<Postgres>,
}

impl PgRecordSink {
    pub fn new(pool: Pool<Postgres>) -> Self {
        PgRecordSink { pool }
    }
}

impl RecordSink for PgRecordSink {
    #[tracing::instrument(err, skip(self, records), fields(records = records.len()))]
    async fn replace_all(
        &self,
        collection: &str,
        records: &[OutputRecord],
    ) -> Result<u64, SinkError> {
        let mut tx = self.pool.begin().await?;

        let deleted = delete_collection(collection, &mut tx).await?;
        info!("removed {deleted} old records from {collection}");

        let inserted = insert_records(collection, records, &mut tx).await?;

        tx.commit().await?;

        Ok(inserted)
    }

    #[tracing::instrument(err, skip(self, records), fields(records = records.len()))]
    async fn replace_matching(
        &self,
        collection: &str,
        filter: &Metadata,
        records: &[OutputRecord],
    ) -> Result<u64, SinkError> {
        let mut tx = self.pool.begin().await?;

        let deleted = delete_matching(collection, filter, &mut tx).await?;
        info!("removed {deleted} old records matching {filter:?} from {collection}");

        let inserted = insert_records(collection, records, &mut tx).await?;

        tx.commit().await?;

        Ok(inserted)
    }

    #[tracing::instrument(err, skip(self))]
    async fn delete_expired(&self, collection: &str, today: NaiveDate) -> Result<u64, SinkError> {
        let mut tx = self.pool.begin().await?;

        // a malformed endDate keeps its record and never fails the delete
        let candidates: Vec<(i64, String)> = query_as(
            "SELECT id, metadata->>'endDate' FROM route_records
            WHERE collection = $1 AND metadata->>'endDate' IS NOT NULL
            FOR UPDATE",
        )
        .bind(collection)
        .fetch_all(&mut *tx)
        .instrument(info_span!("Selecting exam end dates"))
        .await?;

        let expired = candidates
            .into_iter()
            .filter(|(_, end_date)| end_date_passed(end_date, today))
            .map(|(id, _)| id)
            .collect_vec();

        let res = query("DELETE FROM route_records WHERE id = ANY($1)")
            .bind(&expired)
            .execute(&mut *tx)
            .instrument(info_span!("Deleting expired records"))
            .await?;

        tx.commit().await?;

        Ok(res.rows_affected())
    }

    #[tracing::instrument(err, skip(self))]
    async fn stops(&self, collection: &str, filter: &Metadata) -> Result<Vec<String>, SinkError> {
        // byte order, the same order Rust sorts strings in
        let stops: Vec<(String,)> = query_as(
            r#"SELECT DISTINCT stop COLLATE "C" AS stop
            FROM route_records, unnest(stops) AS stop
            WHERE collection = $1 AND metadata @> $2
            ORDER BY stop"#,
        )
        .bind(collection)
        .bind(Json(filter))
        .fetch_all(&self.pool)
        .await?;

        Ok(stops.into_iter().map(|(stop,)| stop).collect())
    }

    #[tracing::instrument(err, skip(self))]
    async fn buses(
        &self,
        collection: &str,
        stop: &str,
        filter: &Metadata,
    ) -> Result<Vec<OutputRecord>, SinkError> {
        let rows: Vec<RouteRecordRow> = query_as(
            "SELECT code, stops, metadata FROM route_records
            WHERE collection = $1 AND metadata @> $2
            AND EXISTS (SELECT 1 FROM unnest(stops) AS stop WHERE strpos(lower(stop), $3) > 0)
            ORDER BY id",
        )
        .bind(collection)
        .bind(Json(filter))
        .bind(normalize_text(stop))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OutputRecord::from).collect())
    }
}

pub async fn delete_collection(
    collection: &str,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<u64, sqlx::Error> {
    let res = query("DELETE FROM route_records WHERE collection = $1")
        .bind(collection)
        .execute(&mut **tx)
        .instrument(info_span!("Deleting records"))
        .await?;

    Ok(res.rows_affected())
}

/// Deletes the records whose metadata contains the filter
pub async fn delete_matching(
    collection: &str,
    filter: &Metadata,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<u64, sqlx::Error> {
    let res = query("DELETE FROM route_records WHERE collection = $1 AND metadata @> $2")
        .bind(collection)
        .bind(Json(filter))
        .execute(&mut **tx)
        .instrument(info_span!("Deleting matching records"))
        .await?;

    Ok(res.rows_affected())
}

/// Returns the number of inserted records. Keeps the order of `records` in `id`.
pub async fn insert_records(
    collection: &str,
    records: &[OutputRecord],
    tx: &mut Transaction<'_, Postgres>,
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;

    for chunk in records.chunks(INSERT_CHUNK_SIZE).collect_vec() {
        let mut query_builder =
            QueryBuilder::new("INSERT INTO route_records (collection, code, stops, metadata)");

        query_builder.push_values(chunk, |mut b, record| {
            b.push_bind(collection)
                .push_bind(&record.code)
                .push_bind(&record.stops)
                .push_bind(Json(&record.metadata));
        });

        inserted += query_builder
            .build()
            .execute(&mut **tx)
            .instrument(info_span!("Inserting records"))
            .await?
            .rows_affected();
    }

    Ok(inserted)
}
