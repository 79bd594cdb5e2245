pub mod route_records;

pub use route_records::*;

use anyhow::{Context, Error};
use sqlx::{Pool, Postgres};

/// Opens the pool for one run and brings the schema up to date.
#[tracing::instrument(err, skip(database_url))]
pub async fn connect(database_url: &str) -> Result<Pool<Postgres>, Error> {
    let pool = sqlx::PgPool::connect(database_url)
        .await
        .context("couldn't connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("couldn't run the migrations")?;

    Ok(pool)
}
