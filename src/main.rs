use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::Config;
use dal::PgRecordSink;
use dotenvy::dotenv;
use ingest::{RefreshScope, Upload, ingest};
use model::{DIRECTION_KEY, Direction, EXAM_TITLE_KEY, ExamDetails, Metadata};
use sink::{MemoryRecordSink, RecordSink};
use source::{SourceFormat, TableOptions};
use std::path::PathBuf;
use tracing::{error, info, warn};

mod config;
mod dal;
mod extract;
mod ingest;
mod model;
mod sink;
mod source;
mod telemetry;
mod utils;

/// Extracts bus routes from timetable sheets and stores them
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace a whole collection with the routes found in the files
    Bus {
        #[command(flatten)]
        upload: UploadArgs,
    },
    /// Replace the routes of one exam and direction, leaving other exams alone
    Exam {
        #[command(flatten)]
        upload: UploadArgs,
        /// First day of the exam, YYYY-MM-DD
        #[arg(long)]
        start_date: NaiveDate,
        /// Last day of the exam, YYYY-MM-DD
        #[arg(long)]
        end_date: NaiveDate,
        #[arg(long)]
        title: String,
        #[arg(long, value_enum)]
        direction: Direction,
    },
    /// Delete the exam routes that ended before today
    PruneExpired {
        collection: String,
        /// Defaults to the local date
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// List every stop of a collection
    Stops {
        collection: String,
        #[command(flatten)]
        filter: ExamFilter,
    },
    /// List the routes serving a stop
    Buses {
        collection: String,
        /// Matched case-insensitively against any part of the stop names
        stop: String,
        #[command(flatten)]
        filter: ExamFilter,
    },
}

/// Narrows a lookup to one exam or direction
#[derive(clap::Args)]
struct ExamFilter {
    #[arg(long)]
    title: Option<String>,
    #[arg(long, value_enum)]
    direction: Option<Direction>,
}

impl ExamFilter {
    fn metadata(&self) -> Metadata {
        let mut filter = Metadata::new();
        if let Some(title) = &self.title {
            filter = filter.with(EXAM_TITLE_KEY, title.trim());
        }
        if let Some(direction) = self.direction {
            filter = filter.with(DIRECTION_KEY, direction.as_str());
        }
        filter
    }
}

#[derive(clap::Args)]
struct UploadArgs {
    /// Collection the routes are stored in, e.g. firstshift_incoming
    collection: String,
    /// Timetable files (.xlsx, .xls, .csv, .tsv or OCR .txt)
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Overrides the format inferred from the file extension
    #[arg(long, value_enum)]
    format: Option<SourceFormat>,
    /// Title rows above the table
    #[arg(long, default_value_t = 1)]
    skip_rows: usize,
    /// The table has no row of column labels
    #[arg(long)]
    no_header_row: bool,
    /// Print the records as JSON instead of storing them
    #[arg(long)]
    dry_run: bool,
}

impl UploadArgs {
    fn into_upload(self, metadata: Option<Metadata>, scope: RefreshScope) -> (Upload, bool) {
        let upload = Upload {
            collection: self.collection,
            files: self.files,
            format: self.format,
            options: TableOptions {
                skip_rows: self.skip_rows,
                header_row: !self.no_header_row,
            },
            metadata,
            scope,
        };

        (upload, self.dry_run)
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    _ = dotenv();
    let args = Args::parse();
    let config = Config::from_env();
    let _telemetry = telemetry::init(&config)?;

    let res = run(args.command, &config).await;
    if let Err(e) = &res {
        error!("{e:?}");
    }

    res
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Bus { upload } => {
            let (upload, dry_run) = upload.into_upload(None, RefreshScope::All);
            store(&upload, dry_run, config).await
        }
        Command::Exam {
            upload,
            start_date,
            end_date,
            title,
            direction,
        } => {
            let details = ExamDetails::new(start_date, end_date, &title, direction)?;
            let (upload, dry_run) = upload.into_upload(
                Some(details.metadata()),
                RefreshScope::Matching(details.refresh_filter()),
            );
            store(&upload, dry_run, config).await
        }
        Command::PruneExpired { collection, today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let pool = dal::connect(config.database_url()?).await?;

            let res = PgRecordSink::new(pool.clone())
                .delete_expired(&collection, today)
                .await;
            pool.close().await;

            let deleted = res.with_context(|| format!("couldn't prune {collection}"))?;
            info!("deleted {deleted} expired records from {collection}");

            Ok(())
        }
        Command::Stops { collection, filter } => {
            let pool = dal::connect(config.database_url()?).await?;

            let res = PgRecordSink::new(pool.clone())
                .stops(&collection, &filter.metadata())
                .await;
            pool.close().await;

            let stops = res.with_context(|| format!("couldn't list the stops of {collection}"))?;
            info!("found {} stops in {collection}", stops.len());
            for stop in stops {
                println!("{stop}");
            }

            Ok(())
        }
        Command::Buses {
            collection,
            stop,
            filter,
        } => {
            let pool = dal::connect(config.database_url()?).await?;

            let res = PgRecordSink::new(pool.clone())
                .buses(&collection, &stop, &filter.metadata())
                .await;
            pool.close().await;

            let buses = res.with_context(|| format!("couldn't look up {stop} in {collection}"))?;
            if buses.is_empty() {
                warn!("no route of {collection} stops at {stop}");
            }
            for bus in buses {
                match bus.metadata.get(DIRECTION_KEY) {
                    Some(direction) => println!("{}\t{direction}", bus.code),
                    None => println!("{}", bus.code),
                }
            }

            Ok(())
        }
    }
}

/// The pool lives only for the duration of one upload
async fn store(upload: &Upload, dry_run: bool, config: &Config) -> Result<()> {
    if dry_run {
        let sink = MemoryRecordSink::default();
        ingest(upload, &sink).await?;

        let records = sink.collection(&upload.collection)?;
        println!("{}", serde_json::to_string_pretty(&records)?);

        return Ok(());
    }

    let pool = dal::connect(config.database_url()?).await?;
    let res = ingest(upload, &PgRecordSink::new(pool.clone())).await;
    pool.close().await;

    res.map(|_| ())
}
