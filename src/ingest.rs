//! Responsible for turning uploaded timetable files into stored route records
use anyhow::{Context, Error, bail};
use itertools::Itertools;
use std::path::PathBuf;
use tokio::task::JoinSet;
use tracing::{Span, info, warn};

use crate::{
    extract::extract_records,
    model::{Metadata, OutputRecord},
    sink::RecordSink,
    source::{SourceFormat, TableOptions, load_grid},
};

/// Which records of the collection an upload replaces
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshScope {
    /// The whole collection, used for the regular bus schedules
    All,
    /// Only the records whose metadata contains the filter, e.g. one exam and direction
    Matching(Metadata),
}

/// One or more timetable files destined for the same collection
#[derive(Clone, Debug)]
pub struct Upload {
    pub collection: String,
    pub files: Vec<PathBuf>,
    pub format: Option<SourceFormat>,
    pub options: TableOptions,
    /// Merged into every extracted record
    pub metadata: Option<Metadata>,
    pub scope: RefreshScope,
}

/// Extracts the routes of every file of the upload and replaces them in the sink.
/// Returns the number of stored records.
#[tracing::instrument(err, skip(upload, sink), fields(collection = %upload.collection))]
pub async fn ingest<S: RecordSink>(upload: &Upload, sink: &S) -> Result<u64, Error> {
    for file in upload.files.iter() {
        if !file.is_file() {
            bail!("file does not exist: {}", file.display());
        }
    }

    let records = extract_files(upload).await?;

    let inserted = match &upload.scope {
        RefreshScope::All => sink.replace_all(&upload.collection, &records).await,
        RefreshScope::Matching(filter) => {
            sink.replace_matching(&upload.collection, filter, &records)
                .await
        }
    }
    .with_context(|| format!("couldn't store the routes of {}", upload.collection))?;

    if inserted == 0 {
        warn!("no valid routes found in {} file(s)", upload.files.len());
    } else {
        info!("inserted {inserted} records into {}", upload.collection);
    }

    Ok(inserted)
}

/// Files are extracted in parallel. The records keep the order of the files.
async fn extract_files(upload: &Upload) -> Result<Vec<OutputRecord>, Error> {
    let mut set = JoinSet::new();

    for (index, file) in upload.files.iter().cloned().enumerate() {
        let format = upload.format;
        let options = upload.options;
        let metadata = upload.metadata.clone();
        let span = Span::current();

        set.spawn_blocking(move || {
            span.in_scope(|| {
                let grid = load_grid(&file, format, &options)?;
                let records = extract_records(grid, metadata.as_ref());
                info!("found {} routes in {}", records.len(), file.display());

                Ok::<_, Error>((index, records))
            })
        });
    }

    let mut extracted = vec![];
    while let Some(res) = set.join_next().await {
        extracted.push(res??);
    }

    Ok(extracted
        .into_iter()
        .sorted_by_key(|(index, _)| *index)
        .flat_map(|(_, records)| records)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{RefreshScope, Upload, ingest};
    use crate::{
        model::Metadata,
        sink::{MemoryRecordSink, RecordSink},
        source::{SourceFormat, TableOptions},
    };
    use std::path::PathBuf;

    fn write_sheet(name: &str, contents: &str) -> Result<PathBuf, anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("timetable_routes_{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    fn upload(collection: &str, files: Vec<PathBuf>, scope: RefreshScope) -> Upload {
        Upload {
            collection: collection.to_string(),
            files,
            format: None,
            options: TableOptions::default(),
            metadata: None,
            scope,
        }
    }

    #[tokio::test]
    async fn stores_the_routes_of_every_file_in_order() -> Result<(), anyhow::Error> {
        let first = write_sheet(
            "first.csv",
            "Morning buses\nRoute\nPT - 5\nStation A\nStation B\n12\nKT-7\nStation C\n",
        )?;
        let second = write_sheet("second.txt", "Scan\nROUTES\nPU Downtown Loop\nMain St\n")?;
        let sink = MemoryRecordSink::default();

        let inserted = ingest(
            &upload("general_incoming", vec![first, second], RefreshScope::All),
            &sink,
        )
        .await?;

        assert_eq!(inserted, 3);
        let stored = sink.collection("general_incoming")?;
        let routes = stored
            .iter()
            .map(|r| (r.code.as_str(), r.stops.join("|")))
            .collect::<Vec<_>>();
        assert_eq!(
            routes,
            [
                ("PT - 5", "station a|station b".to_string()),
                ("KT - 7", "station c".to_string()),
                ("PU Downtown Loop", "main st".to_string()),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn exam_upload_replaces_only_its_direction() -> Result<(), anyhow::Error> {
        let sheet = write_sheet("exam.tsv", "Exam buses\nRoute\nPT - 1\nHostel\n")?;
        let sink = MemoryRecordSink::default();
        let incoming = Metadata::new()
            .with("examTitle", "Midterm")
            .with("direction", "incoming");
        let outgoing = Metadata::new()
            .with("examTitle", "Midterm")
            .with("direction", "outgoing");

        for metadata in [incoming.clone(), outgoing.clone(), incoming.clone()] {
            let mut exam = upload(
                "exams",
                vec![sheet.clone()],
                RefreshScope::Matching(metadata.clone()),
            );
            exam.format = Some(SourceFormat::Tsv);
            exam.metadata = Some(metadata);
            ingest(&exam, &sink).await?;
        }

        let stored = sink.collection("exams")?;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].metadata, outgoing);
        assert_eq!(stored[1].metadata, incoming);

        Ok(())
    }

    #[tokio::test]
    async fn empty_sheet_clears_the_collection() -> Result<(), anyhow::Error> {
        let sheet = write_sheet("empty.csv", "Title\nRoute\n,,\n")?;
        let sink = MemoryRecordSink::default();
        sink.replace_all(
            "admin_outgoing",
            &[crate::model::OutputRecord {
                code: "PT - 1".to_string(),
                stops: vec!["a".to_string()],
                metadata: Metadata::new(),
            }],
        )
        .await?;

        let inserted = ingest(
            &upload("admin_outgoing", vec![sheet], RefreshScope::All),
            &sink,
        )
        .await?;

        assert_eq!(inserted, 0);
        assert!(sink.collection("admin_outgoing")?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn missing_file_is_rejected_before_touching_the_sink() -> Result<(), anyhow::Error> {
        let sink = MemoryRecordSink::default();
        sink.replace_all(
            "bus",
            &[crate::model::OutputRecord {
                code: "PT - 1".to_string(),
                stops: vec!["a".to_string()],
                metadata: Metadata::new(),
            }],
        )
        .await?;

        let res = ingest(
            &upload(
                "bus",
                vec![PathBuf::from("/definitely/not/here.csv")],
                RefreshScope::All,
            ),
            &sink,
        )
        .await;

        assert!(res.is_err());
        assert_eq!(sink.collection("bus")?.len(), 1);

        Ok(())
    }
}
