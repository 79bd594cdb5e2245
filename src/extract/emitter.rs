use crate::model::{Metadata, OutputRecord, RouteRecord};

/// Flattens the routes of every column, left to right, into the records handed to a sink.
/// `metadata` is merged into each of them.
pub fn emit(columns: Vec<Vec<RouteRecord>>, metadata: Option<&Metadata>) -> Vec<OutputRecord> {
    columns
        .into_iter()
        .flatten()
        .map(|route| OutputRecord {
            code: route.code.to_string(),
            stops: route.stops,
            metadata: metadata.cloned().unwrap_or_default(),
        })
        .collect()
}
