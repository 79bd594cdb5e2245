use regex::Regex;
use serde::{Serialize, Serializer};
use std::{fmt, sync::LazyLock};

use super::grid::Cell;
use crate::utils::normalize_text;

/// `PT - 5`, `kt-12` or `PU <destination>`. PT/KT must fill the whole cell, PU only anchors
/// the prefix since the rest is free text.
static ROUTE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(PT|KT)\s*-\s*(\d+)$|^PU\s+(.+)$").expect("route header regex is valid")
});

/// Canonical code of a bus route
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RouteCode {
    /// `PT - <digits>`
    Pt(String),
    /// `KT - <digits>`
    Kt(String),
    /// `PU <free text>`
    Pu(String),
}

impl RouteCode {
    /// Classifies a cell as a route header. Only text cells can be headers.
    pub fn classify(cell: &Cell) -> Option<RouteCode> {
        match cell {
            Cell::Text(text) => RouteCode::parse(text),
            Cell::Empty | Cell::Number(_) => None,
        }
    }

    /// Case insensitive on the prefix. Digits and PU text are kept verbatim.
    pub fn parse(text: &str) -> Option<RouteCode> {
        let caps = ROUTE_HEADER.captures(text.trim())?;

        if let (Some(prefix), Some(digits)) = (caps.get(1), caps.get(2)) {
            let digits = digits.as_str().to_string();
            return match prefix.as_str().to_uppercase().as_str() {
                "PT" => Some(RouteCode::Pt(digits)),
                "KT" => Some(RouteCode::Kt(digits)),
                _ => None,
            };
        }

        caps.get(3)
            .map(|text| RouteCode::Pu(text.as_str().trim().to_string()))
    }
}

impl fmt::Display for RouteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteCode::Pt(digits) => write!(f, "PT - {digits}"),
            RouteCode::Kt(digits) => write!(f, "KT - {digits}"),
            RouteCode::Pu(text) => write!(f, "PU {text}"),
        }
    }
}

impl Serialize for RouteCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A route found in one column of a sheet. Never has an empty stop list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteRecord {
    pub code: RouteCode,
    pub stops: Vec<String>,
}

/// Builds a stop entry: `primary` or `primary/secondary` when a companion name exists.
pub fn stop_entry(primary: &str, secondary: Option<&str>) -> String {
    let primary = normalize_text(primary);

    match secondary.map(normalize_text) {
        Some(secondary) if !secondary.is_empty() => format!("{primary}/{secondary}"),
        _ => primary,
    }
}
