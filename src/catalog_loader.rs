//! Catalog construction
//!
//! Parses calendar definitions from TOML and exposes the built-in
//! calendar as a process-scoped, lazily-initialized, immutable registry.
//! There is deliberately no mutation API.

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use serde::Deserialize;

use crate::catalog::{BadgeSpec, ContentCatalog, Mission, StoryArc};
use crate::errors::{KalenderError, KalenderResult};

/// Top-level shape of a calendar TOML file.
#[derive(Debug, Deserialize)]
struct CalendarFile {
    #[serde(default, rename = "mission")]
    missions: Vec<Mission>,
    #[serde(default, rename = "arc")]
    arcs: Vec<StoryArc>,
    #[serde(default, rename = "badge")]
    badges: Vec<BadgeSpec>,
}

/// Parse a calendar definition from TOML text.
pub fn from_toml_str(text: &str) -> KalenderResult<ContentCatalog> {
    let file: CalendarFile = toml::from_str(text)
        .map_err(|e| KalenderError::catalog(format!("failed to parse calendar TOML: {e}")))?;
    ContentCatalog::new(file.missions, file.arcs, file.badges)
}

/// Load an alternate calendar definition from disk (tests and tooling).
pub fn load_from_path(path: &Path) -> KalenderResult<ContentCatalog> {
    let text =
        fs::read_to_string(path).map_err(|e| KalenderError::io("reading calendar file", e))?;
    from_toml_str(&text)
}

const BUILTIN_CALENDAR: &str = include_str!("../data/kalender.toml");

lazy_static! {
    static ref BUILTIN: std::sync::Arc<ContentCatalog> = std::sync::Arc::new(
        from_toml_str(BUILTIN_CALENDAR).expect("built-in calendar definition must parse")
    );
}

/// The built-in calendar, constructed once per process.
pub fn builtin_catalog() -> &'static ContentCatalog {
    &BUILTIN
}

/// Shared handle to the built-in calendar, for engine construction.
pub fn builtin_catalog_shared() -> std::sync::Arc<ContentCatalog> {
    std::sync::Arc::clone(&BUILTIN)
}
