//! # CSV-Backed HCC Reference
//!
//! Loads the reference table from a CSV with columns `ICD-10-CM Codes`,
//! `Description`, `Tags` (§4.5), and reloads it once a configured TTL has
//! elapsed since the last successful load. A failed reload keeps the prior
//! snapshot and logs — callers never observe a load failure as an error,
//! only a stale-but-valid lookup.

use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use hcc_domain::entities::HccEntry;
use hcc_domain::error::{HccError, Result};
use hcc_domain::repositories::HccReferenceProvider;
use hcc_domain::services::HccLookup;
use std::sync::Arc;

struct State {
    lookup: Arc<HccLookup>,
    loaded_at: Instant,
}

pub struct CsvHccReference {
    csv_path: PathBuf,
    ttl: Duration,
    state: RwLock<State>,
}

impl CsvHccReference {
    /// Loads the CSV once at construction; startup fails loudly if the
    /// initial load fails (§7.2 eager validation), unlike later reloads
    /// which degrade silently to the prior snapshot.
    pub fn load(csv_path: PathBuf, ttl: Duration) -> Result<Self> {
        let lookup = Arc::new(load_lookup(&csv_path)?);
        Ok(Self {
            csv_path,
            ttl,
            state: RwLock::new(State {
                lookup,
                loaded_at: Instant::now(),
            }),
        })
    }

    fn reload_if_stale(&self) {
        let is_stale = {
            let state = self.state.read().unwrap();
            state.loaded_at.elapsed() >= self.ttl
        };
        if !is_stale {
            return;
        }

        match load_lookup(&self.csv_path) {
            Ok(fresh) => {
                let mut state = self.state.write().unwrap();
                state.lookup = Arc::new(fresh);
                state.loaded_at = Instant::now();
                tracing::debug!(path = %self.csv_path.display(), "reloaded HCC reference CSV");
            }
            Err(e) => {
                tracing::warn!(path = %self.csv_path.display(), error = %e, "HCC reference reload failed, keeping prior snapshot");
                // Reset the clock anyway so a persistently broken file
                // doesn't retry on every single access.
                self.state.write().unwrap().loaded_at = Instant::now();
            }
        }
    }
}

impl HccReferenceProvider for CsvHccReference {
    fn current(&self) -> Arc<HccLookup> {
        self.reload_if_stale();
        self.state.read().unwrap().lookup.clone()
    }
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "ICD-10-CM Codes")]
    icd_10_cm_codes: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Tags")]
    tags: Option<String>,
}

fn load_lookup(path: &std::path::Path) -> Result<HccLookup> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| HccError::Io(format!("could not open HCC reference CSV: {e}")))?;

    let mut entries = Vec::new();
    for record in reader.deserialize::<CsvRow>() {
        let row = record.map_err(|e| HccError::Io(format!("malformed HCC reference CSV row: {e}")))?;
        entries.push(HccEntry::new(row.icd_10_cm_codes.trim(), row.description.trim(), row.tags.map(|t| t.trim().to_string())));
    }
    Ok(HccLookup::from_entries(entries))
}
