//! Test fixtures for loader integration tests
//!
//! Builds small result directories shaped like a real benchmark checkout:
//! a gold directory with one file per instance (plus variants) and a
//! candidate directory in either CSV or JSON form.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Gold and candidate directories under one temporary root
pub struct ResultDirs {
    _root: TempDir,
    pub gold: PathBuf,
    pub candidate: PathBuf,
}

impl ResultDirs {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let gold = root.path().join("gold");
        let candidate = root.path().join("candidate");
        std::fs::create_dir_all(&gold).unwrap();
        std::fs::create_dir_all(&candidate).unwrap();

        Self {
            _root: root,
            gold,
            candidate,
        }
    }

    pub fn gold_file(&self, name: &str, contents: &str) -> &Self {
        write(&self.gold, name, contents);
        self
    }

    pub fn candidate_file(&self, name: &str, contents: &str) -> &Self {
        write(&self.candidate, name, contents);
        self
    }
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

/// Revenue per region, as a warehouse would export it
pub const REGION_REVENUE_CSV: &str = "\
region,orders,revenue
north,12,1520.25
south,7,980.5
west,3,NULL
";

/// The same result, reordered, with slightly different float rendering
pub const REGION_REVENUE_SHUFFLED_CSV: &str = "\
region,orders,revenue
west,3,
north,12,1520.2500001
south,7.0,980.5
";

/// The same result as a query-service JSON response
pub const REGION_REVENUE_JSON: &str = r#"{
  "status": "success",
  "results": [
    {"orders": 12, "region": "north", "revenue": 1520.25},
    {"orders": 7, "region": "south", "revenue": 980.5},
    {"orders": 3, "region": "west", "revenue": null}
  ]
}"#;
