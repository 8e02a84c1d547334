//! Benchmark instances

use serde::{Deserialize, Serialize};

/// Database back-end family of an instance
///
/// Derived from the instance-id prefix used by the benchmark
/// (`bq*`/`ga*`, `local*`, `sf_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Google BigQuery (includes the Google Analytics sample datasets)
    BigQuery,

    /// SQLite
    Sqlite,

    /// Snowflake
    Snowflake,

    /// Unrecognized prefix
    Other,
}

impl Backend {
    /// Classify an instance id
    pub fn from_instance_id(instance_id: &str) -> Self {
        if instance_id.starts_with("sf") {
            Self::Snowflake
        } else if instance_id.starts_with("bq") || instance_id.starts_with("ga") {
            Self::BigQuery
        } else if instance_id.starts_with("local") {
            Self::Sqlite
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BigQuery => write!(f, "bigquery"),
            Self::Sqlite => write!(f, "sqlite"),
            Self::Snowflake => write!(f, "snowflake"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// One benchmark question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique identifier (e.g., "local001", "bq011", "sf_bq009")
    pub instance_id: String,

    /// Source database tag
    #[serde(default)]
    pub db: String,

    /// Natural-language question
    #[serde(default)]
    pub question: String,

    /// Optional reference document name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_knowledge: Option<String>,
}

impl Instance {
    /// Create an instance with no reference document
    pub fn new(
        instance_id: impl Into<String>,
        db: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            db: db.into(),
            question: question.into(),
            external_knowledge: None,
        }
    }

    /// Attach a reference document name
    pub fn with_external_knowledge(mut self, doc: impl Into<String>) -> Self {
        self.external_knowledge = Some(doc.into());
        self
    }

    /// Back-end family
    pub fn backend(&self) -> Backend {
        Backend::from_instance_id(&self.instance_id)
    }
}
