//! goldmatch core
//!
//! Domain model shared by every goldmatch crate: result tables, comparison
//! policies, benchmark instances and the stable report primitives.
//! Never rename mismatch codes - they are part of the report format.

pub mod config;
pub mod diagnostic;
pub mod instance;
pub mod policy;
pub mod report;
pub mod table;
pub mod value;

pub use config::{Config, ConfigError, GoldErrorMode, ResultFormat};
pub use diagnostic::{CellLocation, Mismatch, MismatchKind};
pub use instance::{Backend, Instance};
pub use policy::{
    ColumnSelection, ComparisonPolicy, ExtraColumns, PolicyError, PolicySet, TextNormalization,
    DEFAULT_TOLERANCE,
};
pub use report::{ReportVersion, ScoreStatus};
pub use table::{RaggedRows, Table, TableError};
pub use value::{NullTokens, Value};
