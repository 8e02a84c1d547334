//! goldmatch engine - result comparison
//!
//! This crate implements the comparison logic:
//! - Table comparator (ordered and multiset row comparison)
//! - One-to-one row matching under numeric tolerance
//! - Column type profiling

pub mod comparator;
pub mod matching;
pub mod profile;

pub use comparator::{TableComparator, Verdict};
pub use matching::CellRules;
pub use profile::{profile_table, ColumnProfile, TableProfile};
