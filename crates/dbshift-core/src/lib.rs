pub mod columns;
pub mod replacements;
pub mod report;
pub mod sequence;
pub mod settings;

pub use columns::{BindClass, ColumnMeta, TableColumns};
pub use replacements::{ReplacementBuilder, ReplacementSet};
pub use report::{RunReport, TableCounters};
pub use settings::{ColumnFilter, RunSettings};
