//! Split a merged policy PDF into one document per policy, match each policy
//! against the reference spreadsheet and route it to email or print.

pub mod bundle;
pub mod commands;
pub mod config;
pub mod error;
pub mod excel;
pub mod models;
pub mod output;
pub mod pdf;
pub mod services;
pub mod types;

pub use config::SplitterConfig;
pub use error::{Error, Result};
pub use models::{ColumnLayout, ReferenceDataset, ReferenceRecord};
pub use pdf::{LopdfSource, PdfSource, PolicyDocument, SourceDocument};
pub use services::processor::{plan_run, run_split, RunPlan};
pub use types::{PolicyGroup, PolicyToken, RoutingOutcome, RunSummary};
