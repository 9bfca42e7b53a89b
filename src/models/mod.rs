pub mod reference;

pub use reference::{ColumnLayout, ReferenceDataset, ReferenceRecord};
