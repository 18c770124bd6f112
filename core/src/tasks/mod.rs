mod import;

pub use import::{import_action, ImportTask, IMPORT_ACTION};
