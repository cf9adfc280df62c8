//! Class record keeping for a school workspace: subjects, class sections,
//! rosters, lesson logs and attendance, served over a JSON-lines sidecar.

pub mod blob;
pub mod config;
pub mod csv_import;
pub mod error;
pub mod ipc;
pub mod model;
pub mod records;
pub mod store;
