//! Invocation surface shared by the CLI and any future transport

pub mod response;
pub mod tasks;

pub use response::TaskResponse;
pub use tasks::{CorrectionKind, IngestReport, NightlyReport, TaskService};
