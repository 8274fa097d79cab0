//! Wage tracking client: records daily work against a spreadsheet-backed
//! store, keeps worker and task name suggestions, and renders summaries.

pub mod config;
pub mod error;
pub mod forms;
pub mod logging;
pub mod model;
pub mod mutation;
pub mod names;
pub mod records;
pub mod remote;
pub mod session;
pub mod shell;
pub mod storage;
pub mod view;
