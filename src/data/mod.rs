//! Data loading and the built-in catalog
//!
//! This module handles loading the crafting catalog and engine settings
//! from external RON files, allowing the catalog to be edited without a
//! rebuild.

pub mod catalog;
pub mod loader;

pub use catalog::default_catalog;
pub use loader::{default_data_dir, export_default_data, read_ron, DataManager, DataSource};
