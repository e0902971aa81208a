//! Core metadata input

mod core_table;

pub use core_table::{CoreRecord, CoreTable};
