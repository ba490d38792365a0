// Test helpers shared by the unit and integration test binaries
//
// Usage:
//   #[path = "../helpers/mod.rs"]
//   mod helpers;
//   use helpers::*;

#![allow(unused_imports)]

pub mod test_database;

pub use memory_store::*;
pub use test_data::*;
pub use test_database::*;
