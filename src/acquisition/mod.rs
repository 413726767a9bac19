//! Offline data acquisition
//!
//! Loads tag samples from CSV and job/tag wiring from a TOML fixture so a
//! recorded line can be replayed through the engine without a live store.

pub mod csv_source;
pub mod fixture;

pub use csv_source::{load_samples, read_samples, write_samples, CsvError, SampleLoad};
pub use fixture::{FixtureError, LineFixture};
