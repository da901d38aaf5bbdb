//! Row sources.

#[cfg(feature = "io-csv")]
pub mod csv;
