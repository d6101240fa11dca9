//! # sparql-entity
//!
//! Library half of the `sparql-entity` binary: the CLI definition and the
//! serializable reports it prints.

pub mod cli;
pub mod report;
