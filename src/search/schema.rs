//! Supporting code for the search request and result data structures.

pub mod data;
pub mod query;
