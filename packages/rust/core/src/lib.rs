//! Core transformation logic for pricedoc.
//!
//! This crate turns flat pricing rows into nested documents: it reads CSV
//! records, builds [`PriceDocument`](pricedoc_shared::PriceDocument)s with
//! derived price statistics, and writes them out for bulk import.

pub mod builder;
pub mod clock;
pub mod export;
pub mod pipeline;
pub mod source;
