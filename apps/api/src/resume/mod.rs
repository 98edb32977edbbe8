//! Résumé ingestion: raw text extraction and heuristic section splitting.

pub mod extract;
pub mod sections;
