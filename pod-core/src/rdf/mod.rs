// pod-core/src/rdf/mod.rs
//! Just enough RDF to read and incrementally update pod documents.

pub mod graph;
pub mod patch;
pub mod turtle;
pub mod vocab;

pub use graph::{Graph, Literal, Term, Triple};
pub use patch::{Patch, PatternTerm, TriplePattern};
pub use turtle::parse_turtle;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RdfError {
    #[error("turtle syntax error: {0}")]
    Syntax(String),
}
