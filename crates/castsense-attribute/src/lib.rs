//! CastSense Attribute: splits comments into clauses and attributes each
//! clause's sentiment to the roster entities it names.

pub mod attribute;
pub mod segment;

pub use attribute::{attribute, Attributor, ScoreAccumulator};
pub use segment::{segment, split_clauses, split_sentences};
