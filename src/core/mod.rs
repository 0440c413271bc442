//! Interpolation engine: path resolution, marker grammar and row expansion

pub mod expander;
pub mod markers;
pub mod path_resolver;

pub use expander::{classify_rows, ExpansionDirective, RowExpander, SheetReport};
pub use markers::{parse_markers, Marker, MarkerKind};
pub use path_resolver::resolve;
