//! Structured summary records and the delimited-block parser.

pub mod block;
pub mod schema;

pub use block::{parse_directory_summary, parse_file_summary, BlockFields};
pub use schema::{
    DirectorySummary, FileSummary, GeneratedPage, KeyComponent, Layer, LayerInfo, PageType,
    SynthesisMap,
};
