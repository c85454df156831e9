pub mod chunker;
pub mod flatten;
pub mod topics;

pub use chunker::chunk_document;
pub use flatten::flatten_text;
pub use topics::segment_topics;
