pub mod filter;

pub use filter::FilterEngine;
