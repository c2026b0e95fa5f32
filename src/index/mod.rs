pub mod codec;
pub mod filename;

pub use codec::{IndexError, IndexHeader, LoadedIndex};
