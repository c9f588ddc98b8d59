pub mod chunk;
pub mod file;

pub use chunk::AudioChunk;
pub use file::AudioFile;
