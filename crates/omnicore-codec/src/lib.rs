pub mod config;
pub mod error;
pub mod pool;

pub use config::{compress, decompress, decompress_into_lease, init_config, should_compress};
pub use error::CodecError;
pub use pool::{BufferPool, Lease};
