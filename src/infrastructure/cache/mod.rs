mod file;
mod memory;
pub mod redis;

pub use file::LocalFileStore;
pub use memory::InMemoryByteStore;
pub use redis::{create_pool, RedisByteStore, RedisPool};
