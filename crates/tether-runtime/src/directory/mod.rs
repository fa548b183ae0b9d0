mod memory;
mod postgres;

pub use memory::MemoryDirectory;
pub use postgres::PgDirectory;
