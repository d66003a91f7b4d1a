//! Infrastructure layer - repository backends

pub mod memory;
pub mod storage;

pub use memory::InMemorySettingsRepository;
pub use storage::SeaOrmSettingsRepository;
