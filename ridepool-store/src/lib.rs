pub mod app_config;
pub mod memory;
pub mod ringback;

pub use memory::InMemoryDirectory;
pub use ringback::RingbackNotifier;
