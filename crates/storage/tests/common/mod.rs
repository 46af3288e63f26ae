pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{populate, seeded_bytes};
#[allow(unused_imports)]
pub use mocks::PageCountingStore;
