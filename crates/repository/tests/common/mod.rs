pub mod faults;
pub mod fixtures;

#[allow(unused_imports)]
pub use faults::FaultyStore;
#[allow(unused_imports)]
pub use fixtures::{file_with, memory_repository, repository_over};
