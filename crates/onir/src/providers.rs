pub mod base;
pub mod configs;
pub mod deepseek;
pub mod factory;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
