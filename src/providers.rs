pub mod anthropic;
pub mod base;
pub mod configs;
pub mod streaming;
pub mod utils;

#[cfg(test)]
pub mod mock;
