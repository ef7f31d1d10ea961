pub mod commands;
pub mod config;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod index;
pub mod storage;

#[cfg(test)]
mod testutil;
