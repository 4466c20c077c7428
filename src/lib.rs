#![doc = include_str!("../README.md")]
pub mod belongs;
pub mod blocks;
pub mod bloom;
pub mod chunk;
pub mod config;
pub mod connection;
pub mod constants;
pub mod errors;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod identifiers;
pub mod iterate;
pub mod manifest;
pub mod model;
pub mod monitor;
pub mod output;
pub mod session;
pub mod types;
pub mod walk;
