//! Guerrero - Media Metadata Collection
//!
//! Traverses local directories, FTP hosts and SMB shares, runs mediainfo on
//! every accepted file (on a partial download for remote files) and turns
//! its output into typed, normalized records.

pub mod analyzer;
pub mod cli;
pub mod collector;
pub mod command;
pub mod config;
pub mod error;
pub mod filter;
pub mod media;
pub mod normalize;
pub mod reader;
pub mod transport;
pub mod workflow;
pub mod writer;
