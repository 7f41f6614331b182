//! Protocol implementations for remote collection.
//!
//! Both transports shell out to well known command line clients instead of
//! speaking the protocols themselves.

pub mod ftp;
pub mod smb;

pub use ftp::FtpTransport;
pub use smb::SmbTransport;

/// Joins a directory and an entry name with exactly one slash.
pub(crate) fn join_path(directory: &str, name: &str) -> String {
    format!("{}/{}", directory.trim_end_matches('/'), name)
}
