//! BorgBackup repositories, one per volume
//!
//! - `credentials`: the passphrase / transport bundle and its environment form
//! - `naming`: repository locations, archive names and key file names
//! - `repository`: lifecycle and content operations on one repository

pub mod credentials;
pub mod naming;
pub mod repository;

pub use credentials::Credentials;
pub use naming::{archive_name, key_file_name, repository_location};
pub use repository::ArchiveRepository;
