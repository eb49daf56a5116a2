// src/lib.rs

pub mod config;
pub mod diagnosis;
pub mod directory;
pub mod logging;

pub use diagnosis::{diagnose, AuthenticationOutcome, Credentials, DiagnosticPolicy, LoginFailure};
pub use directory::{AccountRecord, DirectoryConnection, DirectoryError};
