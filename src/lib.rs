//! # Statement Import
//!
//! Bank statement import for accounting systems: parse a statement file with
//! a pluggable parser, store it as one statement with its lines, add the
//! bank's commission as a single line and keep the original file as an
//! attachment.
//!
//! ## Features
//!
//! - **Pluggable parsers**: a registry keyed on profile import type and file type
//! - **Generic CSV/XLS parser**: files whose columns are statement line fields
//! - **Schema checks**: unknown columns and empty files are rejected before anything is stored
//! - **Compensation**: a failed import deletes the statement it started
//! - **Storage abstraction**: database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use statement_import::{FileType, Importer, Profile, StatementStorage, GENERIC_CSVXLS_SO};
//! use statement_import::utils::MemoryStorage;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut storage = MemoryStorage::new();
//! let profile = Profile::new(
//!     "bank".to_string(),
//!     "Bank".to_string(),
//!     GENERIC_CSVXLS_SO.to_string(),
//! );
//! storage.save_profile(&profile).await?;
//!
//! let mut importer = Importer::new(storage);
//! let summary = importer
//!     .import(Some("bank"), b"ref,date,amount\nSO1,2024-01-02,10.00\n", FileType::Csv)
//!     .await?;
//! assert_eq!(summary.line_count, 1);
//! # Ok(())
//! # }
//! ```

pub mod importer;
pub mod parser;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use importer::*;
pub use parser::*;
pub use traits::*;
pub use types::*;
