//! # xlsalvage
//!
//! Recover XLSX workbooks that were mis-saved inside text wrappers.
//!
//! Spreadsheet exports sometimes arrive as `.json` files whose content is
//! the binary workbook wrapped in JSON punctuation, quotes and line breaks.
//! This library finds the ZIP container inside such a stream, strips the
//! wrapper noise from its head, and reads the first worksheet back into a
//! table of named columns.
//!
//! ## Pipeline
//!
//! - [`salvage::scan`]: locate every PK signature in the raw bytes
//! - [`salvage::extract_region`]: slice first local header to last end record
//! - [`salvage::clean`]: strip wrapper artifacts inside a bounded prefix window
//! - [`sheet::validate`]: open the result as a workbook and build a [`TableRecord`]
//! - [`recover_batch`]: run the above over many inputs, one outcome each
//!
//! ## Example
//!
//! ```no_run
//! use xlsalvage::{NamedStream, SalvageConfig, recover_batch};
//!
//! let bytes = std::fs::read("sample_data/lab.json")?;
//! let report = recover_batch(vec![NamedStream::new("lab.json", bytes)], &SalvageConfig::default());
//! println!("{}", report);
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod recovery;
pub mod salvage;
pub mod sheet;
pub mod zip;

pub use cli::Cli;
pub use error::SalvageError;
pub use recovery::{
    ArtifactKind, BatchReport, NamedStream, OutcomeKind, RecoveryOutcome, recover_batch,
    recover_stream,
};
pub use salvage::{SalvageConfig, SanitizedArchive};
pub use sheet::{CellValue, TableRecord};
