//! In-memory ZIP archive reading.
//!
//! This module reads the container layer of a salvaged workbook. It
//! never touches the filesystem: the salvage pipeline hands it a byte
//! buffer and it either yields entry contents or explains why the buffer
//! is not a usable archive.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Entry lookup, inflation and CRC verification
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 end-of-directory records and extra fields
//! - STORED and DEFLATE compression methods
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod extractor;
mod parser;
mod structures;

pub use extractor::{MAX_ENTRY_SIZE, ZipExtractor};
pub use parser::ZipParser;
pub use structures::*;
