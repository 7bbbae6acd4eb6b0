//! ZIP archive reading and writing.
//!
//! This module provides a small, self-contained implementation of the ZIP
//! container: enough to produce deflate-compressed archives and to read
//! them (or any other STORED/DEFLATE archive) back.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Decompression of entries to memory, files or any async writer
//! - [`writer`]: Streaming archive creation
//! - [`names`]: Entry-name encoding and safe resolution under a destination
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
//! - ZIP64 extensions for files > 4GB, on both read and write
//! - STORED and DEFLATE on read, DEFLATE on write
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod extractor;
mod names;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use names::{entry_name, resolve_entry_path};
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{EntryOptions, ZipWriter};
