// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use thiserror::Error;

use crate::tags::Scope;

pub mod entry;
pub mod ifd;
pub mod item;
pub mod layout;
pub mod reader;
pub mod summary;
pub mod value;
pub mod writer;

pub use entry::Field;
pub use ifd::{Directory, DirectoryId, ImageData, OutputSet};
pub use item::{ItemKey, OutputItem, OutputItems, Slot, generate};
pub use layout::{assign_offsets, layout, pad, resolve_patches};
pub use reader::{TiffSource, parse};
pub use summary::{OutputSummary, PatchSite, validate};
pub use value::{DataType, Rational, SRational, TiffAscii, TypeFamily, Value};
pub use writer::{HeaderMode, LosslessPrefix, PrefixStrategy, RebuildHeader, serialize, write};

pub const TIFF_MAGIC: u16 = 42;
/// Byte order marker, magic and first IFD offset
pub const TIFF_HEADER_SIZE: usize = 8;
/// tag + type + count + value/offset
pub const IFD_ENTRY_SIZE: usize = 12;

/// Structural problems of a directory model, detected before
/// any byte is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("Duplicate tag 0x{tag:04x} in {scope}")]
  DuplicateTag { tag: u16, scope: Scope },

  #[error("Type mismatch for tag 0x{tag:04x} in {scope}: {reason}")]
  TypeMismatch { tag: u16, scope: Scope, reason: String },

  #[error("Missing link: {}", _0)]
  MissingLink(String),

  #[error("Invalid link: {}", _0)]
  LinkMismatch(String),

  #[error("Directory {directory} is linked from {count} parents")]
  MultipleParents { directory: DirectoryId, count: usize },

  #[error("Cyclic reference, directory {directory} reached twice")]
  CyclicReference { directory: DirectoryId },

  #[error("Directory {directory} ({scope}) is empty, not allowed by TIFF specification")]
  EmptyDirectory { directory: DirectoryId, scope: Scope },
}

#[derive(Debug, Error)]
pub enum TiffError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// Generator and summary disagree, this is a bug in the engine
  #[error("Unresolved reference: {}", _0)]
  UnresolvedReference(String),

  /// Overflow of input, size constraints...
  #[error("Overflow error: {}", _0)]
  Overflow(String),

  #[error("Format mismatch: {}", _0)]
  FormatMismatch(String),

  #[error("I/O error: {:?}", _0)]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TiffError>;
