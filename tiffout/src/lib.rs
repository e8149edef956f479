//! Library to lay out and serialize TIFF/EXIF directory structures.
//!
//! A directory model ([`OutputSet`]) is validated, encoded into output
//! items, laid out in two passes (offsets first, then pointer patches)
//! and written behind either a fresh TIFF header or bytes kept from an
//! original stream.
//!
//! # Example
//! ```rust
//! use tiffout::formats::tiff::{OutputSet, RebuildHeader, write};
//! use tiffout::tags::{ExifTag, TiffTag};
//! use tiffout::Endian;
//!
//! let mut set = OutputSet::new();
//! let root = set.root();
//! set[root].add(TiffTag::Make, "Camera").unwrap();
//! let exif = set.add_sub_directory(root, TiffTag::ExifIFDPointer).unwrap();
//! set[exif].add(ExifTag::ExposureProgram, 2_u16).unwrap();
//!
//! let mut out = Vec::new();
//! write(&mut out, &set, &RebuildHeader, Endian::Little).unwrap();
//! assert_eq!(&out[..4], b"II*\0");
//! ```

#![deny(unstable_features)]

pub mod analyze;
pub mod bits;
pub mod formats;
pub mod rewrite;
pub mod tags;

pub(crate) mod envparams;

pub use analyze::{StructureReport, analyze_structure};
pub use bits::Endian;
pub use formats::tiff::{Directory, DirectoryId, Field, OutputSet, Result, TiffError, ValidationError, Value};
pub use rewrite::{PrefixRegion, WriteMode, WriteParams, rewrite};
