// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

//! Tag catalogs and the merged registry
//!
//! Every catalog is plain static data. The registry merges them once,
//! keyed by (tag, scope), and is never modified afterwards.

use std::collections::HashMap;
use std::fmt::Display;

use lazy_static::lazy_static;
use serde::Serialize;
use thiserror::Error;

use crate::formats::tiff::DataType;

/// Directory role a tag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Scope {
  /// IFD0 and the IFDs chained to it
  Root,
  Exif,
  Gps,
  Interop,
  /// Valid in every directory
  Unknown,
}

impl Display for Scope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::Root => "IFD",
      Self::Exif => "ExifIFD",
      Self::Gps => "GPSIFD",
      Self::Interop => "InteropIFD",
      Self::Unknown => "AnyIFD",
    })
  }
}

/// Number of elements a tag expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Count {
  Fixed(usize),
  Variable,
}

use Count::{Fixed, Variable};

/// Static descriptor of a single tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagInfo {
  pub name: &'static str,
  pub tag: u16,
  pub count: Count,
  pub data_type: DataType,
  pub scope: Scope,
}

impl TagInfo {
  /// Checks a data type and count against this descriptor.
  /// Returns a human readable reason on mismatch.
  pub fn check(&self, data_type: DataType, count: usize) -> std::result::Result<(), String> {
    if data_type.family() != self.data_type.family() {
      return Err(format!("{} expects type {}, got {}", self.name, self.data_type, data_type));
    }
    if let Fixed(expected) = self.count {
      if count != expected {
        return Err(format!("{} expects count {}, got {}", self.name, expected, count));
      }
    }
    Ok(())
  }
}

macro_rules! tag_catalog {
  (
    $(#[$enum_attr:meta])*
    $vis:vis enum $name:ident in $scope:ident as $table:ident {
      $( $tag:ident = $val:literal => ($typ:ident, $count:expr), )*
    }
  ) => {
    $(#[$enum_attr])*
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    #[repr(u16)]
    $vis enum $name {
      $( $tag = $val, )*
    }

    impl From<$name> for u16 {
      fn from(tag: $name) -> u16 {
        tag as u16
      }
    }

    impl TryFrom<u16> for $name {
      type Error = u16;

      fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        match value {
          $( $val => Ok(Self::$tag), )*
          x => Err(x),
        }
      }
    }

    $vis const $table: &[TagInfo] = &[
      $( TagInfo {
        name: stringify!($tag),
        tag: $val,
        count: $count,
        data_type: DataType::$typ,
        scope: Scope::$scope,
      }, )*
    ];
  };
}

tag_catalog! {
  /// Baseline TIFF tags of IFD0
  pub enum TiffTag in Root as TIFF_TAGS {
    NewSubFileType = 0x00fe => (Long, Fixed(1)),
    ImageWidth = 0x0100 => (Long, Fixed(1)),
    ImageLength = 0x0101 => (Long, Fixed(1)),
    BitsPerSample = 0x0102 => (Short, Variable),
    Compression = 0x0103 => (Short, Fixed(1)),
    PhotometricInt = 0x0106 => (Short, Fixed(1)),
    ImageDescription = 0x010e => (Ascii, Variable),
    Make = 0x010f => (Ascii, Variable),
    Model = 0x0110 => (Ascii, Variable),
    StripOffsets = 0x0111 => (Long, Variable),
    Orientation = 0x0112 => (Short, Fixed(1)),
    SamplesPerPixel = 0x0115 => (Short, Fixed(1)),
    RowsPerStrip = 0x0116 => (Long, Fixed(1)),
    StripByteCounts = 0x0117 => (Long, Variable),
    XResolution = 0x011a => (Rational, Fixed(1)),
    YResolution = 0x011b => (Rational, Fixed(1)),
    PlanarConfiguration = 0x011c => (Short, Fixed(1)),
    ResolutionUnit = 0x0128 => (Short, Fixed(1)),
    Software = 0x0131 => (Ascii, Variable),
    DateTime = 0x0132 => (Ascii, Fixed(20)),
    Artist = 0x013b => (Ascii, Variable),
    JPEGInterchangeFormat = 0x0201 => (Long, Fixed(1)),
    JPEGInterchangeFormatLength = 0x0202 => (Long, Fixed(1)),
    YCbCrPositioning = 0x0213 => (Short, Fixed(1)),
    Copyright = 0x8298 => (Ascii, Variable),
    ExifIFDPointer = 0x8769 => (Long, Fixed(1)),
    GPSInfo = 0x8825 => (Long, Fixed(1)),
  }
}

tag_catalog! {
  /// Tags of the Exif sub-IFD
  pub enum ExifTag in Exif as EXIF_TAGS {
    ExposureTime = 0x829a => (Rational, Fixed(1)),
    FNumber = 0x829d => (Rational, Fixed(1)),
    ExposureProgram = 0x8822 => (Short, Fixed(1)),
    ISOSpeedRatings = 0x8827 => (Short, Variable),
    ExifVersion = 0x9000 => (Undefined, Fixed(4)),
    DateTimeOriginal = 0x9003 => (Ascii, Fixed(20)),
    CreateDate = 0x9004 => (Ascii, Fixed(20)),
    ComponentsConfiguration = 0x9101 => (Undefined, Fixed(4)),
    ShutterSpeedValue = 0x9201 => (SRational, Fixed(1)),
    ApertureValue = 0x9202 => (Rational, Fixed(1)),
    ExposureBiasValue = 0x9204 => (SRational, Fixed(1)),
    MaxApertureValue = 0x9205 => (Rational, Fixed(1)),
    MeteringMode = 0x9207 => (Short, Fixed(1)),
    Flash = 0x9209 => (Short, Fixed(1)),
    FocalLength = 0x920a => (Rational, Fixed(1)),
    MakerNotes = 0x927c => (Undefined, Variable),
    UserComment = 0x9286 => (Undefined, Variable),
    SubSecTime = 0x9290 => (Ascii, Variable),
    FlashpixVersion = 0xa000 => (Undefined, Fixed(4)),
    ColorSpace = 0xa001 => (Short, Fixed(1)),
    PixelXDimension = 0xa002 => (Long, Fixed(1)),
    PixelYDimension = 0xa003 => (Long, Fixed(1)),
    InteropIFDPointer = 0xa005 => (Long, Fixed(1)),
    ExposureMode = 0xa402 => (Short, Fixed(1)),
    WhiteBalance = 0xa403 => (Short, Fixed(1)),
    LensMake = 0xa433 => (Ascii, Variable),
    LensModel = 0xa434 => (Ascii, Variable),
  }
}

tag_catalog! {
  /// Tags of the GPS sub-IFD
  pub enum GpsTag in Gps as GPS_TAGS {
    GPSVersionID = 0x0000 => (Byte, Fixed(4)),
    GPSLatitudeRef = 0x0001 => (Ascii, Fixed(2)),
    GPSLatitude = 0x0002 => (Rational, Fixed(3)),
    GPSLongitudeRef = 0x0003 => (Ascii, Fixed(2)),
    GPSLongitude = 0x0004 => (Rational, Fixed(3)),
    GPSAltitudeRef = 0x0005 => (Byte, Fixed(1)),
    GPSAltitude = 0x0006 => (Rational, Fixed(1)),
    GPSTimeStamp = 0x0007 => (Rational, Fixed(3)),
    GPSSatellites = 0x0008 => (Ascii, Variable),
    GPSMapDatum = 0x0012 => (Ascii, Variable),
    GPSDateStamp = 0x001d => (Ascii, Fixed(11)),
  }
}

tag_catalog! {
  /// Tags of the interoperability sub-IFD
  pub enum InteropTag in Interop as INTEROP_TAGS {
    InteropIndex = 0x0001 => (Ascii, Variable),
    InteropVersion = 0x0002 => (Undefined, Fixed(4)),
  }
}

tag_catalog! {
  /// GeoTIFF tags, allowed in any directory
  pub enum GeoTiffTag in Unknown as GEOTIFF_TAGS {
    ModelPixelScale = 0x830e => (Double, Fixed(3)),
    ModelTiepoint = 0x8482 => (Double, Variable),
    ModelTransformation = 0x85d8 => (Double, Fixed(16)),
    GeoKeyDirectory = 0x87af => (Short, Variable),
    GeoDoubleParams = 0x87b0 => (Double, Variable),
    GeoAsciiParams = 0x87b1 => (Ascii, Variable),
  }
}

/// All catalogs the process-wide registry is built from
pub const BUILTIN_CATALOGS: &[&[TagInfo]] = &[TIFF_TAGS, EXIF_TAGS, GPS_TAGS, INTEROP_TAGS, GEOTIFF_TAGS];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
  #[error("Tag 0x{tag:04x} registered twice in {scope}: {first} and {second}")]
  Collision {
    tag: u16,
    scope: Scope,
    first: &'static str,
    second: &'static str,
  },
}

/// Merged, read-only view over several catalogs
#[derive(Debug)]
pub struct TagRegistry {
  table: HashMap<(u16, Scope), &'static TagInfo>,
}

impl TagRegistry {
  pub fn new(catalogs: &[&'static [TagInfo]]) -> std::result::Result<Self, RegistryError> {
    let mut table = HashMap::new();
    for info in catalogs.iter().copied().flat_map(|catalog| catalog.iter()) {
      if let Some(prev) = table.insert((info.tag, info.scope), info) {
        return Err(RegistryError::Collision {
          tag: info.tag,
          scope: info.scope,
          first: prev.name,
          second: info.name,
        });
      }
    }
    Ok(Self { table })
  }

  /// Find the rule for a tag in a directory scope. Tags registered
  /// for [`Scope::Unknown`] match in every scope.
  pub fn lookup(&self, tag: u16, scope: Scope) -> Option<&'static TagInfo> {
    self.table.get(&(tag, scope)).or_else(|| self.table.get(&(tag, Scope::Unknown))).copied()
  }

  pub fn len(&self) -> usize {
    self.table.len()
  }

  pub fn is_empty(&self) -> bool {
    self.table.is_empty()
  }
}

lazy_static! {
  static ref REGISTRY: TagRegistry = TagRegistry::new(BUILTIN_CATALOGS).expect("Built-in tag catalogs must not collide");
}

/// The process-wide registry of all built-in catalogs
pub fn registry() -> &'static TagRegistry {
  &REGISTRY
}

/// Shortcut for `registry().lookup()`
pub fn lookup(tag: u16, scope: Scope) -> Option<&'static TagInfo> {
  REGISTRY.lookup(tag, scope)
}

/// Which directory scope a link tag leads to, given the parent scope.
/// Returns `None` if the tag is not a directory pointer in that scope.
pub fn link_target_scope(tag: u16, parent: Scope) -> Option<Scope> {
  match (parent, tag) {
    (Scope::Root, 0x8769) => Some(Scope::Exif),
    (Scope::Root, 0x8825) => Some(Scope::Gps),
    (Scope::Exif, 0xa005) => Some(Scope::Interop),
    _ => None,
  }
}
