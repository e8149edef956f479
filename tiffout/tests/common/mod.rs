// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

#![allow(dead_code)]

use tiffout::formats::tiff::{Field, OutputSet, Rational, RebuildHeader, SRational, write};
use tiffout::tags::{ExifTag, GeoTiffTag, GpsTag, InteropTag, TiffTag};
use tiffout::{Endian, Result};

pub(crate) type TestResult = anyhow::Result<()>;

pub(crate) fn init_test_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a root directory with Exif, Interop and GPS sub-directories,
/// two strips and a chained thumbnail directory
pub(crate) fn camera_set() -> Result<OutputSet> {
  let mut set = OutputSet::new();
  let root = set.root();
  set[root].add(TiffTag::ImageWidth, 4_u32)?;
  set[root].add(TiffTag::ImageLength, 2_u32)?;
  set[root].add(TiffTag::BitsPerSample, [8_u16, 8, 8])?;
  set[root].add(TiffTag::Make, "Pentax")?;
  set[root].add(TiffTag::Model, "K-1 Mark II")?;
  set[root].add(TiffTag::DateTime, "2021:06:01 12:00:00")?;
  set[root].add(TiffTag::XResolution, Rational::new(300, 1))?;
  set[root].add(TiffTag::YResolution, Rational::new(300, 1))?;
  set[root].add(TiffTag::RowsPerStrip, 1_u32)?;
  set[root].set_strips(vec![vec![0x10; 12], vec![0x20; 12]])?;

  let exif = set.add_sub_directory(root, TiffTag::ExifIFDPointer)?;
  set[exif].add(ExifTag::ExposureTime, Rational::new(1, 250))?;
  set[exif].add(ExifTag::FNumber, Rational::new(56, 10))?;
  set[exif].add_field(Field::undefined(ExifTag::ExifVersion, b"0231".to_vec()))?;
  set[exif].add(ExifTag::ExposureBiasValue, SRational::new(-1, 3))?;
  set[exif].add_field(Field::undefined(ExifTag::MakerNotes, b"AOC\0MM\0\x01\0".to_vec()))?;

  let interop = set.add_sub_directory(exif, ExifTag::InteropIFDPointer)?;
  set[interop].add(InteropTag::InteropIndex, "R98")?;

  let gps = set.add_sub_directory(root, TiffTag::GPSInfo)?;
  set[gps].add(GpsTag::GPSVersionID, [2_u8, 3, 0, 0])?;
  set[gps].add(GpsTag::GPSLatitudeRef, "N")?;
  set[gps].add(GpsTag::GPSLatitude, [Rational::new(52, 1), Rational::new(31, 1), Rational::new(0, 1)])?;
  set[gps].add(GeoTiffTag::GeoAsciiParams, "WGS 84|")?;

  let ifd1 = set.add_chained_directory(root)?;
  set[ifd1].add(TiffTag::Compression, 6_u16)?;
  set[ifd1].set_jpeg_thumbnail(vec![0xff, 0xd8, 0xff, 0xdb, 0x00, 0xff, 0xd9])?;
  Ok(set)
}

pub(crate) fn rebuild(set: &OutputSet, endian: Endian) -> Result<Vec<u8>> {
  let mut out = Vec::new();
  write(&mut out, set, &RebuildHeader, endian)?;
  Ok(out)
}

/// Assert that all directories of the stream and all items of
/// its rebuilt layout start on even offsets
pub(crate) fn check_word_aligned(buf: &[u8], endian: Endian) {
  let report = tiffout::analyze_structure(buf).expect("stream must parse");
  assert_eq!(report.byte_order, endian);
  for dir in &report.directories {
    assert_eq!(dir.offset.unwrap_or(0) % 2, 0, "directory {:?} at odd offset", dir.id);
  }
  for item in &report.layout {
    assert_eq!(item.offset % 2, 0, "{} at odd offset", item.item);
  }
}
