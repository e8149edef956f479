// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use log::info;
use serde::{Deserialize, Serialize};

use crate::bits::Endian;
use crate::formats::tiff::{HeaderMode, LosslessPrefix, RebuildHeader, Result, TiffError, TiffSource, parse, write};

/// How the stream in front of the metadata is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteMode {
  /// Keep bytes of the original stream in front of the new metadata
  #[default]
  Lossless,
  /// Write a fresh 8-byte header
  Rebuild,
}

/// Which part of the original stream a lossless write keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrefixRegion {
  /// The header and any bytes in front of the first directory or value
  #[default]
  Header,
  /// The complete original stream, new metadata is appended
  WholeStream,
}

/// Parameters for writing a parsed stream back
#[derive(Clone, Debug)]
pub struct WriteParams {
  pub mode: WriteMode,
  pub header: HeaderMode,
  pub prefix: PrefixRegion,
  /// Output byte order, `None` keeps the order of the source
  pub endian: Option<Endian>,
}

impl Default for WriteParams {
  fn default() -> Self {
    Self {
      mode: WriteMode::Lossless,
      header: HeaderMode::Relink,
      prefix: PrefixRegion::Header,
      endian: None,
    }
  }
}

/// Parse `input` and write its directory structure again
pub fn rewrite(input: &[u8], params: &WriteParams) -> Result<Vec<u8>> {
  let source = parse(input)?;
  write_source(&source, input, params)
}

/// Write a (possibly modified) parsed stream. `input` is the stream
/// `source` was parsed from, lossless writes take their prefix from it.
pub fn write_source(source: &TiffSource, input: &[u8], params: &WriteParams) -> Result<Vec<u8>> {
  let set = &source.set;
  let source_endian = source.endian;
  let endian = params.endian.unwrap_or(source_endian);
  let mut out = Vec::with_capacity(input.len());
  match params.mode {
    WriteMode::Lossless => {
      if endian != source_endian {
        return Err(TiffError::FormatMismatch(format!(
          "lossless write keeps the {:?} endian byte order of the source, {:?} requested",
          source_endian, endian
        )));
      }
      let prefix = match params.prefix {
        PrefixRegion::Header => source.header_region(input),
        PrefixRegion::WholeStream => input,
      };
      info!("Lossless write with {} prefix bytes, header {:?}", prefix.len(), params.header);
      write(&mut out, set, &LosslessPrefix::new(prefix, params.header), endian)?;
    }
    WriteMode::Rebuild => {
      info!("Rebuild write, {:?} endian", endian);
      write(&mut out, set, &RebuildHeader, endian)?;
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::formats::tiff::{OutputSet, Rational};
  use crate::tags::{ExifTag, TiffTag};

  fn sample_stream(endian: Endian) -> Vec<u8> {
    let mut set = OutputSet::new();
    let root = set.root();
    set[root].add(TiffTag::Make, "Leica").unwrap();
    set[root].add(TiffTag::XResolution, Rational::new(72, 1)).unwrap();
    let exif = set.add_sub_directory(root, TiffTag::ExifIFDPointer).unwrap();
    set[exif].add(ExifTag::ExposureTime, Rational::new(1, 125)).unwrap();
    let mut out = Vec::new();
    write(&mut out, &set, &RebuildHeader, endian).unwrap();
    out
  }

  #[test]
  fn default_rewrite_is_identity() -> Result<()> {
    for endian in [Endian::Little, Endian::Big] {
      let input = sample_stream(endian);
      assert_eq!(rewrite(&input, &WriteParams::default())?, input);
    }
    Ok(())
  }

  #[test]
  fn rebuild_can_swap_byte_order() -> Result<()> {
    let input = sample_stream(Endian::Little);
    let params = WriteParams {
      mode: WriteMode::Rebuild,
      endian: Some(Endian::Big),
      ..Default::default()
    };
    let out = rewrite(&input, &params)?;
    assert_eq!(out, sample_stream(Endian::Big));
    Ok(())
  }

  #[test]
  fn lossless_keeps_byte_order() {
    let input = sample_stream(Endian::Little);
    let params = WriteParams {
      endian: Some(Endian::Big),
      ..Default::default()
    };
    assert!(matches!(rewrite(&input, &params), Err(TiffError::FormatMismatch(_))));
  }

  #[test]
  fn whole_stream_prefix_appends() -> Result<()> {
    let input = sample_stream(Endian::Little);
    let params = WriteParams {
      prefix: PrefixRegion::WholeStream,
      ..Default::default()
    };
    let out = rewrite(&input, &params)?;
    assert_eq!(&out[8..input.len()], &input[8..]);
    assert_eq!(Endian::Little.read_u32(&out, 4) as usize, input.len());
    assert_eq!(out.len(), 2 * input.len() - 8);
    assert_eq!(parse(&out)?.set, parse(&input)?.set);
    Ok(())
  }

  #[test]
  fn vendor_bytes_in_header_region_are_kept() -> Result<()> {
    // Header points to 16, "VENDOR!\0" in front of the root IFD
    let input = hex::decode("49492a001000000056454e444f522100010012010300010000000100000000000000").unwrap();
    assert_eq!(rewrite(&input, &WriteParams::default())?, input);

    let rebuilt = rewrite(
      &input,
      &WriteParams {
        mode: WriteMode::Rebuild,
        ..Default::default()
      },
    )?;
    assert_eq!(hex::encode(&rebuilt), "49492a0008000000010012010300010000000100000000000000");
    Ok(())
  }
}
