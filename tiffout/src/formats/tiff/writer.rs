// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::io::Write;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{OutputItems, OutputSet, OutputSummary, Result, TIFF_HEADER_SIZE, TIFF_MAGIC, TiffError, generate, layout, pad, validate};
use crate::bits::Endian;

/// How a lossless prefix treats its first IFD offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeaderMode {
  /// Point the header of the prefix to the new root directory
  #[default]
  Relink,
  /// Copy the prefix untouched
  Verbatim,
}

/// Everything that is written in front of the first output item
pub trait PrefixStrategy {
  /// Offset of the first item. Fails if the prefix can't be
  /// combined with `endian`.
  fn base_offset(&self, endian: Endian) -> Result<u32>;

  /// Write the prefix, `root_offset` is the final offset of the root directory
  fn write_prefix(&self, w: &mut dyn Write, root_offset: u32, endian: Endian) -> Result<()>;
}

/// Canonical 8-byte TIFF header
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildHeader;

impl PrefixStrategy for RebuildHeader {
  fn base_offset(&self, _endian: Endian) -> Result<u32> {
    Ok(TIFF_HEADER_SIZE as u32)
  }

  fn write_prefix(&self, w: &mut dyn Write, root_offset: u32, endian: Endian) -> Result<()> {
    w.write_all(&endian.marker())?;
    endian.put_u16(w, TIFF_MAGIC)?;
    endian.put_u32(w, root_offset)?;
    Ok(())
  }
}

/// Bytes of an original stream that are kept in front of the new metadata
#[derive(Debug, Clone, Copy)]
pub struct LosslessPrefix<'a> {
  prefix: &'a [u8],
  header: HeaderMode,
}

impl<'a> LosslessPrefix<'a> {
  pub fn new(prefix: &'a [u8], header: HeaderMode) -> Self {
    Self { prefix, header }
  }

  pub fn prefix(&self) -> &[u8] {
    self.prefix
  }

  /// Byte order of the prefix, if it starts with a TIFF header
  fn header_endian(&self) -> Option<Endian> {
    if self.prefix.len() < TIFF_HEADER_SIZE {
      return None;
    }
    let endian = Endian::from_marker([self.prefix[0], self.prefix[1]])?;
    (endian.read_u16(self.prefix, 2) == TIFF_MAGIC).then_some(endian)
  }
}

impl PrefixStrategy for LosslessPrefix<'_> {
  fn base_offset(&self, endian: Endian) -> Result<u32> {
    match self.header_endian() {
      Some(found) if found != endian => {
        return Err(TiffError::FormatMismatch(format!(
          "prefix header is {:?} endian, output is {:?} endian",
          found, endian
        )));
      }
      Some(_) => {}
      None => warn!("Prefix of {} bytes does not start with a TIFF header", self.prefix.len()),
    }
    let base = u32::try_from(self.prefix.len()).map_err(|_| TiffError::Overflow(format!("prefix of {} bytes exceeds 32 bit", self.prefix.len())))?;
    if pad(self.prefix.len()) != 0 {
      warn!("Prefix has odd length {}, output items are not word aligned", base);
    }
    Ok(base)
  }

  fn write_prefix(&self, w: &mut dyn Write, root_offset: u32, endian: Endian) -> Result<()> {
    match (self.header, self.header_endian()) {
      (HeaderMode::Relink, Some(_)) => {
        info!("Relink prefix header to root directory at offset {}", root_offset);
        w.write_all(&self.prefix[..4])?;
        endian.put_u32(w, root_offset)?;
        w.write_all(&self.prefix[TIFF_HEADER_SIZE..])?;
      }
      _ => {
        info!("Copy prefix of {} bytes verbatim", self.prefix.len());
        w.write_all(self.prefix)?;
      }
    }
    Ok(())
  }
}

/// Output stream that knows its position
struct TiffWriter<'w> {
  writer: &'w mut dyn Write,
  position: u64,
}

impl Write for TiffWriter<'_> {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    let n = self.writer.write(buf)?;
    self.position += n as u64;
    Ok(n)
  }

  fn flush(&mut self) -> std::io::Result<()> {
    self.writer.flush()
  }
}

/// Write prefix and laid out items to `sink`. Each item must land
/// exactly at the offset the layout pass assigned to it.
pub fn serialize<W: Write, S: PrefixStrategy + ?Sized>(sink: &mut W, items: &OutputItems, summary: &OutputSummary, strategy: &S) -> Result<()> {
  let endian = items.endian();
  let root_offset = summary
    .root_offset()
    .ok_or_else(|| TiffError::UnresolvedReference(String::from("root directory has no offset, layout missing")))?;

  let mut w = TiffWriter { writer: sink, position: 0 };
  strategy.write_prefix(&mut w, root_offset, endian)?;
  for item in items.iter() {
    let offset = item.offset().ok_or_else(|| TiffError::UnresolvedReference(format!("{} has no offset", item.key())))?;
    if w.position != u64::from(offset) {
      return Err(TiffError::UnresolvedReference(format!(
        "{} assigned to offset {}, but stream is at {}",
        item.key(),
        offset,
        w.position
      )));
    }
    w.write_all(item.data())?;
    if pad(item.len()) != 0 {
      w.write_all(&[0])?;
    }
  }
  w.flush()?;
  debug!("Serialized {} items, {} bytes", items.len(), w.position);
  Ok(())
}

/// Validate, generate, lay out and serialize `set` in one go.
/// Nothing is written to `sink` unless the layout succeeded.
pub fn write<W: Write, S: PrefixStrategy + ?Sized>(sink: &mut W, set: &OutputSet, strategy: &S, endian: Endian) -> Result<OutputSummary> {
  let base = strategy.base_offset(endian)?;
  let mut summary = validate(set)?;
  let mut items = generate(set, endian)?;
  layout(&mut items, &mut summary, base)?;
  serialize(sink, &items, &summary, strategy)?;
  Ok(summary)
}
