// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::io::{self, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

/// Byte order marker of a TIFF stream, `II` (Intel)
pub const MARKER_LITTLE: [u8; 2] = [0x49, 0x49];
/// Byte order marker of a TIFF stream, `MM` (Motorola)
pub const MARKER_BIG: [u8; 2] = [0x4d, 0x4d];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
  Big,
  Little,
}

impl Default for Endian {
  fn default() -> Self {
    Self::Little
  }
}

impl Endian {
  #[inline]
  pub fn big(&self) -> bool {
    matches!(*self, Self::Big)
  }

  #[inline]
  pub fn little(&self) -> bool {
    matches!(*self, Self::Little)
  }

  /// The two marker bytes that open a TIFF header in this byte order.
  pub fn marker(&self) -> [u8; 2] {
    match *self {
      Self::Big => MARKER_BIG,
      Self::Little => MARKER_LITTLE,
    }
  }

  pub fn from_marker(marker: [u8; 2]) -> Option<Self> {
    match marker {
      MARKER_LITTLE => Some(Self::Little),
      MARKER_BIG => Some(Self::Big),
      _ => None,
    }
  }

  #[inline]
  pub fn read_u16(&self, buf: &[u8], offset: usize) -> u16 {
    match *self {
      Self::Big => BigEndian::read_u16(&buf[offset..]),
      Self::Little => LittleEndian::read_u16(&buf[offset..]),
    }
  }

  #[inline]
  pub fn read_u32(&self, buf: &[u8], offset: usize) -> u32 {
    match *self {
      Self::Big => BigEndian::read_u32(&buf[offset..]),
      Self::Little => LittleEndian::read_u32(&buf[offset..]),
    }
  }

  #[inline]
  pub fn read_u64(&self, buf: &[u8], offset: usize) -> u64 {
    match *self {
      Self::Big => BigEndian::read_u64(&buf[offset..]),
      Self::Little => LittleEndian::read_u64(&buf[offset..]),
    }
  }

  #[inline]
  pub fn write_u16(&self, buf: &mut [u8], n: u16) {
    match *self {
      Self::Big => BigEndian::write_u16(buf, n),
      Self::Little => LittleEndian::write_u16(buf, n),
    }
  }

  #[inline]
  pub fn write_u32(&self, buf: &mut [u8], n: u32) {
    match *self {
      Self::Big => BigEndian::write_u32(buf, n),
      Self::Little => LittleEndian::write_u32(buf, n),
    }
  }

  pub fn put_u16<W: Write + ?Sized>(&self, w: &mut W, n: u16) -> io::Result<()> {
    match *self {
      Self::Big => w.write_u16::<BigEndian>(n),
      Self::Little => w.write_u16::<LittleEndian>(n),
    }
  }

  pub fn put_u32<W: Write + ?Sized>(&self, w: &mut W, n: u32) -> io::Result<()> {
    match *self {
      Self::Big => w.write_u32::<BigEndian>(n),
      Self::Little => w.write_u32::<LittleEndian>(n),
    }
  }
}
