// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Result, TiffError};
use crate::bits::Endian;

/// Field types of classic TIFF, with their on-disk type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
  Byte = 1,
  Ascii = 2,
  Short = 3,
  Long = 4,
  Rational = 5,
  SByte = 6,
  Undefined = 7,
  SShort = 8,
  SLong = 9,
  SRational = 10,
  Float = 11,
  Double = 12,
}

/// Groups of data types that may stand in for each other
/// when a tag is declared with one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
  Unsigned,
  Signed,
  Rational,
  SRational,
  FloatingPoint,
  Ascii,
  Undefined,
}

impl DataType {
  pub fn code(self) -> u16 {
    self as u16
  }

  pub fn from_code(code: u16) -> Option<Self> {
    Some(match code {
      1 => Self::Byte,
      2 => Self::Ascii,
      3 => Self::Short,
      4 => Self::Long,
      5 => Self::Rational,
      6 => Self::SByte,
      7 => Self::Undefined,
      8 => Self::SShort,
      9 => Self::SLong,
      10 => Self::SRational,
      11 => Self::Float,
      12 => Self::Double,
      _ => return None,
    })
  }

  /// Size in bytes of a single element
  pub fn size(self) -> usize {
    match self {
      Self::Byte | Self::Ascii | Self::SByte | Self::Undefined => 1,
      Self::Short | Self::SShort => 2,
      Self::Long | Self::SLong | Self::Float => 4,
      Self::Rational | Self::SRational | Self::Double => 8,
    }
  }

  pub fn family(self) -> TypeFamily {
    match self {
      Self::Byte | Self::Short | Self::Long => TypeFamily::Unsigned,
      Self::SByte | Self::SShort | Self::SLong => TypeFamily::Signed,
      Self::Rational => TypeFamily::Rational,
      Self::SRational => TypeFamily::SRational,
      Self::Float | Self::Double => TypeFamily::FloatingPoint,
      Self::Ascii => TypeFamily::Ascii,
      Self::Undefined => TypeFamily::Undefined,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Byte => "BYTE",
      Self::Ascii => "ASCII",
      Self::Short => "SHORT",
      Self::Long => "LONG",
      Self::Rational => "RATIONAL",
      Self::SByte => "SBYTE",
      Self::Undefined => "UNDEF",
      Self::SShort => "SSHORT",
      Self::SLong => "SLONG",
      Self::SRational => "SRATIONAL",
      Self::Float => "FLOAT",
      Self::Double => "DOUBLE",
    }
  }
}

impl Display for DataType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// Type to represent tiff values of type `RATIONAL`
#[derive(Clone, Debug, Default, PartialEq, Copy)]
pub struct Rational {
  pub n: u32,
  pub d: u32,
}

impl Rational {
  pub fn new(n: u32, d: u32) -> Self {
    Self { n, d }
  }
}

impl Display for Rational {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_fmt(format_args!("{}/{}", self.n, self.d))
  }
}

/// Type to represent tiff values of type `SRATIONAL`
#[derive(Clone, Debug, Default, PartialEq, Copy)]
pub struct SRational {
  pub n: i32,
  pub d: i32,
}

impl SRational {
  pub fn new(n: i32, d: i32) -> Self {
    Self { n, d }
  }
}

impl Display for SRational {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_fmt(format_args!("{}/{}", self.n, self.d))
  }
}

fn split_fraction<E: serde::de::Error>(s: &str) -> std::result::Result<(&str, &str), E> {
  s.split_once('/').ok_or_else(|| E::custom(format!("Invalid rational value: {}", s)))
}

impl Serialize for Rational {
  fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for Rational {
  fn deserialize<D>(deserializer: D) -> std::result::Result<Rational, D::Error>
  where
    D: Deserializer<'de>,
  {
    use serde::de::Error;
    let s = String::deserialize(deserializer)?;
    let (n, d) = split_fraction::<D::Error>(&s)?;
    Ok(Rational::new(n.parse().map_err(D::Error::custom)?, d.parse().map_err(D::Error::custom)?))
  }
}

impl Serialize for SRational {
  fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for SRational {
  fn deserialize<D>(deserializer: D) -> std::result::Result<SRational, D::Error>
  where
    D: Deserializer<'de>,
  {
    use serde::de::Error;
    let s = String::deserialize(deserializer)?;
    let (n, d) = split_fraction::<D::Error>(&s)?;
    Ok(SRational::new(n.parse().map_err(D::Error::custom)?, d.parse().map_err(D::Error::custom)?))
  }
}

/// ASCII payload, kept as the exact bytes that go to disk,
/// including the zero terminator(s).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TiffAscii {
  raw: Vec<u8>,
}

impl TiffAscii {
  /// Text plus the mandatory trailing NUL
  pub fn new<T: AsRef<str>>(value: T) -> Self {
    let mut raw = Vec::with_capacity(value.as_ref().len() + 1);
    raw.extend_from_slice(value.as_ref().as_bytes());
    raw.push(0);
    Self { raw }
  }

  /// Bytes as found in a file, taken over unchanged
  pub fn new_from_raw(raw: &[u8]) -> Self {
    Self { raw: raw.to_vec() }
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.raw
  }

  pub fn count(&self) -> usize {
    self.raw.len()
  }

  /// NUL separated strings, the terminator of the last one is optional
  pub fn strings(&self) -> Vec<String> {
    let body = self.raw.strip_suffix(&[0u8]).unwrap_or(&self.raw);
    body.split(|&c| c == 0).map(|s| String::from_utf8_lossy(s).into_owned()).collect()
  }

  pub fn first(&self) -> String {
    self.strings().into_iter().next().unwrap_or_default()
  }
}

impl Serialize for TiffAscii {
  fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(&self.strings().join("\n"))
  }
}

impl<'de> Deserialize<'de> for TiffAscii {
  fn deserialize<D>(deserializer: D) -> std::result::Result<TiffAscii, D::Error>
  where
    D: Deserializer<'de>,
  {
    Ok(TiffAscii::new(String::deserialize(deserializer)?))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
  /// 8-bit unsigned integer
  Byte(Vec<u8>),
  /// 8-bit byte that contains a 7-bit ASCII code; the last byte must be zero
  Ascii(TiffAscii),
  /// 16-bit unsigned integer
  Short(Vec<u16>),
  /// 32-bit unsigned integer
  Long(Vec<u32>),
  /// Fraction stored as two 32-bit unsigned integers
  Rational(Vec<Rational>),
  /// 8-bit signed integer
  SByte(Vec<i8>),
  /// 8-bit byte that may contain anything, depending on the field
  Undefined(Vec<u8>),
  /// 16-bit signed integer
  SShort(Vec<i16>),
  /// 32-bit signed integer
  SLong(Vec<i32>),
  /// Fraction stored as two 32-bit signed integers
  SRational(Vec<SRational>),
  /// 32-bit IEEE floating point
  Float(Vec<f32>),
  /// 64-bit IEEE floating point
  Double(Vec<f64>),
}

impl Value {
  pub fn data_type(&self) -> DataType {
    match self {
      Self::Byte(_) => DataType::Byte,
      Self::Ascii(_) => DataType::Ascii,
      Self::Short(_) => DataType::Short,
      Self::Long(_) => DataType::Long,
      Self::Rational(_) => DataType::Rational,
      Self::SByte(_) => DataType::SByte,
      Self::Undefined(_) => DataType::Undefined,
      Self::SShort(_) => DataType::SShort,
      Self::SLong(_) => DataType::SLong,
      Self::SRational(_) => DataType::SRational,
      Self::Float(_) => DataType::Float,
      Self::Double(_) => DataType::Double,
    }
  }

  pub fn count(&self) -> usize {
    match self {
      Self::Byte(v) => v.len(),
      Self::Ascii(v) => v.count(),
      Self::Short(v) => v.len(),
      Self::Long(v) => v.len(),
      Self::Rational(v) => v.len(),
      Self::SByte(v) => v.len(),
      Self::Undefined(v) => v.len(),
      Self::SShort(v) => v.len(),
      Self::SLong(v) => v.len(),
      Self::SRational(v) => v.len(),
      Self::Float(v) => v.len(),
      Self::Double(v) => v.len(),
    }
  }

  pub fn byte_size(&self) -> usize {
    self.count() * self.data_type().size()
  }

  /// Values up to 4 bytes live in the entry itself
  pub fn is_inline(&self) -> bool {
    self.byte_size() <= 4
  }

  /// Encode the value into its on-disk representation
  pub fn encode(&self, endian: Endian) -> Vec<u8> {
    let mut out = Vec::with_capacity(self.byte_size());
    let w = &mut out;
    match self {
      Self::Byte(v) | Self::Undefined(v) => w.extend_from_slice(v),
      Self::Ascii(v) => w.extend_from_slice(v.as_bytes()),
      Self::SByte(v) => w.extend(v.iter().map(|x| *x as u8)),
      Self::Short(v) => v.iter().for_each(|x| push_u16(w, endian, *x)),
      Self::SShort(v) => v.iter().for_each(|x| push_u16(w, endian, *x as u16)),
      Self::Long(v) => v.iter().for_each(|x| push_u32(w, endian, *x)),
      Self::SLong(v) => v.iter().for_each(|x| push_u32(w, endian, *x as u32)),
      Self::Float(v) => v.iter().for_each(|x| push_u32(w, endian, x.to_bits())),
      Self::Rational(v) => v.iter().for_each(|x| {
        push_u32(w, endian, x.n);
        push_u32(w, endian, x.d);
      }),
      Self::SRational(v) => v.iter().for_each(|x| {
        push_u32(w, endian, x.n as u32);
        push_u32(w, endian, x.d as u32);
      }),
      Self::Double(v) => v.iter().for_each(|x| match endian {
        Endian::Big => w.extend_from_slice(&x.to_bits().to_be_bytes()),
        Endian::Little => w.extend_from_slice(&x.to_bits().to_le_bytes()),
      }),
    }
    out
  }

  /// Decode `count` elements of type `typ` from `raw`
  pub fn decode(typ: DataType, count: usize, raw: &[u8], endian: Endian) -> Result<Self> {
    let needed = count.checked_mul(typ.size()).ok_or_else(|| TiffError::Overflow(format!("Value count {} is too large", count)))?;
    if raw.len() < needed {
      return Err(TiffError::FormatMismatch(format!(
        "Value of type {} with count {} needs {} bytes, only {} available",
        typ,
        count,
        needed,
        raw.len()
      )));
    }
    let raw = &raw[..needed];
    let u16s = || (0..count).map(|i| endian.read_u16(raw, i * 2));
    let u32s = || (0..count).map(|i| endian.read_u32(raw, i * 4));
    Ok(match typ {
      DataType::Byte => Self::Byte(raw.to_vec()),
      DataType::Ascii => Self::Ascii(TiffAscii::new_from_raw(raw)),
      DataType::Undefined => Self::Undefined(raw.to_vec()),
      DataType::SByte => Self::SByte(raw.iter().map(|x| *x as i8).collect()),
      DataType::Short => Self::Short(u16s().collect()),
      DataType::SShort => Self::SShort(u16s().map(|x| x as i16).collect()),
      DataType::Long => Self::Long(u32s().collect()),
      DataType::SLong => Self::SLong(u32s().map(|x| x as i32).collect()),
      DataType::Float => Self::Float(u32s().map(f32::from_bits).collect()),
      DataType::Rational => Self::Rational(
        (0..count)
          .map(|i| Rational::new(endian.read_u32(raw, i * 8), endian.read_u32(raw, i * 8 + 4)))
          .collect(),
      ),
      DataType::SRational => Self::SRational(
        (0..count)
          .map(|i| SRational::new(endian.read_u32(raw, i * 8) as i32, endian.read_u32(raw, i * 8 + 4) as i32))
          .collect(),
      ),
      DataType::Double => Self::Double((0..count).map(|i| f64::from_bits(endian.read_u64(raw, i * 8))).collect()),
    })
  }

  pub fn get_u32(&self, idx: usize) -> Option<u32> {
    match self {
      Self::Byte(v) => v.get(idx).map(|v| *v as u32),
      Self::Short(v) => v.get(idx).map(|v| *v as u32),
      Self::Long(v) => v.get(idx).copied(),
      _ => None,
    }
  }

  pub fn visual_rep(&self, limit: usize) -> String {
    fn join<T: Display>(v: &[T], limit: usize) -> String {
      v.iter().take(limit).map(|a| a.to_string()).collect::<Vec<String>>().join(" ")
    }
    match self {
      Self::Byte(v) | Self::Undefined(v) => v.iter().take(limit).map(|a| format!("{:02X}", a)).collect::<Vec<String>>().join(" "),
      Self::Ascii(v) => v.first(),
      Self::Short(v) => join(v, limit),
      Self::Long(v) => join(v, limit),
      Self::Rational(v) => join(v, limit),
      Self::SByte(v) => join(v, limit),
      Self::SShort(v) => join(v, limit),
      Self::SLong(v) => join(v, limit),
      Self::SRational(v) => join(v, limit),
      Self::Float(v) => join(v, limit),
      Self::Double(v) => join(v, limit),
    }
  }
}

fn push_u16(w: &mut Vec<u8>, endian: Endian, n: u16) {
  let mut buf = [0; 2];
  endian.write_u16(&mut buf, n);
  w.extend_from_slice(&buf);
}

fn push_u32(w: &mut Vec<u8>, endian: Endian, n: u32) {
  let mut buf = [0; 4];
  endian.write_u32(&mut buf, n);
  w.extend_from_slice(&buf);
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::Ascii(TiffAscii::new(value))
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::Ascii(TiffAscii::new(value))
  }
}

impl From<Rational> for Value {
  fn from(value: Rational) -> Self {
    Value::Rational(vec![value])
  }
}

impl<const N: usize> From<[Rational; N]> for Value {
  fn from(value: [Rational; N]) -> Self {
    Value::Rational(value.into())
  }
}

impl From<SRational> for Value {
  fn from(value: SRational) -> Self {
    Value::SRational(vec![value])
  }
}

impl From<u8> for Value {
  fn from(value: u8) -> Self {
    Value::Byte(vec![value])
  }
}

impl<const N: usize> From<[u8; N]> for Value {
  fn from(value: [u8; N]) -> Self {
    Value::Byte(value.into())
  }
}

impl From<u16> for Value {
  fn from(value: u16) -> Self {
    Value::Short(vec![value])
  }
}

impl From<&[u16]> for Value {
  fn from(value: &[u16]) -> Self {
    Value::Short(value.into())
  }
}

impl<const N: usize> From<[u16; N]> for Value {
  fn from(value: [u16; N]) -> Self {
    Value::Short(value.into())
  }
}

impl From<u32> for Value {
  fn from(value: u32) -> Self {
    Value::Long(vec![value])
  }
}

impl From<&[u32]> for Value {
  fn from(value: &[u32]) -> Self {
    Value::Long(value.into())
  }
}

impl<const N: usize> From<[u32; N]> for Value {
  fn from(value: [u32; N]) -> Self {
    Value::Long(value.into())
  }
}

impl From<i16> for Value {
  fn from(value: i16) -> Self {
    Value::SShort(vec![value])
  }
}

impl From<i32> for Value {
  fn from(value: i32) -> Self {
    Value::SLong(vec![value])
  }
}

impl From<f32> for Value {
  fn from(value: f32) -> Self {
    Value::Float(vec![value])
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Double(vec![value])
  }
}

impl From<&[f64]> for Value {
  fn from(value: &[f64]) -> Self {
    Value::Double(value.into())
  }
}

impl<const N: usize> From<[f64; N]> for Value {
  fn from(value: [f64; N]) -> Self {
    Value::Double(value.into())
  }
}
