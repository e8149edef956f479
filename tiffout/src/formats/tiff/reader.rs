// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::collections::{HashSet, VecDeque};
use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use log::{debug, info, warn};

use super::{
  DataType, Directory, DirectoryId, Field, IFD_ENTRY_SIZE, ImageData, OutputSet, Result, TIFF_HEADER_SIZE, TIFF_MAGIC, TiffError, ValidationError, Value,
};
use crate::bits::Endian;
use crate::envparams::tiffout_max_directories;
use crate::tags::{self, Scope, TiffTag};

pub struct EndianReader<'a, R: Read + Seek + 'a> {
  endian: Endian,
  inner: &'a mut R,
}

impl<'a, R: Read + Seek + 'a> EndianReader<'a, R> {
  pub fn new(inner: &'a mut R, endian: Endian) -> Self {
    Self { endian, inner }
  }

  pub fn goto(&mut self, offset: u64) -> Result<()> {
    self.inner.seek(SeekFrom::Start(offset))?;
    Ok(())
  }

  pub fn read_u16(&mut self) -> std::io::Result<u16> {
    match self.endian {
      Endian::Little => self.inner.read_u16::<LittleEndian>(),
      Endian::Big => self.inner.read_u16::<BigEndian>(),
    }
  }

  pub fn read_u32(&mut self) -> std::io::Result<u32> {
    match self.endian {
      Endian::Little => self.inner.read_u32::<LittleEndian>(),
      Endian::Big => self.inner.read_u32::<BigEndian>(),
    }
  }

  pub fn read_bytes(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0; len];
    self.inner.read_exact(&mut buf)?;
    Ok(buf)
  }
}

/// A parsed TIFF stream
#[derive(Debug, Clone)]
pub struct TiffSource {
  pub endian: Endian,
  /// Header bytes as found in the stream
  pub header: [u8; TIFF_HEADER_SIZE],
  pub set: OutputSet,
  /// File offset of each directory table, indexed by [`DirectoryId`]
  pub offsets: Vec<u32>,
  /// Lowest offset of any directory, out-of-line value or image data
  /// block. Bytes in front of it belong to the header region.
  pub data_start: u32,
}

impl TiffSource {
  pub fn directory_offset(&self, id: DirectoryId) -> Option<u32> {
    self.offsets.get(id.index()).copied()
  }

  /// Header and any vendor bytes up to the first directory or value
  pub fn header_region<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
    let end = (self.data_start as usize).max(TIFF_HEADER_SIZE).min(buf.len());
    &buf[..end]
  }
}

#[derive(Debug, Clone, Copy)]
enum Parent {
  Link(usize, u16),
  Next(usize),
}

struct RawDirectory {
  offset: u32,
  lowest: u64,
  dir: Directory,
  parent: Option<Parent>,
}

/// Parse a TIFF stream into a directory model
pub fn parse(buf: &[u8]) -> Result<TiffSource> {
  parse_with_limit(buf, tiffout_max_directories())
}

/// Parse a TIFF stream, reading at most `max_directories` directories.
///
/// The IFD chain and the Exif, GPS and Interop pointers are followed.
/// Directories end up in the set ordered by their file offset.
pub fn parse_with_limit(buf: &[u8], max_directories: usize) -> Result<TiffSource> {
  if buf.len() < TIFF_HEADER_SIZE {
    return Err(TiffError::FormatMismatch(format!("stream of {} bytes is too short for a TIFF header", buf.len())));
  }
  let endian = Endian::from_marker([buf[0], buf[1]])
    .ok_or_else(|| TiffError::FormatMismatch(format!("unknown byte order marker {:02x}{:02x}", buf[0], buf[1])))?;
  let mut header = [0; TIFF_HEADER_SIZE];
  header.copy_from_slice(&buf[..TIFF_HEADER_SIZE]);

  let mut cursor = Cursor::new(buf);
  let mut reader = EndianReader::new(&mut cursor, endian);
  reader.goto(2)?;
  let magic = reader.read_u16()?;
  if magic != TIFF_MAGIC {
    return Err(TiffError::FormatMismatch(format!("invalid TIFF magic {}", magic)));
  }
  let first = reader.read_u32()?;
  debug!("TIFF stream, {:?} endian, first IFD at {}", endian, first);

  let mut queue = VecDeque::from([(first, Scope::Root, None)]);
  let mut seen = HashSet::new();
  let mut raws: Vec<RawDirectory> = Vec::new();

  while let Some((offset, scope, parent)) = queue.pop_front() {
    if !seen.insert(offset) {
      return Err(TiffError::FormatMismatch(format!("directory at offset {} is referenced twice", offset)));
    }
    if raws.len() >= max_directories {
      return Err(TiffError::FormatMismatch(format!("stream has more than {} directories", max_directories)));
    }
    let idx = raws.len();
    let parsed = parse_directory(&mut reader, buf.len() as u64, offset, scope)?;
    for (tag, child, child_scope) in parsed.links {
      queue.push_back((child, child_scope, Some(Parent::Link(idx, tag))));
    }
    if parsed.next != 0 {
      if scope == Scope::Root {
        queue.push_back((parsed.next, Scope::Root, Some(Parent::Next(idx))));
      } else {
        warn!("Ignoring next IFD offset {} of {} directory at {}", parsed.next, scope, offset);
      }
    }
    raws.push(RawDirectory {
      offset,
      lowest: parsed.lowest,
      dir: parsed.dir,
      parent,
    });
  }

  // Arena order follows the file order
  let mut order: Vec<usize> = (0..raws.len()).collect();
  order.sort_by_key(|idx| raws[*idx].offset);
  let mut ids = vec![DirectoryId(0); raws.len()];
  for (pos, idx) in order.iter().enumerate() {
    ids[*idx] = DirectoryId(pos);
  }

  let data_start = raws.iter().map(|raw| raw.lowest).min().unwrap_or(TIFF_HEADER_SIZE as u64);
  let data_start = u32::try_from(data_start).map_err(|_| TiffError::Overflow(format!("data start {} exceeds 32 bit", data_start)))?;
  let parents: Vec<Option<Parent>> = raws.iter().map(|raw| raw.parent).collect();
  let mut slots: Vec<Option<RawDirectory>> = raws.into_iter().map(Some).collect();
  let mut directories = Vec::with_capacity(slots.len());
  let mut offsets = Vec::with_capacity(slots.len());
  for idx in &order {
    if let Some(raw) = slots[*idx].take() {
      offsets.push(raw.offset);
      directories.push(raw.dir);
    }
  }

  let mut set = OutputSet::from_parts(directories, ids[0]);
  for (idx, parent) in parents.iter().enumerate() {
    match parent {
      Some(Parent::Link(p, tag)) => set[ids[*p]].add_link(*tag, ids[idx])?,
      Some(Parent::Next(p)) => set[ids[*p]].set_next(Some(ids[idx])),
      None => {}
    }
  }
  info!("Parsed {} directories, data starts at {}", set.len(), data_start);

  Ok(TiffSource {
    endian,
    header,
    set,
    offsets,
    data_start,
  })
}

struct ParsedDirectory {
  dir: Directory,
  /// Pointer tag, child offset, child scope
  links: Vec<(u16, u32, Scope)>,
  next: u32,
  /// Lowest offset of the table, its values and its data blocks
  lowest: u64,
}

fn parse_directory<R: Read + Seek>(reader: &mut EndianReader<R>, len: u64, offset: u32, scope: Scope) -> Result<ParsedDirectory> {
  let offset = u64::from(offset);
  if offset + 2 > len {
    return Err(TiffError::FormatMismatch(format!("directory offset {} is out of bounds", offset)));
  }
  reader.goto(offset)?;
  let count = reader.read_u16()? as u64;
  let table_end = offset + 2 + count * IFD_ENTRY_SIZE as u64 + 4;
  if table_end > len {
    return Err(TiffError::FormatMismatch(format!("directory at {} with {} entries exceeds the stream", offset, count)));
  }
  debug!("{} directory at {}, {} entries", scope, offset, count);

  let mut dir = Directory::new(scope);
  let mut links = Vec::new();
  let mut lowest = offset;
  for i in 0..count {
    let entry = offset + 2 + i * IFD_ENTRY_SIZE as u64;
    reader.goto(entry)?;
    let tag = reader.read_u16()?;
    let code = reader.read_u16()?;
    let typ = DataType::from_code(code).ok_or_else(|| TiffError::FormatMismatch(format!("tag 0x{:04x} at {} has unknown type {}", tag, entry, code)))?;
    let count = reader.read_u32()? as usize;
    let size = count
      .checked_mul(typ.size())
      .ok_or_else(|| TiffError::Overflow(format!("tag 0x{:04x} has too many elements", tag)))?;
    let raw = if size <= 4 {
      reader.read_bytes(4)?
    } else {
      let value_offset = u64::from(reader.read_u32()?);
      if value_offset + size as u64 > len {
        return Err(TiffError::FormatMismatch(format!(
          "value of tag 0x{:04x} at {} with {} bytes exceeds the stream",
          tag, value_offset, size
        )));
      }
      lowest = lowest.min(value_offset);
      reader.goto(value_offset)?;
      reader.read_bytes(size)?
    };
    let value = Value::decode(typ, count, &raw, reader.endian)?;

    if let Some(child_scope) = tags::link_target_scope(tag, scope) {
      match &value {
        Value::Long(v) if v.len() == 1 && v[0] != 0 => links.push((tag, v[0], child_scope)),
        _ => warn!("Ignoring invalid {} pointer 0x{:04x} in {} directory: {:?}", child_scope, tag, scope, value),
      }
      continue;
    }
    insert_field(&mut dir, Field { tag, value })?;
  }
  reader.goto(offset + 2 + count * IFD_ENTRY_SIZE as u64)?;
  let next = reader.read_u32()?;

  if scope == Scope::Root {
    load_image_data(reader, len, &mut dir, &mut lowest)?;
  }
  Ok(ParsedDirectory { dir, links, next, lowest })
}

/// Fields that break a registry rule are kept, a write of the set
/// reports them.
fn insert_field(dir: &mut Directory, field: Field) -> Result<()> {
  match dir.add_field(field.clone()) {
    Ok(()) => Ok(()),
    Err(ValidationError::TypeMismatch { reason, .. }) => {
      warn!("Tag 0x{:04x} in {} directory: {}", field.tag, dir.scope(), reason);
      let pos = dir.fields.partition_point(|f| f.tag < field.tag);
      dir.fields.insert(pos, field);
      Ok(())
    }
    Err(ValidationError::DuplicateTag { tag, scope }) => Err(TiffError::FormatMismatch(format!("duplicate tag 0x{:04x} in {} directory", tag, scope))),
    Err(err) => Err(err.into()),
  }
}

fn read_blocks<R: Read + Seek>(reader: &mut EndianReader<R>, len: u64, offsets: &Field, lengths: &Field, lowest: &mut u64) -> Result<Option<Vec<Vec<u8>>>> {
  if offsets.count() != lengths.count() {
    warn!(
      "Offsets 0x{:04x} has {} elements, lengths 0x{:04x} has {}",
      offsets.tag,
      offsets.count(),
      lengths.tag,
      lengths.count()
    );
    return Ok(None);
  }
  let mut blocks = Vec::with_capacity(offsets.count());
  for i in 0..offsets.count() {
    let (Some(offset), Some(size)) = (offsets.get_u32(i), lengths.get_u32(i)) else {
      warn!("Offsets 0x{:04x} or lengths 0x{:04x} are not unsigned integers", offsets.tag, lengths.tag);
      return Ok(None);
    };
    if u64::from(offset) + u64::from(size) > len {
      return Err(TiffError::FormatMismatch(format!("data block at {} with {} bytes exceeds the stream", offset, size)));
    }
    if size > 0 {
      *lowest = (*lowest).min(u64::from(offset));
    }
    reader.goto(u64::from(offset))?;
    blocks.push(reader.read_bytes(size as usize)?);
  }
  Ok(Some(blocks))
}

/// Pull strips or a JPEG thumbnail into the directory. Offsets of
/// another integer type are converted to LONG.
fn load_image_data<R: Read + Seek>(reader: &mut EndianReader<R>, len: u64, dir: &mut Directory, lowest: &mut u64) -> Result<()> {
  let pairs = [
    (TiffTag::StripOffsets, TiffTag::StripByteCounts),
    (TiffTag::JPEGInterchangeFormat, TiffTag::JPEGInterchangeFormatLength),
  ];
  for (offsets_tag, lengths_tag) in pairs {
    let (Some(offsets), Some(lengths)) = (dir.get(offsets_tag.into()), dir.get(lengths_tag.into())) else {
      continue;
    };
    if dir.image_data().is_some() {
      warn!("Directory has more than one kind of image data, 0x{:04x} is kept as plain field", offsets.tag);
      continue;
    }
    let Some(blocks) = read_blocks(reader, len, offsets, lengths, lowest)? else {
      continue;
    };
    if offsets.data_type() != DataType::Long {
      info!("Converting {} offsets of 0x{:04x} to LONG", offsets.data_type(), offsets.tag);
    }
    // Offsets are placeholders from now on, output assigns new ones
    let tag = offsets.tag;
    dir.remove_field(tag);
    dir.add_field(Field::long(tag, &vec![0; blocks.len()]))?;
    let data = match offsets_tag {
      TiffTag::StripOffsets => ImageData::Strips(blocks),
      _ => ImageData::Jpeg(blocks.into_iter().next().unwrap_or_default()),
    };
    debug!("Loaded {} bytes of image data", data.total_len());
    dir.attach(data);
  }
  Ok(())
}
