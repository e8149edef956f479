// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Display;

use log::debug;
use serde::Serialize;

use super::{DirectoryId, IFD_ENTRY_SIZE, ImageData, OutputSet, Result, TiffError, layout::pad};
use crate::bits::Endian;

/// Identifies a byte block of the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ItemKey {
  /// Entry table of a directory
  Directory(DirectoryId),
  /// Out-of-line value of the field `tag`
  Overflow(DirectoryId, u16),
  Jpeg(DirectoryId),
  Strip(DirectoryId, usize),
}

impl Display for ItemKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Directory(dir) => write!(f, "IFD {}", dir),
      Self::Overflow(dir, tag) => write!(f, "value 0x{:04x} of IFD {}", tag, dir),
      Self::Jpeg(dir) => write!(f, "JPEG of IFD {}", dir),
      Self::Strip(dir, idx) => write!(f, "strip {} of IFD {}", idx, dir),
    }
  }
}

/// A 4-byte location that receives the offset of another item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Slot {
  /// Value/offset word of an entry whose value lives in an overflow item
  ValueOffset { dir: DirectoryId, tag: u16 },
  /// Element `index` of a LONG field, inline or inside its overflow item
  Element { dir: DirectoryId, tag: u16, index: usize },
  /// Next IFD offset behind the entry table
  NextIfd(DirectoryId),
}

impl Display for Slot {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::ValueOffset { dir, tag } => write!(f, "value offset of 0x{:04x} in IFD {}", tag, dir),
      Self::Element { dir, tag, index } => write!(f, "element {} of 0x{:04x} in IFD {}", index, tag, dir),
      Self::NextIfd(dir) => write!(f, "next IFD offset of {}", dir),
    }
  }
}

/// An encoded byte block with its assigned offset
#[derive(Debug, Clone)]
pub struct OutputItem<'a> {
  key: ItemKey,
  data: Cow<'a, [u8]>,
  offset: Option<u32>,
}

impl<'a> OutputItem<'a> {
  fn new(key: ItemKey, data: Cow<'a, [u8]>) -> Self {
    Self { key, data, offset: None }
  }

  pub fn key(&self) -> ItemKey {
    self.key
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// Length including the alignment byte
  pub fn padded_len(&self) -> usize {
    self.len() + pad(self.len())
  }

  pub fn offset(&self) -> Option<u32> {
    self.offset
  }

  pub(super) fn set_offset(&mut self, offset: u32) {
    self.offset = Some(offset);
  }

  pub(super) fn patch_u32(&mut self, pos: usize, value: u32, endian: Endian) -> Result<()> {
    if pos + 4 > self.data.len() {
      return Err(TiffError::UnresolvedReference(format!(
        "patch position {} outside of {} ({} bytes)",
        pos,
        self.key,
        self.data.len()
      )));
    }
    endian.write_u32(&mut self.data.to_mut()[pos..pos + 4], value);
    Ok(())
  }
}

/// Where the entry of a field has been placed
#[derive(Debug, Clone, Copy)]
struct FieldLocation {
  table: usize,
  entry_pos: usize,
  value_len: usize,
  overflow: Option<usize>,
}

/// Ordered output items of a set, plus the positions of
/// all slots that can receive an offset.
#[derive(Debug, Clone)]
pub struct OutputItems<'a> {
  items: Vec<OutputItem<'a>>,
  index: HashMap<ItemKey, usize>,
  fields: HashMap<(DirectoryId, u16), FieldLocation>,
  next_slots: HashMap<DirectoryId, (usize, usize)>,
  endian: Endian,
}

impl<'a> OutputItems<'a> {
  pub fn endian(&self) -> Endian {
    self.endian
  }

  pub fn iter(&self) -> std::slice::Iter<'_, OutputItem<'a>> {
    self.items.iter()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn get(&self, key: ItemKey) -> Option<&OutputItem<'a>> {
    self.index.get(&key).map(|idx| &self.items[*idx])
  }

  pub fn offset_of(&self, key: ItemKey) -> Option<u32> {
    self.get(key).and_then(OutputItem::offset)
  }

  /// Item index and byte position of a slot
  pub fn locate(&self, slot: Slot) -> Option<(usize, usize)> {
    match slot {
      Slot::ValueOffset { dir, tag } => {
        let loc = self.fields.get(&(dir, tag))?;
        loc.overflow.map(|_| (loc.table, loc.entry_pos + 8))
      }
      Slot::Element { dir, tag, index } => {
        let loc = self.fields.get(&(dir, tag))?;
        if (index + 1) * 4 > loc.value_len {
          return None;
        }
        match loc.overflow {
          Some(item) => Some((item, index * 4)),
          None => Some((loc.table, loc.entry_pos + 8 + index * 4)),
        }
      }
      Slot::NextIfd(dir) => self.next_slots.get(&dir).copied(),
    }
  }

  pub(super) fn items_mut(&mut self) -> &mut [OutputItem<'a>] {
    &mut self.items
  }

  fn push(&mut self, item: OutputItem<'a>) {
    self.index.insert(item.key, self.items.len());
    self.items.push(item);
  }
}

/// Encode every directory of `set` into output items.
///
/// Per directory in set order: the entry table, the overflow values
/// in tag order, the JPEG thumbnail, the strips. All offset words are
/// left zero (or hold the model value) until the layout pass patches them.
pub fn generate(set: &OutputSet, endian: Endian) -> Result<OutputItems<'_>> {
  let mut out = OutputItems {
    items: Vec::new(),
    index: HashMap::new(),
    fields: HashMap::new(),
    next_slots: HashMap::new(),
    endian,
  };

  for (id, dir) in set.iter() {
    let entry_count =
      u16::try_from(dir.entry_count()).map_err(|_| TiffError::Overflow(format!("IFD {} has {} entries, max is {}", id, dir.entry_count(), u16::MAX)))?;
    let table_idx = out.items.len();
    let mut table = Vec::with_capacity(2 + IFD_ENTRY_SIZE * dir.entry_count() + 4);
    let mut overflow = Vec::new();

    endian.put_u16(&mut table, entry_count)?;
    for field in dir.fields() {
      let entry_pos = table.len();
      let count = u32::try_from(field.count()).map_err(|_| TiffError::Overflow(format!("count of tag 0x{:04x} in IFD {} exceeds 32 bit", field.tag, id)))?;
      endian.put_u16(&mut table, field.tag)?;
      endian.put_u16(&mut table, field.data_type().code())?;
      endian.put_u32(&mut table, count)?;

      let mut data = field.encode(endian);
      let value_len = data.len();
      let location = if field.is_inline() {
        data.resize(4, 0);
        table.extend_from_slice(&data);
        None
      } else {
        endian.put_u32(&mut table, 0)?;
        overflow.push(OutputItem::new(ItemKey::Overflow(id, field.tag), Cow::Owned(data)));
        Some(table_idx + overflow.len())
      };
      out.fields.insert(
        (id, field.tag),
        FieldLocation {
          table: table_idx,
          entry_pos,
          value_len,
          overflow: location,
        },
      );
    }
    out.next_slots.insert(id, (table_idx, table.len()));
    endian.put_u32(&mut table, 0)?;
    debug!("IFD {} ({}): {} entries, {} overflow values", id, dir.scope(), entry_count, overflow.len());

    out.push(OutputItem::new(ItemKey::Directory(id), Cow::Owned(table)));
    for item in overflow {
      out.push(item);
    }
    match dir.image_data() {
      Some(ImageData::Jpeg(jpeg)) => out.push(OutputItem::new(ItemKey::Jpeg(id), Cow::Borrowed(jpeg))),
      Some(ImageData::Strips(strips)) => {
        for (i, strip) in strips.iter().enumerate() {
          out.push(OutputItem::new(ItemKey::Strip(id, i), Cow::Borrowed(strip)));
        }
      }
      None => {}
    }
  }
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::formats::tiff::Field;
  use crate::tags::{GeoTiffTag, TiffTag};

  #[test]
  fn single_short_field_table() -> Result<()> {
    let mut set = OutputSet::new();
    set.root_dir_mut().add(GeoTiffTag::GeoKeyDirectory, 4_u16)?;
    let items = generate(&set, Endian::Little)?;
    assert_eq!(items.len(), 1);
    let table = items.get(ItemKey::Directory(set.root())).unwrap();
    assert_eq!(hex::encode(table.data()), "0100af870300010000000400000000000000");
    Ok(())
  }

  #[test]
  fn overflow_items_follow_table_in_tag_order() -> Result<()> {
    let mut set = OutputSet::new();
    let root = set.root();
    set[root].add_field(Field::ascii(TiffTag::Software, "tiffout"))?;
    set[root].add_field(Field::ascii(TiffTag::Make, "Make"))?;
    set[root].add(TiffTag::Orientation, 1_u16)?;
    let items = generate(&set, Endian::Big)?;
    let keys: Vec<ItemKey> = items.iter().map(OutputItem::key).collect();
    assert_eq!(
      keys,
      vec![ItemKey::Directory(root), ItemKey::Overflow(root, 0x010f), ItemKey::Overflow(root, 0x0131)]
    );
    assert_eq!(items.get(ItemKey::Overflow(root, 0x0131)).unwrap().data(), b"tiffout\0");
    assert_eq!(items.get(ItemKey::Overflow(root, 0x010f)).unwrap().len(), 5);
    Ok(())
  }

  #[test]
  fn inline_value_is_left_justified() -> Result<()> {
    let mut set = OutputSet::new();
    set.root_dir_mut().add(TiffTag::Orientation, 6_u16)?;
    let items = generate(&set, Endian::Big)?;
    let table = items.iter().next().unwrap();
    assert_eq!(&table.data()[2..14], &[0x01, 0x12, 0x00, 0x03, 0, 0, 0, 1, 0x00, 0x06, 0, 0]);
    Ok(())
  }

  #[test]
  fn slot_positions() -> Result<()> {
    let mut set = OutputSet::new();
    let root = set.root();
    set[root].add(TiffTag::Make, "Some camera")?;
    set[root].set_strips(vec![vec![0; 8], vec![0; 8]])?;
    let ifd1 = set.add_chained_directory(root)?;
    set[ifd1].set_jpeg_thumbnail(vec![0xff, 0xd8, 0xff, 0xd9])?;
    let items = generate(&set, Endian::Little)?;

    // Make, StripOffsets, StripByteCounts
    assert_eq!(items.locate(Slot::ValueOffset { dir: root, tag: 0x010f }), Some((0, 2 + 8)));
    assert_eq!(items.locate(Slot::Element { dir: root, tag: 0x0111, index: 1 }), Some((2, 4)));
    assert_eq!(items.locate(Slot::Element { dir: root, tag: 0x0111, index: 2 }), None);
    assert_eq!(items.locate(Slot::NextIfd(root)), Some((0, 2 + 3 * 12)));
    assert_eq!(items.locate(Slot::Element { dir: ifd1, tag: 0x0201, index: 0 }), Some((6, 2 + 8)));
    assert_eq!(items.locate(Slot::ValueOffset { dir: ifd1, tag: 0x0201 }), None);

    let keys: Vec<ItemKey> = items.iter().map(OutputItem::key).collect();
    assert_eq!(
      keys,
      vec![
        ItemKey::Directory(root),
        ItemKey::Overflow(root, 0x010f),
        ItemKey::Overflow(root, 0x0111),
        ItemKey::Overflow(root, 0x0117),
        ItemKey::Strip(root, 0),
        ItemKey::Strip(root, 1),
        ItemKey::Directory(ifd1),
        ItemKey::Jpeg(ifd1),
      ]
    );
    Ok(())
  }
}
