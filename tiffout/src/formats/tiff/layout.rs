// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use log::debug;

use super::{OutputItems, OutputSummary, Result, TiffError};

/// Pad bytes required behind a block of `len` bytes so the
/// next block starts on a word boundary.
#[inline]
pub fn pad(len: usize) -> usize {
  len & 1
}

/// First pass: assign consecutive offsets starting at `base`.
/// Returns the offset behind the last item.
pub fn assign_offsets(items: &mut OutputItems, base: u32) -> Result<u32> {
  let mut cursor = u64::from(base);
  for item in items.items_mut() {
    let offset = u32::try_from(cursor).map_err(|_| TiffError::Overflow(format!("offset {} of {} exceeds 32 bit", cursor, item.key())))?;
    item.set_offset(offset);
    debug!("{} at offset {}, {} bytes", item.key(), offset, item.len());
    cursor += item.padded_len() as u64;
  }
  u32::try_from(cursor).map_err(|_| TiffError::Overflow(format!("output size {} exceeds 32 bit", cursor)))
}

/// Second pass: write the offset of each patch target into its slot
/// and record all assigned offsets in the summary.
pub fn resolve_patches(items: &mut OutputItems, summary: &mut OutputSummary) -> Result<()> {
  let endian = items.endian();
  let offsets: Vec<_> = items.iter().map(|item| (item.key(), item.offset())).collect();
  for (key, offset) in offsets {
    let offset = offset.ok_or_else(|| TiffError::UnresolvedReference(format!("{} has no offset", key)))?;
    summary.record_offset(key, offset);
  }

  for site in summary.patch_sites() {
    let target = items
      .offset_of(site.target)
      .ok_or_else(|| TiffError::UnresolvedReference(format!("target {} of {} has no offset", site.target, site.slot)))?;
    let (item, pos) = items
      .locate(site.slot)
      .ok_or_else(|| TiffError::UnresolvedReference(format!("slot {} not found in output", site.slot)))?;
    items.items_mut()[item].patch_u32(pos, target, endian)?;
  }
  Ok(())
}

/// Run both layout passes, returns the end offset of the output
pub fn layout(items: &mut OutputItems, summary: &mut OutputSummary, base: u32) -> Result<u32> {
  let end = assign_offsets(items, base)?;
  resolve_patches(items, summary)?;
  debug!("Layout of {} items from {} to {}", items.len(), base, end);
  Ok(end)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bits::Endian;
  use crate::formats::tiff::{Field, ItemKey, OutputItem, OutputSet, Rational, Slot, generate, validate};
  use crate::tags::{ExifTag, TiffTag};

  fn sample_set() -> OutputSet {
    let mut set = OutputSet::new();
    let root = set.root();
    set[root].add(TiffTag::Make, "Odd").unwrap();
    set[root].add(TiffTag::Software, "tiffout 0.1").unwrap();
    set[root].add(TiffTag::XResolution, Rational::new(300, 1)).unwrap();
    set[root].set_strips(vec![vec![7; 5], vec![9; 4]]).unwrap();
    let exif = set.add_sub_directory(root, TiffTag::ExifIFDPointer).unwrap();
    set[exif].add_field(Field::undefined(ExifTag::UserComment, vec![0; 9])).unwrap();
    let ifd1 = set.add_chained_directory(root).unwrap();
    set[ifd1].set_jpeg_thumbnail(vec![0xff, 0xd8, 0x00, 0xff, 0xd9]).unwrap();
    set
  }

  #[test]
  fn pad_is_one_for_odd() {
    assert_eq!(pad(0), 0);
    assert_eq!(pad(7), 1);
    assert_eq!(pad(18), 0);
  }

  #[test]
  fn offsets_are_consecutive_and_even() -> Result<()> {
    let set = sample_set();
    let mut summary = validate(&set)?;
    let mut items = generate(&set, Endian::Little)?;
    let end = layout(&mut items, &mut summary, 8)?;

    let all: Vec<&OutputItem> = items.iter().collect();
    assert_eq!(all[0].offset(), Some(8));
    for pair in all.windows(2) {
      let (a, b) = (pair[0], pair[1]);
      assert_eq!(b.offset().unwrap(), a.offset().unwrap() + (a.len() + pad(a.len())) as u32);
    }
    assert!(all.iter().all(|item| item.offset().unwrap() % 2 == 0));
    let last = all.last().unwrap();
    assert_eq!(end, last.offset().unwrap() + last.padded_len() as u32);
    Ok(())
  }

  #[test]
  fn every_patch_site_holds_its_target() -> Result<()> {
    let set = sample_set();
    for endian in [Endian::Little, Endian::Big] {
      let mut summary = validate(&set)?;
      let mut items = generate(&set, endian)?;
      layout(&mut items, &mut summary, 8)?;
      assert!(summary.is_resolved());
      for site in summary.patch_sites() {
        let (idx, pos) = items.locate(site.slot).unwrap();
        let item = items.iter().nth(idx).unwrap();
        assert_eq!(endian.read_u32(item.data(), pos), summary.offset_of(site.target).unwrap(), "{}", site.slot);
      }
      assert_eq!(summary.root_offset(), Some(8));
    }
    Ok(())
  }

  #[test]
  fn next_ifd_points_to_chained_table() -> Result<()> {
    let set = sample_set();
    let mut summary = validate(&set)?;
    let mut items = generate(&set, Endian::Big)?;
    layout(&mut items, &mut summary, 0)?;
    let root = set.root();
    let ifd1 = set.root_dir().next().unwrap();
    let (idx, pos) = items.locate(Slot::NextIfd(root)).unwrap();
    let table = items.iter().nth(idx).unwrap();
    assert_eq!(Endian::Big.read_u32(table.data(), pos), items.offset_of(ItemKey::Directory(ifd1)).unwrap());
    Ok(())
  }

  #[test]
  fn offset_overflow() -> Result<()> {
    let set = sample_set();
    let mut items = generate(&set, Endian::Little)?;
    assert!(matches!(assign_offsets(&mut items, u32::MAX - 16), Err(TiffError::Overflow(_))));
    Ok(())
  }

  #[test]
  fn missing_slot_is_unresolved() -> Result<()> {
    let set = sample_set();
    let mut summary = validate(&set)?;
    let other = {
      let mut other = OutputSet::new();
      other.root_dir_mut().add(TiffTag::Make, "Odd").unwrap();
      other
    };
    let mut items = generate(&other, Endian::Little)?;
    assign_offsets(&mut items, 8)?;
    assert!(matches!(resolve_patches(&mut items, &mut summary), Err(TiffError::UnresolvedReference(_))));
    Ok(())
  }
}
