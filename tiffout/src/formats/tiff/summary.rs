// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::Serialize;

use super::{Directory, DirectoryId, ImageData, ItemKey, OutputSet, Slot, ValidationError, Value};
use crate::tags::{self, Scope, TiffTag};

type VResult<T> = std::result::Result<T, ValidationError>;

/// A slot that must receive the offset of `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatchSite {
  pub slot: Slot,
  pub target: ItemKey,
}

/// Result of a successful validation: every cross-reference of
/// the set as patch site. Offsets are filled in by the layout pass.
#[derive(Debug, Clone)]
pub struct OutputSummary {
  root: DirectoryId,
  patches: Vec<PatchSite>,
  offsets: BTreeMap<ItemKey, u32>,
}

impl OutputSummary {
  pub fn root(&self) -> DirectoryId {
    self.root
  }

  pub fn patch_sites(&self) -> &[PatchSite] {
    &self.patches
  }

  pub fn offset_of(&self, key: ItemKey) -> Option<u32> {
    self.offsets.get(&key).copied()
  }

  /// Offset of the root directory table, available after layout
  pub fn root_offset(&self) -> Option<u32> {
    self.offset_of(ItemKey::Directory(self.root))
  }

  pub fn offsets(&self) -> impl Iterator<Item = (ItemKey, u32)> + '_ {
    self.offsets.iter().map(|(k, v)| (*k, *v))
  }

  /// True once the root and every patch target have an offset
  pub fn is_resolved(&self) -> bool {
    self.root_offset().is_some() && self.patches.iter().all(|site| self.offsets.contains_key(&site.target))
  }

  pub(super) fn record_offset(&mut self, key: ItemKey, offset: u32) {
    self.offsets.insert(key, offset);
  }
}

/// Check the structure of `set` and collect all patch sites.
///
/// Checks run in this order: tag order and empty directories,
/// links (parents, tag semantics, link fields, image data),
/// cycles, registry rules.
pub fn validate(set: &OutputSet) -> VResult<OutputSummary> {
  let root = set.root();
  match set.get(root) {
    Some(dir) if dir.scope() == Scope::Root => {}
    Some(dir) => return Err(ValidationError::LinkMismatch(format!("root directory has scope {}", dir.scope()))),
    None => return Err(ValidationError::MissingLink(format!("root directory {} does not exist", root))),
  }

  for (id, dir) in set.iter() {
    check_tag_order(id, dir)?;
  }
  check_links(set)?;
  check_cycles(set)?;
  for (_, dir) in set.iter() {
    for field in dir.fields() {
      field.check(dir.scope())?;
    }
  }

  let mut patches = Vec::new();
  for (id, dir) in set.iter() {
    collect_patches(id, dir, &mut patches);
  }
  debug!("Validated {} directories, {} patch sites", set.len(), patches.len());
  Ok(OutputSummary {
    root,
    patches,
    offsets: BTreeMap::new(),
  })
}

fn check_tag_order(id: DirectoryId, dir: &Directory) -> VResult<()> {
  if dir.is_empty() {
    return Err(ValidationError::EmptyDirectory { directory: id, scope: dir.scope() });
  }
  // Equal or descending neighbours, both break the ascending order
  if let Some(pair) = dir.fields().windows(2).find(|pair| pair[0].tag >= pair[1].tag) {
    return Err(ValidationError::DuplicateTag {
      tag: pair[1].tag,
      scope: dir.scope(),
    });
  }
  Ok(())
}

fn check_links(set: &OutputSet) -> VResult<()> {
  let mut parents: HashMap<DirectoryId, usize> = HashMap::new();

  for (id, dir) in set.iter() {
    for (tag, child) in dir.links() {
      let child_dir = set
        .get(child)
        .ok_or_else(|| ValidationError::MissingLink(format!("tag 0x{:04x} in {} links to unknown directory {}", tag, id, child)))?;
      let expected = tags::link_target_scope(tag, dir.scope())
        .ok_or_else(|| ValidationError::LinkMismatch(format!("tag 0x{:04x} is not a directory pointer in {}", tag, dir.scope())))?;
      if child_dir.scope() != expected {
        return Err(ValidationError::LinkMismatch(format!(
          "tag 0x{:04x} in {} must link to {}, found {} directory {}",
          tag,
          id,
          expected,
          child_dir.scope(),
          child
        )));
      }
      match dir.get(tag).map(|f| &f.value) {
        Some(Value::Long(v)) if v.len() == 1 => {}
        Some(_) => return Err(ValidationError::LinkMismatch(format!("link field 0x{:04x} in {} is not a single LONG", tag, id))),
        None => return Err(ValidationError::MissingLink(format!("link 0x{:04x} in {} has no field", tag, id))),
      }
      *parents.entry(child).or_default() += 1;
    }

    for field in dir.fields() {
      if tags::link_target_scope(field.tag, dir.scope()).is_some() && dir.link(field.tag).is_none() {
        return Err(ValidationError::MissingLink(format!(
          "pointer field 0x{:04x} in {} has no linked directory",
          field.tag, id
        )));
      }
    }

    if let Some(next) = dir.next() {
      let next_dir = set
        .get(next)
        .ok_or_else(|| ValidationError::MissingLink(format!("next IFD of {} is unknown directory {}", id, next)))?;
      if dir.scope() != Scope::Root || next_dir.scope() != Scope::Root {
        return Err(ValidationError::LinkMismatch(format!(
          "next IFD link from {} ({}) to {} ({}), only allowed between root directories",
          id,
          dir.scope(),
          next,
          next_dir.scope()
        )));
      }
      *parents.entry(next).or_default() += 1;
    }

    if let Some(data) = dir.image_data() {
      check_image_data(id, dir, data)?;
    }
    if dir.scope() == Scope::Root {
      check_unbound_offsets(id, dir)?;
    }
  }

  for id in set.ids().filter(|id| *id != set.root()) {
    match parents.get(&id).copied().unwrap_or(0) {
      0 => return Err(ValidationError::MissingLink(format!("directory {} ({}) is not linked", id, set[id].scope()))),
      1 => {}
      count => return Err(ValidationError::MultipleParents { directory: id, count }),
    }
  }
  Ok(())
}

fn check_image_data(id: DirectoryId, dir: &Directory, data: &ImageData) -> VResult<()> {
  let offsets_tag = data.offsets_tag();
  match dir.get(offsets_tag).map(|f| &f.value) {
    Some(Value::Long(v)) if v.len() == data.block_count() => {}
    Some(_) => {
      return Err(ValidationError::LinkMismatch(format!(
        "offsets field 0x{:04x} in {} must be LONG with {} elements",
        offsets_tag,
        id,
        data.block_count()
      )));
    }
    None => return Err(ValidationError::MissingLink(format!("image data of {} without offsets field 0x{:04x}", id, offsets_tag))),
  }

  let lengths_tag = data.lengths_tag();
  let lengths: Vec<usize> = match data {
    ImageData::Strips(strips) => strips.iter().map(Vec::len).collect(),
    ImageData::Jpeg(jpeg) => vec![jpeg.len()],
  };
  let field = dir
    .get(lengths_tag)
    .ok_or_else(|| ValidationError::MissingLink(format!("image data of {} without length field 0x{:04x}", id, lengths_tag)))?;
  let matches = field.count() == lengths.len() && lengths.iter().enumerate().all(|(i, len)| field.get_u32(i).map(|v| v as usize) == Some(*len));
  if !matches {
    return Err(ValidationError::LinkMismatch(format!(
      "length field 0x{:04x} in {} does not match the attached data",
      lengths_tag, id
    )));
  }
  Ok(())
}

/// Offsets fields are only written with the data they point to
fn check_unbound_offsets(id: DirectoryId, dir: &Directory) -> VResult<()> {
  let bound = dir.image_data().map(ImageData::offsets_tag);
  for tag in [u16::from(TiffTag::StripOffsets), u16::from(TiffTag::JPEGInterchangeFormat)] {
    if dir.contains(tag) && bound != Some(tag) {
      return Err(ValidationError::MissingLink(format!("offsets field 0x{:04x} in {} has no attached data", tag, id)));
    }
  }
  Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Unvisited,
  InProgress,
  Done,
}

fn children(dir: &Directory) -> Vec<DirectoryId> {
  dir.links().map(|(_, child)| child).chain(dir.next()).collect()
}

/// Depth-first walk from the root, then from every directory the
/// root did not reach. Hitting a directory that is still in progress
/// closes a cycle.
fn check_cycles(set: &OutputSet) -> VResult<()> {
  let mut marks = vec![Mark::Unvisited; set.len()];

  for start in std::iter::once(set.root()).chain(set.ids()) {
    if marks[start.index()] != Mark::Unvisited {
      continue;
    }
    marks[start.index()] = Mark::InProgress;
    let mut stack = vec![(start, children(&set[start]), 0_usize)];

    while let Some((node, pending, pos)) = stack.last_mut() {
      if let Some(child) = pending.get(*pos).copied() {
        *pos += 1;
        match marks[child.index()] {
          Mark::InProgress => return Err(ValidationError::CyclicReference { directory: child }),
          Mark::Done => {}
          Mark::Unvisited => {
            marks[child.index()] = Mark::InProgress;
            stack.push((child, children(&set[child]), 0));
          }
        }
      } else {
        marks[node.index()] = Mark::Done;
        stack.pop();
      }
    }
  }
  Ok(())
}

fn collect_patches(id: DirectoryId, dir: &Directory, patches: &mut Vec<PatchSite>) {
  for field in dir.fields().iter().filter(|f| !f.is_inline()) {
    patches.push(PatchSite {
      slot: Slot::ValueOffset { dir: id, tag: field.tag },
      target: ItemKey::Overflow(id, field.tag),
    });
  }
  for (tag, child) in dir.links() {
    patches.push(PatchSite {
      slot: Slot::Element { dir: id, tag, index: 0 },
      target: ItemKey::Directory(child),
    });
  }
  if let Some(next) = dir.next() {
    patches.push(PatchSite {
      slot: Slot::NextIfd(id),
      target: ItemKey::Directory(next),
    });
  }
  if let Some(data) = dir.image_data() {
    let tag = data.offsets_tag();
    for index in 0..data.block_count() {
      let target = match data {
        ImageData::Strips(_) => ItemKey::Strip(id, index),
        ImageData::Jpeg(_) => ItemKey::Jpeg(id),
      };
      patches.push(PatchSite {
        slot: Slot::Element { dir: id, tag, index },
        target,
      });
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::formats::tiff::Field;
  use crate::tags::{ExifTag, GpsTag, InteropTag, TiffTag};

  fn exif_set() -> OutputSet {
    let mut set = OutputSet::new();
    let root = set.root();
    set[root].add(TiffTag::Make, "Camera").unwrap();
    let exif = set.add_sub_directory(root, TiffTag::ExifIFDPointer).unwrap();
    set[exif].add(ExifTag::ExposureProgram, 2_u16).unwrap();
    set
  }

  #[test]
  fn patch_sites_of_linked_set() {
    let set = exif_set();
    let summary = validate(&set).unwrap();
    let root = set.root();
    let exif = set.root_dir().link(0x8769).unwrap();
    assert_eq!(
      summary.patch_sites(),
      &[
        PatchSite {
          slot: Slot::ValueOffset { dir: root, tag: 0x010f },
          target: ItemKey::Overflow(root, 0x010f),
        },
        PatchSite {
          slot: Slot::Element { dir: root, tag: 0x8769, index: 0 },
          target: ItemKey::Directory(exif),
        },
      ]
    );
    assert_eq!(summary.root_offset(), None);
  }

  #[test]
  fn empty_directory() {
    let mut set = exif_set();
    set.add_sub_directory(set.root(), TiffTag::GPSInfo).unwrap();
    assert!(matches!(validate(&set), Err(ValidationError::EmptyDirectory { scope: Scope::Gps, .. })));
  }

  #[test]
  fn duplicate_in_model_is_detected() {
    let mut set = exif_set();
    set.root_dir_mut().fields.push(Field::ascii(TiffTag::Make, "Other"));
    assert!(matches!(validate(&set), Err(ValidationError::DuplicateTag { tag: 0x010f, .. })));
  }

  #[test]
  fn unlinked_directory() {
    let mut set = exif_set();
    let gps = set.add_directory(Scope::Gps);
    set[gps].add(GpsTag::GPSVersionID, [2_u8, 3, 0, 0]).unwrap();
    assert!(matches!(validate(&set), Err(ValidationError::MissingLink(_))));
  }

  #[test]
  fn pointer_without_link() {
    let mut set = exif_set();
    set.root_dir_mut().add_field(Field::long(TiffTag::GPSInfo, &[1234])).unwrap();
    assert!(matches!(validate(&set), Err(ValidationError::MissingLink(_))));
  }

  #[test]
  fn link_to_wrong_scope() {
    let mut set = OutputSet::new();
    let root = set.root();
    set[root].add(TiffTag::Make, "Camera").unwrap();
    let interop = set.add_directory(Scope::Interop);
    set[interop].add(InteropTag::InteropIndex, "R98").unwrap();
    set[root].add_link(TiffTag::ExifIFDPointer, interop).unwrap();
    assert!(matches!(validate(&set), Err(ValidationError::LinkMismatch(_))));
  }

  #[test]
  fn multiple_parents() {
    let mut set = exif_set();
    let root = set.root();
    let exif = set.root_dir().link(0x8769).unwrap();
    let ifd1 = set.add_chained_directory(root).unwrap();
    set[ifd1].add(TiffTag::Compression, 6_u16).unwrap();
    set[ifd1].add_link(TiffTag::ExifIFDPointer, exif).unwrap();
    assert_eq!(
      validate(&set).unwrap_err(),
      ValidationError::MultipleParents { directory: exif, count: 2 }
    );
  }

  #[test]
  fn cycle_between_root_directories() {
    let mut set = exif_set();
    let root = set.root();
    let ifd1 = set.add_chained_directory(root).unwrap();
    set[ifd1].add(TiffTag::Compression, 6_u16).unwrap();
    set[ifd1].set_next(Some(root));
    assert_eq!(validate(&set).unwrap_err(), ValidationError::CyclicReference { directory: root });
  }

  #[test]
  fn cycle_outside_of_root() {
    let mut set = exif_set();
    let a = set.add_directory(Scope::Root);
    let b = set.add_directory(Scope::Root);
    set[a].add(TiffTag::Compression, 1_u16).unwrap();
    set[b].add(TiffTag::Compression, 1_u16).unwrap();
    set[a].set_next(Some(b));
    set[b].set_next(Some(a));
    assert!(matches!(validate(&set), Err(ValidationError::CyclicReference { .. })));
  }

  #[test]
  fn registry_rule_in_model_is_checked() {
    let mut set = exif_set();
    set.root_dir_mut().fields.insert(0, Field::ascii(TiffTag::ImageWidth, "x"));
    assert!(matches!(validate(&set), Err(ValidationError::TypeMismatch { tag: 0x0100, .. })));
  }

  #[test]
  fn image_data_needs_offsets_field() {
    let mut set = exif_set();
    set.root_dir_mut().attach(ImageData::Jpeg(vec![0xff, 0xd8]));
    assert!(matches!(validate(&set), Err(ValidationError::MissingLink(_))));

    set.root_dir_mut().add_field(Field::long(TiffTag::JPEGInterchangeFormat, &[0])).unwrap();
    set.root_dir_mut().add_field(Field::long(TiffTag::JPEGInterchangeFormatLength, &[3])).unwrap();
    assert!(matches!(validate(&set), Err(ValidationError::LinkMismatch(_))));
  }

  #[test]
  fn strip_patch_sites() {
    let mut set = exif_set();
    let root = set.root();
    set[root].set_strips(vec![vec![1], vec![2], vec![3]]).unwrap();
    let summary = validate(&set).unwrap();
    let strips: Vec<&PatchSite> = summary.patch_sites().iter().filter(|p| matches!(p.target, ItemKey::Strip(..))).collect();
    assert_eq!(strips.len(), 3);
    assert_eq!(strips[2].slot, Slot::Element { dir: root, tag: 0x0111, index: 2 });
  }

  #[test]
  fn offsets_field_without_data() {
    let mut set = exif_set();
    set.root_dir_mut().add(TiffTag::StripOffsets, 0_u32).unwrap();
    set.root_dir_mut().add(TiffTag::StripByteCounts, 2_u32).unwrap();
    assert!(matches!(validate(&set), Err(ValidationError::MissingLink(_))));
  }

  #[test]
  fn resolved_after_layout_only() -> crate::formats::tiff::Result<()> {
    use crate::bits::Endian;
    use crate::formats::tiff::{generate, layout};

    let set = exif_set();
    let mut summary = validate(&set)?;
    assert!(!summary.is_resolved());
    summary.record_offset(ItemKey::Directory(set.root()), 8);
    assert!(!summary.is_resolved());

    let mut items = generate(&set, Endian::Little)?;
    layout(&mut items, &mut summary, 8)?;
    assert!(summary.is_resolved());
    Ok(())
  }
}
