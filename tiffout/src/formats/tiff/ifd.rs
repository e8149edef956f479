// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::{Index, IndexMut};

use serde::Serialize;

use super::{Field, ValidationError, Value};
use crate::tags::{self, Scope, TiffTag};

type VResult<T> = std::result::Result<T, ValidationError>;

/// Handle of a directory inside an [`OutputSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DirectoryId(pub(crate) usize);

impl DirectoryId {
  pub fn index(&self) -> usize {
    self.0
  }
}

impl Display for DirectoryId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Raw data blocks owned by a directory. Their offsets are
/// stored in the offsets field named by `offsets_tag()`.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
  /// Strip data, bound to StripOffsets/StripByteCounts
  Strips(Vec<Vec<u8>>),
  /// A JPEG thumbnail, bound to JPEGInterchangeFormat/Length
  Jpeg(Vec<u8>),
}

impl ImageData {
  pub fn offsets_tag(&self) -> u16 {
    match self {
      Self::Strips(_) => TiffTag::StripOffsets.into(),
      Self::Jpeg(_) => TiffTag::JPEGInterchangeFormat.into(),
    }
  }

  pub fn lengths_tag(&self) -> u16 {
    match self {
      Self::Strips(_) => TiffTag::StripByteCounts.into(),
      Self::Jpeg(_) => TiffTag::JPEGInterchangeFormatLength.into(),
    }
  }

  /// Number of blocks, one offset is required for each
  pub fn block_count(&self) -> usize {
    match self {
      Self::Strips(strips) => strips.len(),
      Self::Jpeg(_) => 1,
    }
  }

  pub fn total_len(&self) -> usize {
    match self {
      Self::Strips(strips) => strips.iter().map(Vec::len).sum(),
      Self::Jpeg(jpeg) => jpeg.len(),
    }
  }
}

/// A single image file directory of the output model
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
  pub(super) scope: Scope,
  /// Ascending by tag, no duplicates
  pub(super) fields: Vec<Field>,
  pub(super) links: BTreeMap<u16, DirectoryId>,
  pub(super) next: Option<DirectoryId>,
  pub(super) data: Option<ImageData>,
}

impl Directory {
  pub fn new(scope: Scope) -> Self {
    Self {
      scope,
      fields: Vec::new(),
      links: BTreeMap::new(),
      next: None,
      data: None,
    }
  }

  pub fn scope(&self) -> Scope {
    self.scope
  }

  /// Insert a field at its sorted position. The field is checked
  /// against the registry rule for this directory scope.
  pub fn add_field(&mut self, field: Field) -> VResult<()> {
    field.check(self.scope)?;
    match self.fields.binary_search_by_key(&field.tag, |f| f.tag) {
      Ok(_) => Err(ValidationError::DuplicateTag {
        tag: field.tag,
        scope: self.scope,
      }),
      Err(pos) => {
        self.fields.insert(pos, field);
        Ok(())
      }
    }
  }

  /// Shortcut for `add_field(Field::new(tag, value))`
  pub fn add<T: Into<u16>, V: Into<Value>>(&mut self, tag: T, value: V) -> VResult<()> {
    self.add_field(Field::new(tag, value))
  }

  pub fn remove_field(&mut self, tag: u16) -> Option<Field> {
    match self.fields.binary_search_by_key(&tag, |f| f.tag) {
      Ok(pos) => {
        self.links.remove(&tag);
        Some(self.fields.remove(pos))
      }
      Err(_) => None,
    }
  }

  pub fn get(&self, tag: u16) -> Option<&Field> {
    self.fields.binary_search_by_key(&tag, |f| f.tag).ok().map(|pos| &self.fields[pos])
  }

  pub fn contains(&self, tag: u16) -> bool {
    self.get(tag).is_some()
  }

  pub fn fields(&self) -> &[Field] {
    &self.fields
  }

  pub fn entry_count(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  /// Link a child directory through a pointer tag. A placeholder
  /// LONG field is inserted, the real offset is patched in on output.
  pub fn add_link<T: Into<u16>>(&mut self, tag: T, child: DirectoryId) -> VResult<()> {
    let tag = tag.into();
    self.add_field(Field::long(tag, &[0]))?;
    self.links.insert(tag, child);
    Ok(())
  }

  pub fn links(&self) -> impl Iterator<Item = (u16, DirectoryId)> + '_ {
    self.links.iter().map(|(tag, id)| (*tag, *id))
  }

  pub fn link(&self, tag: u16) -> Option<DirectoryId> {
    self.links.get(&tag).copied()
  }

  /// Set the directory that follows this one in the IFD chain
  pub fn set_next(&mut self, next: Option<DirectoryId>) {
    self.next = next;
  }

  pub fn next(&self) -> Option<DirectoryId> {
    self.next
  }

  /// Attach raw data without touching any field. The matching
  /// offsets field must be present before output.
  pub fn attach(&mut self, data: ImageData) {
    self.data = Some(data);
  }

  pub fn image_data(&self) -> Option<&ImageData> {
    self.data.as_ref()
  }

  /// Attach strips and add StripOffsets/StripByteCounts for them
  pub fn set_strips(&mut self, strips: Vec<Vec<u8>>) -> VResult<()> {
    let counts: Vec<u32> = strips.iter().map(|s| s.len() as u32).collect();
    let offsets = Field::long(TiffTag::StripOffsets, &vec![0; strips.len()]);
    let lengths = Field::long(TiffTag::StripByteCounts, &counts);
    self.attach_with_fields(ImageData::Strips(strips), offsets, lengths)
  }

  /// Attach a JPEG thumbnail and add JPEGInterchangeFormat/Length
  pub fn set_jpeg_thumbnail(&mut self, jpeg: Vec<u8>) -> VResult<()> {
    let len = jpeg.len() as u32;
    let offsets = Field::long(TiffTag::JPEGInterchangeFormat, &[0]);
    let lengths = Field::long(TiffTag::JPEGInterchangeFormatLength, &[len]);
    self.attach_with_fields(ImageData::Jpeg(jpeg), offsets, lengths)
  }

  /// All checks run before the directory is touched, a failed
  /// call leaves it unchanged.
  fn attach_with_fields(&mut self, data: ImageData, offsets: Field, lengths: Field) -> VResult<()> {
    if let Some(existing) = &self.data {
      return Err(ValidationError::LinkMismatch(format!(
        "{} directory already has image data bound to 0x{:04x}",
        self.scope,
        existing.offsets_tag()
      )));
    }
    for field in [&offsets, &lengths] {
      if self.contains(field.tag) {
        return Err(ValidationError::DuplicateTag {
          tag: field.tag,
          scope: self.scope,
        });
      }
      field.check(self.scope)?;
    }
    self.add_field(offsets)?;
    self.add_field(lengths)?;
    self.attach(data);
    Ok(())
  }
}

/// The complete directory model that is written to a stream.
/// Directories live in an arena and refer to each other by
/// [`DirectoryId`], output order follows the arena order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSet {
  directories: Vec<Directory>,
  root: DirectoryId,
}

impl Default for OutputSet {
  fn default() -> Self {
    Self::new()
  }
}

impl OutputSet {
  /// New set with an empty root directory (IFD0)
  pub fn new() -> Self {
    Self {
      directories: vec![Directory::new(Scope::Root)],
      root: DirectoryId(0),
    }
  }

  pub(crate) fn from_parts(directories: Vec<Directory>, root: DirectoryId) -> Self {
    Self { directories, root }
  }

  pub fn root(&self) -> DirectoryId {
    self.root
  }

  pub fn root_dir(&self) -> &Directory {
    &self[self.root]
  }

  pub fn root_dir_mut(&mut self) -> &mut Directory {
    let root = self.root;
    &mut self[root]
  }

  /// Add an unlinked directory. It must be linked before output.
  pub fn add_directory(&mut self, scope: Scope) -> DirectoryId {
    self.directories.push(Directory::new(scope));
    DirectoryId(self.directories.len() - 1)
  }

  /// Add a sub-directory linked from `parent` through the pointer `tag`.
  /// The scope of the new directory follows from the tag.
  pub fn add_sub_directory<T: Into<u16>>(&mut self, parent: DirectoryId, tag: T) -> VResult<DirectoryId> {
    let tag = tag.into();
    let parent_scope = self
      .get(parent)
      .ok_or_else(|| ValidationError::MissingLink(format!("parent directory {} does not exist", parent)))?
      .scope;
    let scope = tags::link_target_scope(tag, parent_scope)
      .ok_or_else(|| ValidationError::LinkMismatch(format!("tag 0x{:04x} is not a directory pointer in {}", tag, parent_scope)))?;
    if self[parent].contains(tag) {
      return Err(ValidationError::DuplicateTag { tag, scope: parent_scope });
    }
    let child = self.add_directory(scope);
    self[parent].add_link(tag, child)?;
    Ok(child)
  }

  /// Insert a new root-scoped directory (IFD1, ...) behind `prev` in the
  /// chain. A directory that already follows `prev` moves behind the new one.
  pub fn add_chained_directory(&mut self, prev: DirectoryId) -> VResult<DirectoryId> {
    match self.get(prev) {
      Some(dir) if dir.scope != Scope::Root => {
        return Err(ValidationError::LinkMismatch(format!("{} directory {} can't have a next directory", dir.scope, prev)));
      }
      Some(_) => {}
      None => return Err(ValidationError::MissingLink(format!("directory {} does not exist", prev))),
    }
    let child = self.add_directory(Scope::Root);
    let following = self[prev].next();
    self[child].set_next(following);
    self[prev].set_next(Some(child));
    Ok(child)
  }

  pub fn get(&self, id: DirectoryId) -> Option<&Directory> {
    self.directories.get(id.0)
  }

  pub fn get_mut(&mut self, id: DirectoryId) -> Option<&mut Directory> {
    self.directories.get_mut(id.0)
  }

  pub fn contains(&self, id: DirectoryId) -> bool {
    id.0 < self.directories.len()
  }

  pub fn len(&self) -> usize {
    self.directories.len()
  }

  pub fn is_empty(&self) -> bool {
    self.directories.is_empty()
  }

  pub fn ids(&self) -> impl Iterator<Item = DirectoryId> {
    (0..self.directories.len()).map(DirectoryId)
  }

  /// All directories in output order
  pub fn iter(&self) -> impl Iterator<Item = (DirectoryId, &Directory)> {
    self.directories.iter().enumerate().map(|(i, dir)| (DirectoryId(i), dir))
  }
}

impl Index<DirectoryId> for OutputSet {
  type Output = Directory;

  fn index(&self, id: DirectoryId) -> &Self::Output {
    &self.directories[id.0]
  }
}

impl IndexMut<DirectoryId> for OutputSet {
  fn index_mut(&mut self, id: DirectoryId) -> &mut Self::Output {
    &mut self.directories[id.0]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bits::Endian;
  use crate::formats::tiff::{RebuildHeader, Result, write};
  use crate::tags::{ExifTag, InteropTag};

  #[test]
  fn fields_stay_sorted() -> std::result::Result<(), ValidationError> {
    let mut dir = Directory::new(Scope::Root);
    dir.add(TiffTag::Software, "tiffout")?;
    dir.add(TiffTag::ImageWidth, 16_u32)?;
    dir.add(TiffTag::Orientation, 1_u16)?;
    let tags: Vec<u16> = dir.fields().iter().map(|f| f.tag).collect();
    assert_eq!(tags, vec![0x0100, 0x0112, 0x0131]);
    Ok(())
  }

  #[test]
  fn duplicate_tag_is_rejected() {
    let mut dir = Directory::new(Scope::Root);
    dir.add(TiffTag::Make, "A").unwrap();
    let err = dir.add(TiffTag::Make, "B").unwrap_err();
    assert_eq!(err, ValidationError::DuplicateTag { tag: 0x010f, scope: Scope::Root });
    assert_eq!(dir.get(0x010f).unwrap().value, Value::from("A"));
  }

  #[test]
  fn type_is_checked_on_insert() {
    let mut dir = Directory::new(Scope::Root);
    assert!(matches!(dir.add(TiffTag::ImageWidth, "wide"), Err(ValidationError::TypeMismatch { .. })));
    assert!(dir.is_empty());
  }

  #[test]
  fn sub_directories_get_scope_from_tag() -> std::result::Result<(), ValidationError> {
    let mut set = OutputSet::new();
    let exif = set.add_sub_directory(set.root(), TiffTag::ExifIFDPointer)?;
    let interop = set.add_sub_directory(exif, ExifTag::InteropIFDPointer)?;
    assert_eq!(set[exif].scope(), Scope::Exif);
    assert_eq!(set[interop].scope(), Scope::Interop);
    assert_eq!(set.root_dir().link(0x8769), Some(exif));
    assert_eq!(set.root_dir().get(0x8769).unwrap().value, Value::Long(vec![0]));
    assert!(set.add_sub_directory(interop, InteropTag::InteropIndex).is_err());
    Ok(())
  }

  #[test]
  fn chained_directory() -> std::result::Result<(), ValidationError> {
    let mut set = OutputSet::new();
    let ifd1 = set.add_chained_directory(set.root())?;
    assert_eq!(set.root_dir().next(), Some(ifd1));
    let exif = set.add_sub_directory(set.root(), TiffTag::ExifIFDPointer)?;
    assert!(set.add_chained_directory(exif).is_err());
    Ok(())
  }

  #[test]
  fn strips_add_offset_fields() -> std::result::Result<(), ValidationError> {
    let mut dir = Directory::new(Scope::Root);
    dir.set_strips(vec![vec![1, 2, 3], vec![4, 5]])?;
    assert_eq!(dir.get(0x0111).unwrap().value, Value::Long(vec![0, 0]));
    assert_eq!(dir.get(0x0117).unwrap().value, Value::Long(vec![3, 2]));
    assert_eq!(dir.image_data().map(ImageData::total_len), Some(5));
    Ok(())
  }

  #[test]
  fn remove_drops_link() -> std::result::Result<(), ValidationError> {
    let mut set = OutputSet::new();
    set.add_sub_directory(set.root(), TiffTag::GPSInfo)?;
    assert!(set.root_dir_mut().remove_field(0x8825).is_some());
    assert_eq!(set.root_dir().links().count(), 0);
    Ok(())
  }

  #[test]
  fn chained_directory_is_spliced_in() -> Result<()> {
    let mut set = OutputSet::new();
    let root = set.root();
    set[root].add(TiffTag::Orientation, 1_u16)?;
    let ifd1 = set.add_chained_directory(root)?;
    set[ifd1].add(TiffTag::Compression, 6_u16)?;
    let inserted = set.add_chained_directory(root)?;
    set[inserted].add(TiffTag::Compression, 1_u16)?;
    assert_eq!(set.root_dir().next(), Some(inserted));
    assert_eq!(set[inserted].next(), Some(ifd1));
    assert_eq!(set[ifd1].next(), None);

    let mut out = Vec::new();
    write(&mut out, &set, &RebuildHeader, Endian::Little)?;
    Ok(())
  }

  #[test]
  fn failed_strips_leave_directory_unchanged() {
    let mut dir = Directory::new(Scope::Root);
    dir.add(TiffTag::StripByteCounts, 2_u32).unwrap();
    let before = dir.clone();
    let err = dir.set_strips(vec![vec![1, 2]]).unwrap_err();
    assert_eq!(err, ValidationError::DuplicateTag { tag: 0x0117, scope: Scope::Root });
    assert_eq!(dir, before);
    assert!(!dir.contains(0x0111));
    assert!(dir.image_data().is_none());
  }

  #[test]
  fn second_image_data_is_rejected() -> std::result::Result<(), ValidationError> {
    let mut dir = Directory::new(Scope::Root);
    dir.set_jpeg_thumbnail(vec![0xff, 0xd8, 0xff, 0xd9])?;
    let before = dir.clone();
    assert!(matches!(dir.set_strips(vec![vec![1]]), Err(ValidationError::LinkMismatch(_))));
    assert_eq!(dir, before);
    Ok(())
  }

  #[test]
  fn failed_sub_directory_adds_nothing() {
    let mut set = OutputSet::new();
    let root = set.root();
    set[root].add_field(Field::long(TiffTag::GPSInfo, &[0])).unwrap();
    let err = set.add_sub_directory(root, TiffTag::GPSInfo).unwrap_err();
    assert_eq!(err, ValidationError::DuplicateTag { tag: 0x8825, scope: Scope::Root });
    assert_eq!(set.len(), 1);
    assert_eq!(set.root_dir().links().count(), 0);
  }
}
