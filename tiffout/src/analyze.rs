// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use serde::Serialize;

use crate::bits::Endian;
use crate::formats::tiff::{DataType, DirectoryId, ImageData, PrefixStrategy, RebuildHeader, Result, TiffSource, generate, layout, parse, validate};
use crate::tags::Scope;

/// Number of array elements printed per field
const VALUE_LIMIT: usize = 16;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureReport {
  pub byte_order: Endian,
  pub root: DirectoryId,
  pub directories: Vec<DirectoryReport>,
  /// Item placement of a rebuilt stream, empty if the model is invalid
  pub layout: Vec<ItemReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryReport {
  pub id: DirectoryId,
  pub scope: Scope,
  pub offset: Option<u32>,
  pub next: Option<DirectoryId>,
  pub links: Vec<LinkReport>,
  pub fields: Vec<FieldReport>,
  pub image_data: Option<ImageDataReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkReport {
  pub tag: String,
  pub target: DirectoryId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReport {
  pub tag: String,
  pub name: Option<&'static str>,
  pub data_type: DataType,
  pub count: usize,
  pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDataReport {
  pub kind: &'static str,
  pub blocks: usize,
  pub bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
  pub item: String,
  pub offset: u32,
  pub length: usize,
}

/// Parse a stream and describe its directory structure
pub fn analyze_structure(buf: &[u8]) -> Result<StructureReport> {
  let source = parse(buf)?;
  Ok(structure_report(&source))
}

pub fn structure_report(source: &TiffSource) -> StructureReport {
  let set = &source.set;
  let directories = set
    .iter()
    .map(|(id, dir)| DirectoryReport {
      id,
      scope: dir.scope(),
      offset: source.directory_offset(id),
      next: dir.next(),
      links: dir
        .links()
        .map(|(tag, target)| LinkReport {
          tag: format!("0x{:04x}", tag),
          target,
        })
        .collect(),
      fields: dir
        .fields()
        .iter()
        .map(|field| FieldReport {
          tag: format!("0x{:04x}", field.tag),
          name: field.name(dir.scope()),
          data_type: field.data_type(),
          count: field.count(),
          value: field.visual_rep(VALUE_LIMIT),
        })
        .collect(),
      image_data: dir.image_data().map(|data| ImageDataReport {
        kind: match data {
          ImageData::Strips(_) => "strips",
          ImageData::Jpeg(_) => "jpeg",
        },
        blocks: data.block_count(),
        bytes: data.total_len(),
      }),
    })
    .collect();

  StructureReport {
    byte_order: source.endian,
    root: set.root(),
    directories,
    layout: layout_report(source).unwrap_or_default(),
  }
}

fn layout_report(source: &TiffSource) -> Result<Vec<ItemReport>> {
  let mut summary = validate(&source.set)?;
  let mut items = generate(&source.set, source.endian)?;
  layout(&mut items, &mut summary, RebuildHeader.base_offset(source.endian)?)?;
  Ok(
    items
      .iter()
      .filter_map(|item| {
        item.offset().map(|offset| ItemReport {
          item: item.key().to_string(),
          offset,
          length: item.len(),
        })
      })
      .collect(),
  )
}
