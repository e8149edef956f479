// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::fs::{File, remove_file};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::ArgMatches;
use log::{debug, info};
use tiffout::formats::tiff::HeaderMode;
use tiffout::{Endian, PrefixRegion, WriteMode, WriteParams};

use crate::AppError;

fn write_params(options: &ArgMatches) -> WriteParams {
  let endian = if options.get_flag("big_endian") {
    Some(Endian::Big)
  } else if options.get_flag("little_endian") {
    Some(Endian::Little)
  } else {
    None
  };
  WriteParams {
    mode: if options.get_flag("rebuild") { WriteMode::Rebuild } else { WriteMode::Lossless },
    header: if options.get_flag("verbatim_header") {
      HeaderMode::Verbatim
    } else {
      HeaderMode::Relink
    },
    prefix: if options.get_flag("keep_original") {
      PrefixRegion::WholeStream
    } else {
      PrefixRegion::Header
    },
    endian,
  }
}

/// Entry point for Clap sub command `rewrite`
pub fn rewrite(options: &ArgMatches) -> crate::Result<()> {
  let in_file: &PathBuf = options
    .get_one("INPUT")
    .ok_or_else(|| AppError::InvalidCmdSwitch("INPUT is required".into()))?;
  let out_file: &PathBuf = options
    .get_one("OUTPUT")
    .ok_or_else(|| AppError::InvalidCmdSwitch("OUTPUT is required".into()))?;

  if !in_file.exists() {
    return Err(AppError::NotFound(in_file.clone()));
  }
  if out_file.exists() && !options.get_flag("override") {
    return Err(AppError::AlreadyExists(out_file.clone()));
  }

  let params = write_params(options);
  debug!("Rewrite {:?} -> {:?} with {:?}", in_file, out_file, params);
  let now = Instant::now();
  let input = std::fs::read(in_file)?;
  // Nothing is created if the stream cannot be written
  let output = tiffout::rewrite(&input, &params)?;

  match write_file(out_file, &output) {
    Ok(()) => {
      info!("Rewrite finished in {:.3}s", now.elapsed().as_secs_f32());
      eprintln!("Writing TIFF output file: {}", out_file.display());
      Ok(())
    }
    Err(err) => {
      if let Err(err) = remove_file(out_file) {
        log::error!("Failed to delete output file after write error: {:?}", err);
      }
      Err(err)
    }
  }
}

fn write_file(path: &Path, data: &[u8]) -> crate::Result<()> {
  let mut out = BufWriter::new(File::create(path)?);
  out.write_all(data)?;
  out.flush()?;
  Ok(())
}
