// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::path::PathBuf;

use clap::ArgMatches;
use log::debug;
use serde::Serialize;
use tiffout::analyze_structure;

use crate::AppError;

fn print_output<T: Serialize + ?Sized>(obj: &T, options: &ArgMatches) -> crate::Result<()> {
  if options.get_flag("yaml") {
    let yaml = serde_yaml::to_string(obj)?;
    println!("{}", yaml);
  } else {
    let json = serde_json::to_string_pretty(obj)?;
    println!("{}", json);
  }
  Ok(())
}

/// Print the structure report of a TIFF file
pub fn dump(options: &ArgMatches) -> crate::Result<()> {
  let in_file: &PathBuf = options
    .get_one("FILE")
    .ok_or_else(|| AppError::InvalidCmdSwitch("FILE is required".into()))?;
  debug!("Infile: {:?}", in_file);
  if !in_file.exists() {
    return Err(AppError::NotFound(in_file.clone()));
  }
  let buf = std::fs::read(in_file)?;
  let report = analyze_structure(&buf)?;
  print_output(&report, options)
}
