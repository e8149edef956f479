// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use log::warn;

/// Default limit for directories in a parsed stream
pub const DEFAULT_MAX_DIRECTORIES: usize = 256;

pub(crate) fn tiffout_max_directories() -> usize {
  match std::env::var("TIFFOUT_MAX_DIRECTORIES").map(|val| val.parse::<usize>()) {
    Ok(Ok(value)) if value > 0 => value,
    Ok(_) => {
      warn!("Invalid value for TIFFOUT_MAX_DIRECTORIES");
      DEFAULT_MAX_DIRECTORIES
    }
    Err(_) => DEFAULT_MAX_DIRECTORIES,
  }
}
