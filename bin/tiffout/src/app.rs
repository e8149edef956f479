// SPDX-License-Identifier: LGPL-2.1
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, crate_version, value_parser};

pub fn create_app() -> Command {
  Command::new("tiffout")
    .version(crate_version!())
    .author("Daniel V. <daniel@chaospixel.com>")
    .about("Inspect and rewrite the directory structure of TIFF streams")
    .subcommand_required(true)
    .arg(
      Arg::new("debug")
        .short('d')
        .action(ArgAction::Count)
        .global(true)
        .help("Sets the level of debugging information"),
    )
    .subcommand(
      Command::new("dump")
        .about("Print the directory structure and layout of a TIFF file")
        .arg(Arg::new("yaml").long("yaml").action(ArgAction::SetTrue).help("Format output as YAML"))
        .arg(Arg::new("FILE").required(true).value_parser(value_parser!(PathBuf)).help("Input file")),
    )
    .subcommand(
      Command::new("rewrite")
        .about("Parse a TIFF file and serialize its directories again")
        .arg(
          Arg::new("rebuild")
            .long("rebuild")
            .action(ArgAction::SetTrue)
            .help("Write a fresh header instead of keeping the original one"),
        )
        .arg(
          Arg::new("verbatim_header")
            .long("verbatim-header")
            .action(ArgAction::SetTrue)
            .conflicts_with("rebuild")
            .help("Copy the original header without relinking the first directory"),
        )
        .arg(
          Arg::new("keep_original")
            .long("keep-original")
            .action(ArgAction::SetTrue)
            .conflicts_with("rebuild")
            .help("Keep the complete original stream and append the new directories"),
        )
        .arg(
          Arg::new("big_endian")
            .long("big-endian")
            .action(ArgAction::SetTrue)
            .conflicts_with("little_endian")
            .help("Write big endian (Motorola) byte order"),
        )
        .arg(
          Arg::new("little_endian")
            .long("little-endian")
            .action(ArgAction::SetTrue)
            .help("Write little endian (Intel) byte order"),
        )
        .arg(
          Arg::new("override")
            .short('f')
            .long("override")
            .action(ArgAction::SetTrue)
            .help("Override existing files"),
        )
        .arg(Arg::new("INPUT").required(true).value_parser(value_parser!(PathBuf)).help("Input file"))
        .arg(Arg::new("OUTPUT").required(true).value_parser(value_parser!(PathBuf)).help("Output file")),
    )
}
