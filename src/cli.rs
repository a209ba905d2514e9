//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Contains utility code specifically for the CLI tools located in
//! the `tools/` subdirectory.
//!
//! Every tool takes the same basic arguments and should look/feel uniform,
//! so most of the code is pulled into this module and then used in the
//! drivers of the different tools.

use crate::codegen::isa::Isa;
use crate::codegen::RegAllocOptions;
use bpaf::{construct, OptionParser, Parser};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Basic options that every CLI tool in the suite takes in.
pub struct BaseOptions {
    /// The file to output results to
    pub output: Option<PathBuf>,
    /// Whether or not to run the logging in verbose mode.
    pub verbose: bool,
    /// The target to allocate registers for.
    pub isa: Isa,
    /// The number of concurrent jobs to use, if the user picked one.
    pub jobs: Option<usize>,
}

/// Returns a [`OptionParser`] preconfigured with the standard options and
/// additional tool-specific options.
pub fn tool_with<T>(
    description: &'static str,
    usage: &'static str,
    additional: impl Parser<T> + 'static,
) -> OptionParser<(T, BaseOptions)> {
    let res = construct!(additional, default());

    res.to_options()
        .descr(description)
        .version(VERSION)
        .usage(usage)
}

/// Gets the baseline default options that every tool needs.
pub fn default() -> impl Parser<BaseOptions> {
    let output = output();
    let verbose = verbose();
    let isa = isa();
    let jobs = jobs();

    construct!(BaseOptions {
        output,
        verbose,
        isa,
        jobs,
    })
}

/// Gets the output file specified on the CLI, if one exists.
pub fn output() -> impl Parser<Option<PathBuf>> {
    bpaf::long("output")
        .short('o')
        .help("the file to output to")
        .argument::<PathBuf>("FILE")
        .optional()
}

/// Checks for the presence of `-v` or `--verbose`
pub fn verbose() -> impl Parser<bool> {
    bpaf::long("verbose")
        .short('v')
        .help("enable verbose output")
        .flag(true, false)
}

/// The target ISA, `amd64` unless the user says otherwise.
pub fn isa() -> impl Parser<Isa> {
    bpaf::long("isa")
        .help("the register description to use, one of 'amd64', 'arm64', 'debug3reg'")
        .argument::<Isa>("ISA")
        .fallback(Isa::Amd64)
}

/// Gets the number of concurrent threads to use for a given task
pub fn jobs() -> impl Parser<Option<usize>> {
    bpaf::long("jobs")
        .short('j')
        .help("the number of concurrent jobs to run on")
        .argument::<usize>("JOBS")
        .optional()
}

/// The allocator options, `-fno-*` style.
pub fn regalloc_options() -> impl Parser<RegAllocOptions> {
    let no_verify = bpaf::long("fno-verify")
        .help("don't check allocations after they are made")
        .switch();
    let no_slot_reuse = bpaf::long("fno-reuse-spill-slots")
        .help("give every spilled value its own slot")
        .switch();
    let no_split = bpaf::long("fno-split-critical-edges")
        .help("treat critical edges that need moves as errors")
        .switch();

    construct!(no_verify, no_slot_reuse, no_split).map(|(no_verify, no_slot_reuse, no_split)| {
        RegAllocOptions {
            verify: !no_verify,
            reuse_spill_slots: !no_slot_reuse,
            split_critical_edges: !no_split,
        }
    })
}

/// The seed for anything random, picked from the clock if not given.
pub fn seed() -> impl Parser<Option<u64>> {
    bpaf::long("seed")
        .short('s')
        .help("the seed for generating inputs")
        .argument::<u64>("SEED")
        .optional()
}

/// A numeric knob with a default.
pub fn count(name: &'static str, help: &'static str, fallback: usize) -> impl Parser<usize> {
    bpaf::long(name)
        .help(help)
        .argument::<usize>("N")
        .fallback(fallback)
}
