//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use ansi_term::Color::{Blue, Green, Red, White, Yellow};
use garnet::codegen::isa::Isa;
use garnet::codegen::regalloc::{ModuleAllocation, RegAllocError};
use std::time::Duration;

pub fn print_header(isa: Isa, functions: usize, seed: u64) {
    let starting = Green.bold().paint("Allocating");
    let isa = White.bold().paint(isa.to_string());

    println!("     {starting} {functions} functions for {isa} (seed {seed})");
}

pub fn print_fatal(err: &RegAllocError) {
    let fatal = Red.bold().paint("Fatal");

    println!("     {fatal} {err}");
}

pub fn print_failures(module: &ModuleAllocation) {
    for (i, err) in module.failures() {
        let failed = Red.bold().paint("FAIL");

        println!("     {failed} function #{i}: {err}");
    }
}

pub fn print_summary(module: &ModuleAllocation, elapsed: Duration) {
    let total = module.results().len();
    let failed = module.failures().count();
    let stats = module.stats();
    let switching_color = if failed == 0 { Green } else { Red };

    let passed = Green.paint(format!("{}", total - failed));
    let total = Blue.paint(format!("{total}"));
    let failed = switching_color.paint(format!("{failed}"));
    let summary = switching_color.bold().paint("Summary");
    let time = format!("{:11}s", elapsed.as_secs_f32());

    println!("     {summary} [ {time} ] {total} functions, {passed} allocated, {failed} failed");

    let spilled = Yellow.paint(format!("{}", stats.spilled_values));

    println!(
        "             {} values, {spilled} spilled, {} reloads, {} edge moves, {} split edges",
        stats.values, stats.reloads, stats.edge_moves, stats.split_edges
    );
}
