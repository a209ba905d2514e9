//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2023 Evan Cox <evanacox00@gmail.com>. All rights reserved.      //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

mod display;

use bpaf::Parser;
use garnet::cli;
use garnet::codegen::generate::{self, Shape};
use garnet::codegen::regalloc::allocate_module;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::fs;
use std::process::ExitCode;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn main() -> ExitCode {
    #[cfg(windows)]
    ansi_term::enable_ansi_support().expect("unable to enable ANSI");

    let functions = cli::count("functions", "how many functions to generate", 64);
    let blocks = cli::count("blocks", "the most blocks a function can have", 8);
    let values = cli::count("values", "the most values a block can define", 12);
    let no_fixed = bpaf::long("no-fixed")
        .help("never pin operands to physical registers")
        .switch();
    let seed = cli::seed();
    let options = cli::regalloc_options();
    let ((functions, blocks, values, no_fixed, seed, options), base) = cli::tool_with(
        "register allocator stress tester",
        "rac [--isa <ISA>] [--functions <N>] [--seed <SEED>]",
        bpaf::construct!(functions, blocks, values, no_fixed, seed, options),
    )
    .run();

    let level = if base.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );

    let seed = seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });
    let shape = Shape {
        max_blocks: blocks.max(1),
        max_values: values.max(1),
        fixed_operands: !no_fixed,
    };
    let funcs = generate::functions(seed, functions, shape);
    let info = base.isa.registers();
    let start = Instant::now();

    display::print_header(base.isa, funcs.len(), seed);

    let module = match allocate_module(funcs, info, &options, base.jobs) {
        Ok(module) => module,
        Err(err) => {
            display::print_fatal(&err);

            return ExitCode::from(2);
        }
    };

    display::print_failures(&module);
    display::print_summary(&module, start.elapsed());

    if let Some(path) = &base.output {
        let dump: Vec<_> = module
            .results()
            .iter()
            .flatten()
            .map(|alloc| alloc.to_string())
            .collect();

        if let Err(err) = fs::write(path, dump.join("\n\n")) {
            eprintln!("unable to write output to file `{}`: {err}", path.display());

            return ExitCode::from(1);
        }
    }

    if module.failures().next().is_some() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
