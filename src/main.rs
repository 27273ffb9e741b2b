// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Command-line entry point: decode a `.wasm` module and print its
//! decompilation.

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;

/// Decompiles a WebAssembly binary module into readable pseudocode.
#[derive(Parser)]
#[command(name = "wasmdec", version, about)]
struct Args {
    /// Path to the .wasm module to decompile.
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Usage problems (no input file, surplus arguments) exit 1.
            let _ = err.print();
            process::exit(1);
        }
    };

    let bytes = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let module = wasmdec::decode::decode_module(&bytes)?;
    let text = wasmdec::print::render_module(&module)?;
    print!("{text}");
    Ok(())
}
