//! `spdm-get` - print a value from an XML, JSON or G-EQDSK document.
//!
//! Usage:
//!   spdm-get <uri-or-file> [path] [--lazy]
//!
//! Logging goes to stderr and follows `RUST_LOG`.

use std::io::{self, Write};

use spdm_data::cli::{get, init_logging, parse_args};

fn main() {
    init_logging();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    match get(&args) {
        Ok(json) => {
            let mut out = io::stdout().lock();
            if writeln!(out, "{json}").is_err() {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
