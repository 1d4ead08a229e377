#![deny(unsafe_code)]

use std::process::ExitCode as ProcessExitCode;
use std::{env, io};

fn main() -> ProcessExitCode {
    let args: Vec<_> = env::args_os().skip(1).collect();
    let mut stderr = io::stderr().lock();
    ProcessExitCode::from(store::run(&args, &mut stderr))
}
