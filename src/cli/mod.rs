pub mod build;
pub mod check;

use std::process;

use espresso::Error;

/// Prints the diagnostic and exits non-zero. Diagnostics go to standard
/// output; the staging directory, if any, is left for inspection.
pub fn fail(error: Error) -> ! {
    println!("error: {error}");
    process::exit(1);
}
