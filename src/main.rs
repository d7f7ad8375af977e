mod cli;

use clap::{Parser, Subcommand};

use cli::build::BuildArgs;
use cli::check::CheckArgs;

#[derive(Parser)]
#[command(
    name = "espresso",
    version,
    about = "Ahead-of-time Java classfile to C++ cross-compiler for small embedded boards"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile the project and build the firmware image
    Build(BuildArgs),
    /// Decompile only and print the generated C++
    Check(CheckArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => cli::build::cmd_build(args),
        Command::Check(args) => cli::check::cmd_check(args),
    }
}
