use std::path::PathBuf;

use clap::Args;

use espresso::Project;

#[derive(Args)]
pub struct BuildArgs {
    /// Project directory with .java sources (default: current directory)
    #[arg(default_value = ".")]
    pub dir: PathBuf,
    /// Stage the project but skip the vendor toolchain
    #[arg(long)]
    pub no_toolchain: bool,
}

pub fn cmd_build(args: BuildArgs) {
    let project = match Project::compile(&args.dir) {
        Ok(project) => project,
        Err(error) => super::fail(error),
    };

    let staged = if args.no_toolchain {
        project.stage()
    } else {
        project.build()
    };

    match staged {
        Ok(staging) => {
            eprintln!(
                "Compiled {} for {:?} -> {}",
                project.name,
                project.board,
                staging.display()
            );
        }
        Err(error) => super::fail(error),
    }
}
