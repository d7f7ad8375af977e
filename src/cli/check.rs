use std::path::PathBuf;

use clap::Args;

use espresso::Project;

#[derive(Args)]
pub struct CheckArgs {
    /// Project directory with .java sources (default: current directory)
    #[arg(default_value = ".")]
    pub dir: PathBuf,
    /// Print only the file names, not their contents
    #[arg(long)]
    pub names: bool,
}

pub fn cmd_check(args: CheckArgs) {
    let project = match Project::compile(&args.dir) {
        Ok(project) => project,
        Err(error) => super::fail(error),
    };

    let files = match project.emit_files() {
        Ok(files) => files,
        Err(error) => super::fail(error),
    };

    for (file_name, contents) in files {
        if args.names {
            println!("{file_name}");
        } else {
            println!("// ----- {file_name}");
            println!("{contents}");
        }
    }

    eprintln!(
        "Checked {} ({} classes, board {:?})",
        project.name,
        project.classes.len(),
        project.board
    );
}
