//! Project orchestration: source discovery, frontend invocation, the
//! two-pass parse, staging, and backend dispatch.
//!
//! One invocation compiles one project, strictly sequentially. Class
//! discovery order is the sorted directory listing, which makes every pass
//! deterministic. The staging directory under the OS temp path is left in
//! place after a failure for inspection.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::boards::{create_backend, Board};
use crate::classfile::{ClassFile, ParseMode};
use crate::emit::{Emitter, RESOURCES_FILE, USER_FILE};
use crate::error::{Error, Result};
use crate::resources::ResourceRegistry;

/// A fully decompiled project, ready for a board backend.
pub struct Project {
    /// Name of the board-annotated class; also the firmware name.
    pub name: String,
    pub board: Board,
    pub classes: Vec<ClassFile>,
    pub resources: ResourceRegistry,
    /// Directory the sources were discovered in.
    pub root: PathBuf,
}

impl Project {
    /// Runs the frontend and both parse passes over every `.java` file in
    /// `dir`.
    pub fn compile(dir: &Path) -> Result<Project> {
        let sources = discover_sources(dir)?;

        for source in &sources {
            let file = source.to_string_lossy();
            execute(dir, "javac", &[file.as_ref()])?;
        }

        let stems: Vec<String> = sources
            .iter()
            .map(|s| s.file_stem().unwrap_or_default().to_string_lossy().into_owned())
            .collect();

        // first pass: metadata only, to locate the board class
        let mut board_class: Option<(String, String)> = None;
        for stem in &stems {
            let mut scratch = ResourceRegistry::new();
            let bytes = read_class(dir, stem)?;
            let class = ClassFile::parse(&bytes, stem, "", ParseMode::Partial, &mut scratch)?;

            if let Some(board) = class.board {
                if board_class.is_some() {
                    return Err(Error::MultipleBoardClasses);
                }
                board_class = Some((stem.clone(), board));
            }
        }
        let (name, board_name) = board_class.ok_or(Error::NoBoardClass)?;
        let board = Board::parse(&board_name)?;

        // second pass: full decompilation
        let mut resources = ResourceRegistry::new();
        let mut classes = Vec::with_capacity(stems.len());
        for stem in &stems {
            let bytes = read_class(dir, stem)?;
            classes.push(ClassFile::parse(
                &bytes,
                stem,
                &name,
                ParseMode::Full,
                &mut resources,
            )?);
        }

        Ok(Project {
            name,
            board,
            classes,
            resources,
            root: dir.to_path_buf(),
        })
    }

    /// The emitted translation units, as `(file name, contents)` pairs in
    /// class order.
    pub fn emit_files(&self) -> Result<Vec<(String, String)>> {
        let emitter = Emitter::new(self.board, &self.classes);

        let mut files = Vec::new();
        for class in &self.classes {
            files.push((format!("{}.h", class.name), emitter.header(class)?));
            files.push((
                format!("{}.{}", class.name, emitter.source_extension()),
                emitter.source(class)?,
            ));
        }

        Ok(files)
    }

    /// Writes everything the vendor toolchain needs into the staging
    /// directory: translation units, shim header, resources, user files
    /// and the build manifest.
    pub fn stage(&self) -> Result<PathBuf> {
        let staging = std::env::temp_dir().join(format!("espresso-{}", self.name));
        fs::create_dir_all(staging.join("build")).map_err(Error::io(&staging))?;

        for (file_name, contents) in self.emit_files()? {
            let path = staging.join(file_name);
            fs::write(&path, contents).map_err(Error::io(path))?;
        }

        let backend = create_backend(self.board);
        let shim = staging.join(self.board.shim_file_name());
        fs::write(&shim, backend.shim_header()).map_err(Error::io(shim))?;

        if !self.resources.is_empty() {
            let header = staging.join(format!("{RESOURCES_FILE}.h"));
            fs::write(&header, self.resources.emit_header()).map_err(Error::io(header))?;
            let source = staging.join(format!("{RESOURCES_FILE}.cpp"));
            fs::write(&source, self.resources.emit_source(&self.root)?)
                .map_err(Error::io(source))?;
        }

        for user_file in [
            format!("{USER_FILE}.h"),
            format!("{USER_FILE}.cpp"),
            format!("{USER_FILE}.ino"),
        ] {
            let from = self.root.join(&user_file);
            if from.exists() {
                copy_file(&from, &staging.join(&user_file))?;
            }
        }

        backend.write_manifest(self, &staging)?;
        Ok(staging)
    }

    /// Full pipeline tail: environment check, staging, vendor build, and
    /// artifact copy-back into the project root. Returns the staging
    /// directory.
    pub fn build(&self) -> Result<PathBuf> {
        let backend = create_backend(self.board);
        backend.check_environment()?;

        let staging = self.stage()?;
        backend.build(self, &staging, &self.root)?;
        Ok(staging)
    }
}

/// All `.java` files of the working directory, sorted by name.
fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(Error::io(dir))?;

    let mut sources: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(Error::io(dir))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "java") {
            sources.push(path.file_name().map(PathBuf::from).unwrap_or(path));
        }
    }
    sources.sort();

    if sources.is_empty() {
        return Err(Error::NoSources);
    }
    Ok(sources)
}

fn read_class(dir: &Path, stem: &str) -> Result<Vec<u8>> {
    let path = dir.join(format!("{stem}.class"));
    let bytes = fs::read(&path).map_err(Error::io(&path))?;
    if bytes.is_empty() {
        return Err(Error::EmptyFile(path));
    }
    Ok(bytes)
}

/// Runs an external tool in `dir`, discarding its output. A missing
/// binary and a non-zero exit are both fatal.
pub(crate) fn execute(dir: &Path, program: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|_| Error::ToolMissing(program.to_string()))?;

    if !output.status.success() {
        return Err(Error::ToolFailed(program.to_string()));
    }
    Ok(())
}

/// True when `program` is reachable through `PATH`.
pub(crate) fn can_execute(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub(crate) fn copy_file(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map(|_| ()).map_err(Error::io(from))
}
