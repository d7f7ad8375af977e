//! Pimoroni PicoSystem: Pico SDK plus the PicoSystem SDK's CMake glue.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::boards::{Board, BoardBackend};
use crate::emit::{RESOURCES_FILE, USER_FILE};
use crate::error::{Error, Result};
use crate::project::{copy_file, execute, Project};

pub(crate) struct PicosystemBackend;

impl BoardBackend for PicosystemBackend {
    fn board(&self) -> Board {
        Board::Picosystem
    }

    fn check_environment(&self) -> Result<()> {
        if std::env::var_os("PICO_SDK_PATH").is_none() {
            return Err(Error::MissingSdk("PICO_SDK_PATH"));
        }
        if std::env::var_os("PICOSYSTEM_SDK_PATH").is_none() {
            return Err(Error::MissingSdk("PICOSYSTEM_SDK_PATH"));
        }
        Ok(())
    }

    fn shim_header(&self) -> String {
        PICOSYSTEM_SHIM.to_string()
    }

    fn write_manifest(&self, project: &Project, staging: &Path) -> Result<()> {
        let mut sources = String::new();
        for class in &project.classes {
            let _ = writeln!(sources, "    {}.cpp", class.name);
        }
        if staging.join(format!("{USER_FILE}.cpp")).exists() {
            let _ = writeln!(sources, "    {USER_FILE}.cpp");
        }
        if staging.join(format!("{RESOURCES_FILE}.cpp")).exists() {
            let _ = writeln!(sources, "    {RESOURCES_FILE}.cpp");
        }

        let manifest = format!(
            r#"cmake_minimum_required(VERSION 3.12)

set(PICO_BOARD "pimoroni_picosystem")

set(PROJECT_NAME
    {name}
)

set(PROJECT_SOURCES
{sources})

include($ENV{{PICO_SDK_PATH}}/external/pico_sdk_import.cmake)

project(${{PROJECT_NAME}})

pico_sdk_init()

find_package(PICOSYSTEM REQUIRED PATHS $ENV{{PICOSYSTEM_SDK_PATH}})

picosystem_executable(${{PROJECT_NAME}} ${{PROJECT_SOURCES}})
"#,
            name = project.name,
            sources = sources,
        );

        let path = staging.join("CMakeLists.txt");
        fs::write(&path, manifest).map_err(Error::io(path))
    }

    fn build(&self, project: &Project, staging: &Path, output: &Path) -> Result<()> {
        let build_dir = staging.join("build");
        execute(&build_dir, "cmake", &[".."])?;
        execute(&build_dir, "make", &[])?;

        let artifact = build_dir.join(format!("{}.uf2", project.name));
        copy_file(&artifact, &output.join(format!("{}.uf2", project.name)))
    }
}

const PICOSYSTEM_SHIM: &str = r#"#include "picosystem.hpp"

namespace picosystem
{
    namespace screen
    {
        inline void pen(int r, int g, int b)
        {
            ::picosystem::pen(r, g, b);
        }

        inline void clear()
        {
            ::picosystem::clear();
        }

        inline void pixel(int x, int y)
        {
            ::picosystem::pixel(x, y);
        }

        inline void rect(int x, int y, int w, int h)
        {
            ::picosystem::rect(x, y, w, h);
        }

        inline void text(std::string message, int x, int y)
        {
            ::picosystem::text(message, x, y);
        }
    }

    namespace buttons
    {
        inline bool pressed(int button)
        {
            return ::picosystem::pressed(button);
        }

        static inline int A = ::picosystem::A;
        static inline int B = ::picosystem::B;
        static inline int X = ::picosystem::X;
        static inline int Y = ::picosystem::Y;
        static inline int UP = ::picosystem::UP;
        static inline int DOWN = ::picosystem::DOWN;
        static inline int LEFT = ::picosystem::LEFT;
        static inline int RIGHT = ::picosystem::RIGHT;
    }
}
"#;
