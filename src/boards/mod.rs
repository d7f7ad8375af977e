//! Board targets.
//!
//! A [`Board`] names the annotated target; a [`BoardBackend`] turns an
//! emitted project into firmware: it writes the vendor-SDK shim header and
//! the build manifest, invokes the vendor toolchain, and copies the
//! artifact back. One backend covers the whole RP2040 family, one the
//! PicoSystem, one the Gamebuino.

pub mod gamebuino;
pub mod pico;
pub mod picosystem;

use std::path::Path;

use crate::error::{Error, Result};
use crate::project::Project;

pub(crate) use gamebuino::GamebuinoBackend;
pub(crate) use pico::PicoBackend;
pub(crate) use picosystem::PicosystemBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    Pico,
    PicoW,
    Tiny2040,
    Tiny2040_2mb,
    Badger2040,
    Gamebuino,
    Picosystem,
}

impl Board {
    /// Resolves the `@Board(Type.X)` constant, case-insensitively.
    pub fn parse(name: &str) -> Result<Board> {
        Ok(match name.to_lowercase().as_str() {
            "pico" => Board::Pico,
            "picow" => Board::PicoW,
            "tiny2040" => Board::Tiny2040,
            "tiny2040_2mb" => Board::Tiny2040_2mb,
            "badger2040" => Board::Badger2040,
            "gamebuino" => Board::Gamebuino,
            "picosystem" => Board::Picosystem,
            _ => return Err(Error::UnknownBoard(name.to_string())),
        })
    }

    /// `PICO_BOARD` value understood by the Pico SDK.
    pub fn cmake_name(self) -> &'static str {
        match self {
            Board::Pico => "pico",
            Board::PicoW => "pico_w",
            Board::Tiny2040 => "pimoroni_tiny2040",
            Board::Tiny2040_2mb => "pimoroni_tiny2040_2mb",
            Board::Badger2040 => "pimoroni_badger2040",
            Board::Picosystem => "pimoroni_picosystem",
            Board::Gamebuino => "",
        }
    }

    /// Extension of emitted implementation files.
    pub fn source_extension(self) -> &'static str {
        match self {
            Board::Gamebuino => "ino",
            _ => "cpp",
        }
    }

    /// Name of the vendor-SDK shim header the emitted code includes.
    pub fn shim_file_name(self) -> &'static str {
        match self {
            Board::Gamebuino => "espresso-gamebuino.h",
            _ => "espresso-pico.h",
        }
    }
}

/// One firmware target family.
pub trait BoardBackend {
    fn board(&self) -> Board;

    /// Verifies the vendor SDK / toolchain is reachable before staging.
    fn check_environment(&self) -> Result<()>;

    /// The shim header re-exposing vendor SDK symbols under the namespaces
    /// the decompiled code uses.
    fn shim_header(&self) -> String;

    /// Writes the build-system manifest into the staging directory.
    fn write_manifest(&self, project: &Project, staging: &Path) -> Result<()>;

    /// Invokes the vendor toolchain and copies the firmware artifact into
    /// `output`.
    fn build(&self, project: &Project, staging: &Path, output: &Path) -> Result<()>;
}

pub fn create_backend(board: Board) -> Box<dyn BoardBackend> {
    match board {
        Board::Gamebuino => Box::new(GamebuinoBackend),
        Board::Picosystem => Box::new(PicosystemBackend),
        _ => Box::new(PicoBackend { board }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_names_are_case_insensitive() {
        assert_eq!(Board::parse("Pico").unwrap(), Board::Pico);
        assert_eq!(Board::parse("picow").unwrap(), Board::PicoW);
        assert_eq!(Board::parse("TINY2040").unwrap(), Board::Tiny2040);
        assert_eq!(Board::parse("Tiny2040_2mb").unwrap(), Board::Tiny2040_2mb);
        assert_eq!(Board::parse("badger2040").unwrap(), Board::Badger2040);
        assert_eq!(Board::parse("Gamebuino").unwrap(), Board::Gamebuino);
        assert_eq!(Board::parse("Picosystem").unwrap(), Board::Picosystem);
        assert!(Board::parse("arduboy").is_err());
    }

    #[test]
    fn each_board_dispatches_to_its_backend_family() {
        assert_eq!(create_backend(Board::Pico).board(), Board::Pico);
        assert_eq!(create_backend(Board::Badger2040).board(), Board::Badger2040);
        assert_eq!(create_backend(Board::Gamebuino).board(), Board::Gamebuino);
        assert_eq!(create_backend(Board::Picosystem).board(), Board::Picosystem);
    }

    #[test]
    fn picow_extends_the_shim_with_the_wifi_namespace() {
        let pico = create_backend(Board::Pico).shim_header();
        let picow = create_backend(Board::PicoW).shim_header();

        assert!(pico.contains("namespace gpio"));
        assert!(!pico.contains("cyw43"));
        assert!(picow.contains("namespace wifi"));
        assert!(picow.contains("cyw43_arch_init"));
    }

    #[test]
    fn family_properties() {
        assert_eq!(Board::PicoW.cmake_name(), "pico_w");
        assert_eq!(Board::Badger2040.cmake_name(), "pimoroni_badger2040");
        assert_eq!(Board::Gamebuino.source_extension(), "ino");
        assert_eq!(Board::Pico.source_extension(), "cpp");
        assert_eq!(Board::Picosystem.shim_file_name(), "espresso-pico.h");
        assert_eq!(Board::Gamebuino.shim_file_name(), "espresso-gamebuino.h");
    }
}
