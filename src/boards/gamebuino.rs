//! Gamebuino-Meta: an Arduino sketch built with `arduino-cli`. The staged
//! `.ino` files are the bundle; no separate manifest file is needed.

use std::path::Path;

use crate::boards::{Board, BoardBackend};
use crate::error::{Error, Result};
use crate::project::{can_execute, copy_file, execute, Project};

const FQBN: &str = "gamebuino:samd:gamebuino_meta_native";

pub(crate) struct GamebuinoBackend;

impl BoardBackend for GamebuinoBackend {
    fn board(&self) -> Board {
        Board::Gamebuino
    }

    fn check_environment(&self) -> Result<()> {
        if !can_execute("arduino-cli") {
            return Err(Error::ToolMissing("arduino-cli".to_string()));
        }
        Ok(())
    }

    fn shim_header(&self) -> String {
        GAMEBUINO_SHIM.to_string()
    }

    fn write_manifest(&self, _project: &Project, _staging: &Path) -> Result<()> {
        // the sketch directory of .ino files is the build manifest
        Ok(())
    }

    fn build(&self, project: &Project, staging: &Path, output: &Path) -> Result<()> {
        execute(
            staging,
            "arduino-cli",
            &["compile", "--fqbn", FQBN, "--output-dir", "build"],
        )?;

        let artifact = staging.join("build").join(format!("{}.ino.bin", project.name));
        copy_file(&artifact, &output.join(format!("{}.bin", project.name)))
    }
}

const GAMEBUINO_SHIM: &str = r#"#include <Gamebuino-Meta.h>

namespace gamebuino {
    namespace gb {
        inline void begin() { ::gb.begin(); }
        inline void waitForUpdate() { ::gb.waitForUpdate(); }
        inline void setFrameRate(int fps) { ::gb.setFrameRate(fps); }

        inline auto & display = ::gb.display;
        inline auto & buttons = ::gb.buttons;
        inline auto & frameCount = ::gb.frameCount;
    }

    namespace Button {
        inline auto A = BUTTON_A;
        inline auto B = BUTTON_B;
        inline auto LEFT = BUTTON_LEFT;
        inline auto RIGHT = BUTTON_RIGHT;
        inline auto UP = BUTTON_UP;
        inline auto DOWN = BUTTON_DOWN;
        inline auto MENU = BUTTON_MENU;
    }

    using Image = ::Gamebuino_Meta::Image;
}
"#;
