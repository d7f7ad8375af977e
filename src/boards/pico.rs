//! The RP2040 family: Pico, Pico W, Tiny2040 (both flash sizes) and
//! Badger2040. Builds with the Pico SDK through CMake.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::boards::{Board, BoardBackend};
use crate::emit::{RESOURCES_FILE, USER_FILE};
use crate::error::{Error, Result};
use crate::project::{copy_file, execute, Project};

pub(crate) struct PicoBackend {
    pub(crate) board: Board,
}

impl BoardBackend for PicoBackend {
    fn board(&self) -> Board {
        self.board
    }

    fn check_environment(&self) -> Result<()> {
        if std::env::var_os("PICO_SDK_PATH").is_none() {
            return Err(Error::MissingSdk("PICO_SDK_PATH"));
        }
        Ok(())
    }

    fn shim_header(&self) -> String {
        let mut shim = String::from(PICO_SHIM);
        if self.board == Board::PicoW {
            shim.push_str(PICO_W_SHIM);
        }
        shim
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

        let libs = if self.board == Board::PicoW {
            " pico_cyw43_arch_none"
        } else {
            ""
        };

        let manifest = format!(
            r#"cmake_minimum_required(VERSION 3.12)

set(PICO_BOARD "{board}")

include($ENV{{PICO_SDK_PATH}}/external/pico_sdk_import.cmake)

project({name})

pico_sdk_init()

add_executable({name}
{sources})

pico_add_extra_outputs({name})

target_link_libraries({name} pico_stdlib{libs})
"#,
            board = self.board.cmake_name(),
            name = project.name,
            sources = sources,
            libs = libs,
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

const PICO_SHIM: &str = r#"#include "pico/stdlib.h"

namespace pico
{
    namespace stdio
    {
        inline void init_all()
        {
            stdio_init_all();
        }
    }

    namespace gpio
    {
        static inline int INPUT = GPIO_IN;
        static inline int OUTPUT = GPIO_OUT;

        inline void init(int pin)
        {
            gpio_init(pin);
        }

        inline void set_dir(int pin, int dir)
        {
            gpio_set_dir(pin, dir);
        }

        inline void put(int pin, int value)
        {
            gpio_put(pin, value);
        }

        inline bool get(int pin)
        {
            return gpio_get(pin);
        }

        inline void pull_up(int pin)
        {
            gpio_pull_up(pin);
        }

        inline void set_mask(int mask)
        {
            gpio_set_mask(mask);
        }

        inline void clr_mask(int mask)
        {
            gpio_clr_mask(mask);
        }

        inline void set_irq_enabled_with_callback(int pin, int events, bool enabled, gpio_irq_callback_t callback)
        {
            gpio_set_irq_enabled_with_callback(pin, events, enabled, callback);
        }
    }

    namespace time
    {
        inline void sleep_ms(int ms)
        {
            ::sleep_ms(ms);
        }
    }
}
"#;

const PICO_W_SHIM: &str = r#"
#include "pico/cyw43_arch.h"

namespace pico
{
    namespace wifi
    {
        static inline int LED_PIN = CYW43_WL_GPIO_LED_PIN;

        inline void init()
        {
            cyw43_arch_init();
        }

        inline void gpio_put(int pin, int status)
        {
            cyw43_arch_gpio_put(pin, status);
        }
    }
}
"#;
