mod emulator;

use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::Parser;
use log::error;

use frameshell::engine::PatternEngine;
use frameshell::joypad::{Port, MAX_PORTS};

use crate::emulator::{Emulator, Options};

#[derive(Debug, Parser)]
#[command(version, about = "Puts an emulation engine's frames on screen and feeds it input")]
struct Args {
    /// Program image to load at start-up. Files can also be dropped onto the window.
    rom: Option<PathBuf>,

    /// Window size as a multiple of 256x240.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=16))]
    scale: u32,

    /// Controller port driven by the touch overlay and the gamepads.
    #[arg(long, default_value_t = 0)]
    port: u8,

    /// Do not read physical gamepads.
    #[arg(long)]
    no_gamepad: bool,

    /// Log filter, in env_logger syntax.
    #[arg(long, default_value = "frameshell=info")]
    log: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::builder()
        .parse_filters(&args.log)
        .parse_default_env()
        .init();

    ensure!(
        usize::from(args.port) < MAX_PORTS,
        "Port {} is out of range, there are {} ports",
        args.port,
        MAX_PORTS
    );

    let mut emulator = Emulator::new(
        PatternEngine::new(),
        Options {
            scale: args.scale,
            port: Port(args.port),
            gamepad: !args.no_gamepad,
        },
    );
    if let Some(rom) = &args.rom {
        // A bad image leaves the console idle, the window still opens
        if let Err(e) = emulator.load(rom) {
            error!("{:#}", e);
        }
    }

    emulator.run()
}
