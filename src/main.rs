//! gm8run CLI entry point.

use std::process::ExitCode;

use log::{error, info};
use winit::event_loop::EventLoop;

use gm8run::config;
use gm8run::loader;
use gm8run::logger;
use gm8run::runtime::Renderer;

fn main() -> ExitCode {
    let args = config::parse_args();
    logger::init_logger(args.level_filter());

    let archive = match loader::load(&args.path) {
        Ok(archive) => archive,
        Err(err) => {
            error!("failed to load {}: {}", args.path, err);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "loaded {} ({:?}): {} scripts, {} constants",
        args.path,
        archive.version,
        archive.scripts.len(),
        archive.constants.len(),
    );

    let event_loop = EventLoop::new();
    let renderer = Renderer::new(&event_loop, args.scale);

    renderer.run(event_loop, move |_renderer| {
        // The full game loop (room instance stepping, event dispatch) lives
        // above this interface; this entry point only proves the window and
        // draw path stand up against a loaded archive.
        true
    });
}
