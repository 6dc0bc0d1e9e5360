mod actions;
mod cli;
mod config;
mod driver;
mod element;
mod feedback;
mod logging;
mod registry;
mod state;
mod target;
mod trace;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
