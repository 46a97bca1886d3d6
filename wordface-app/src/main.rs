mod app;
mod cli;

use anyhow::Result;
use app::App;
use clap::Parser;
use cli::Args;
use wordface_core::WordList;
use wordface_experiment::{open_port, SessionStateMachine, TrialLog};
use wordface_timing::HighPrecisionTimer;

fn main() -> Result<()> {
    // a missing --id exits here with a usage error, before any window opens
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if let Err(e) = run(&args) {
        log::error!("{e:#}");
        return Err(e);
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = args.experiment_config()?;
    let subject = args.subject();
    log::info!(
        "subject {} ({}, {:?}, {}), {:?} variant at {} Hz",
        subject.id,
        subject.exp_type,
        subject.gender,
        subject.age,
        config.variant,
        config.frame_rate
    );

    let words = WordList::load(&config.wordlist)?;
    let port = open_port(args.parallel_port.as_deref())?;
    let log = TrialLog::new(&config.save_folder);
    let experiment = SessionStateMachine::new(
        config,
        subject,
        words,
        port,
        log,
        HighPrecisionTimer::new(),
        rand::rng(),
    )?;

    App::new(experiment, args.windowed).run()
}
