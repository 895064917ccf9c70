// Copyright 2020 TwoCookingMice

use financier::core::scene_loader::XmlSceneLoader;
use financier::renderers::standalone::{default_thread_count, RenderOptions, StandaloneRenderer};
use financier::renderers::status::RenderState;

use clap::{value_parser, Arg, ArgAction, Command};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn cli() -> Command {
    Command::new("financier")
        .about("Progressive bidirectional path tracer")
        .version(env!("CARGO_PKG_VERSION"))
        .disable_version_flag(true)
        .arg(Arg::new("version")
            .short('v')
            .long("version")
            .action(ArgAction::Version)
            .help("Prints version information"))
        .arg(Arg::new("threads")
            .short('t')
            .long("threads")
            .value_parser(value_parser!(String))
            .allow_hyphen_values(true)
            .help("Specifies number of threads to use (default: number of cores minus one)"))
        .arg(Arg::new("restart")
            .short('r')
            .long("restart")
            .action(ArgAction::SetTrue)
            .help("Ignores saved render checkpoints and starts fresh from 0 spp"))
        .arg(Arg::new("checkpoint")
            .short('c')
            .long("checkpoint")
            .value_parser(value_parser!(String))
            .allow_hyphen_values(true)
            .help("Specifies render time in minutes before saving a checkpoint. \
                   A value of 0 disables checkpoints. Overrides the setting in the scene file"))
        .arg(Arg::new("output-directory")
            .short('o')
            .long("output-directory")
            .value_parser(value_parser!(PathBuf))
            .help("Specifies the output directory. Overrides the setting in the scene file"))
        .arg(Arg::new("scenes")
            .num_args(0..)
            .value_parser(value_parser!(PathBuf))
            .help("Scene files, rendered in order"))
}

fn render_options(matches: &clap::ArgMatches) -> RenderOptions {
    let mut options = RenderOptions {
        thread_count: default_thread_count(),
        restart: matches.get_flag("restart"),
        ..RenderOptions::default()
    };

    // Non-numeric or non-positive thread counts keep the default.
    if let Some(threads) = matches.get_one::<String>("threads") {
        match threads.trim().parse::<i64>() {
            Ok(threads) if threads > 0 => options.thread_count = threads as usize,
            _ => warn!("Ignoring thread count '{}'", threads),
        }
    }
    if let Some(minutes) = matches.get_one::<String>("checkpoint") {
        let interval = minutes.trim().parse::<f64>().ok()
            .and_then(|minutes| Duration::try_from_secs_f64(minutes * 60.0).ok());
        match interval {
            Some(interval) => options.checkpoint_interval = Some(interval),
            None => warn!("Ignoring invalid checkpoint interval '{}'", minutes),
        }
    }
    if let Some(dir) = matches.get_one::<PathBuf>("output-directory") {
        options.output_directory = Some(if dir.is_absolute() {
            dir.clone()
        } else {
            env::current_dir().map(|cwd| cwd.join(dir)).unwrap_or_else(|_| dir.clone())
        });
    }
    options
}

/// Draws the progress of the current scene until `done` is set.
fn report_progress(renderer: &StandaloneRenderer, done: &AtomicBool) {
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} spp {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    while !done.load(Ordering::Acquire) {
        let status = renderer.status();
        {
            let _guard = renderer.log_mutex().lock().unwrap_or_else(|e| e.into_inner());
            if status.state == RenderState::Rendering {
                progress.set_length(status.total_spp as u64);
                progress.set_position(status.current_spp as u64);
                progress.set_message(status.current_scene.display().to_string());
            }
        }
        thread::sleep(Duration::from_millis(250));
    }
    progress.finish_and_clear();
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut command = cli();
    let matches = command.clone().get_matches();
    let scenes: Vec<PathBuf> = matches.get_many::<PathBuf>("scenes")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    if scenes.is_empty() {
        if let Err(e) = command.print_help() {
            eprintln!("{}", e);
        }
        return;
    }

    let options = render_options(&matches);
    let renderer = Arc::new(StandaloneRenderer::new(options, Box::new(XmlSceneLoader), scenes));
    let done = Arc::new(AtomicBool::new(false));

    let reporter = {
        let renderer = renderer.clone();
        let done = done.clone();
        thread::spawn(move || report_progress(&renderer, &done))
    };

    while renderer.render_scene() {}

    done.store(true, Ordering::Release);
    if reporter.join().is_err() {
        warn!("Progress reporter panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_from(args: &[&str]) -> RenderOptions {
        let matches = cli().try_get_matches_from(args).expect("arguments");
        render_options(&matches)
    }

    #[test]
    fn test_thread_count_is_lenient() {
        assert_eq!(options_from(&["financier", "-t", "3", "a.xml"]).thread_count, 3);
        for bad in ["abc", "0", "-2", ""] {
            assert_eq!(options_from(&["financier", "-t", bad, "a.xml"]).thread_count,
                       default_thread_count(), "-t {:?}", bad);
        }
    }

    #[test]
    fn test_checkpoint_and_flags() {
        let options = options_from(&["financier", "-r", "-c", "0.5", "-o", "/tmp/out", "a.xml"]);
        assert!(options.restart);
        assert_eq!(options.checkpoint_interval, Some(Duration::from_secs(30)));
        assert_eq!(options.output_directory, Some(PathBuf::from("/tmp/out")));

        assert_eq!(options_from(&["financier", "-c", "0", "a.xml"]).checkpoint_interval, Some(Duration::ZERO));
        assert_eq!(options_from(&["financier", "-c", "soon", "a.xml"]).checkpoint_interval, None);
        assert_eq!(options_from(&["financier", "-c", "-1", "a.xml"]).checkpoint_interval, None);
    }
}
