use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use pico_args::Arguments;
use std::{
    env,
    fs::File,
    io::{self, BufRead, BufReader},
};

use crate::actions::{Actuator, LogActuator, UinputActuator};
use crate::config::ConfigState;
use crate::driver::DwellDriver;
use crate::feedback::JsonLinesSink;
use crate::trace;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("replay") => {
            let dry_run = pargs.contains("--dry-run");
            let profile_name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let source: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: dwellctl replay <trace.jsonl|-> [--profile NAME] [--dry-run]"))?;
            replay(&source, profile_name.as_deref(), dry_run)
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: dwellctl use <profile_name>"))?;
            let mut cfg = ConfigState::load_or_install_default()?;
            cfg.set_active(&name)?;
            print_response(&serde_json::json!({"ok": true, "data": {"active_profile": cfg.active_name}}));
            Ok(())
        }

        Some("list") => {
            let cfg = ConfigState::load_or_install_default()?;
            let list = cfg.list_profiles();
            print_response(&serde_json::json!({"ok": true, "data": {"profiles": list, "active": cfg.active_name}}));
            Ok(())
        }

        Some("doctor") => {
            let cfg = ConfigState::load_or_install_default()?;
            print_response(&serde_json::json!({"ok": true, "data": cfg.doctor_report()}));
            Ok(())
        }

        Some("emit") => {
            // usage:
            //   dwellctl emit click
            //   dwellctl emit click right
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: dwellctl emit click [left|right|middle]"))?;
            if what != "click" {
                return Err(anyhow!("unknown emit kind: {what}"));
            }
            let btn: String = pargs
                .opt_free_from_str()?
                .unwrap_or_else(|| "left".to_string());
            let mut act = UinputActuator::new()?;
            act.click_mouse(&btn)?;
            println!("ok: clicked {btn}");
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn replay(source: &str, profile_name: Option<&str>, dry_run: bool) -> Result<()> {
    let cfg = ConfigState::load_or_install_default()?;
    let profile = match profile_name {
        Some(name) => cfg.load_named(name)?,
        None => cfg.profile.clone(),
    };
    info!(
        "replay: profile '{}' ({})",
        profile_name.unwrap_or(cfg.active_name.as_str()),
        profile.meta.name.as_deref().unwrap_or("unnamed")
    );

    let actuator: Box<dyn Actuator> = if dry_run {
        Box::new(LogActuator)
    } else {
        match UinputActuator::new() {
            Ok(a) => Box::new(a),
            Err(e) => {
                warn!("uinput unavailable ({e}); activations will not click");
                Box::new(UinputActuator::noop())
            }
        }
    };

    let reader: Box<dyn BufRead> = if source == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let f = File::open(source).with_context(|| format!("failed to open {source}"))?;
        Box::new(BufReader::new(f))
    };

    let sink = JsonLinesSink::new(io::stdout().lock());
    let mut driver = DwellDriver::new(profile, sink, actuator);
    let samples = trace::replay(reader, &mut driver, |name| cfg.load_named(name))?;
    info!(
        "replay: {samples} samples, {} activations, {} trackers live",
        driver.activations(),
        driver.tracked()
    );
    Ok(())
}

fn print_help() {
    println!(
        r#"dwellctl — gaze dwell activation driver

USAGE:
  dwellctl help [command]                   Show general or command-specific help
  dwellctl replay <trace.jsonl|->           Drive dwell tracking from a gaze trace
        [--profile NAME] [--dry-run]
  dwellctl use <name>                       Switch active profile
  dwellctl list                             List profiles
  dwellctl doctor                           Diagnose uinput permissions
  dwellctl emit click [left|right|middle]   Emit a mouse click

TIPS:
  - Profiles: ~/.config/dwellctl/profiles
  - Active profile pointer: ~/.config/dwellctl/active
  - Progress events are written to stdout as JSON lines; logs go to stderr
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "replay" => println!(
            "usage: dwellctl replay <trace.jsonl|-> [--profile NAME] [--dry-run]\nReads gaze samples (\"-\" for stdin), prints progress events, clicks on dwell.\n--dry-run logs activations instead of clicking."
        ),
        "use" => {
            println!("usage: dwellctl use <name>\nSwitches active profile to <name>.")
        }
        "list" => {
            println!("usage: dwellctl list\nLists available profiles and the active one.")
        }
        "doctor" => println!(
            "usage: dwellctl doctor\nChecks /dev/uinput and input group membership."
        ),
        "emit" => println!("usage: dwellctl emit click [left|right|middle]"),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
