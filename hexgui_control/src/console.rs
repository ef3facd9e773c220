//! Operator console.
//!
//! Line-oriented front end to a [`Session`]. Parsing is pure and tested;
//! execution blocks the console thread on the runtime for each command, so
//! confirmations can read stdin while the session I/O task keeps running
//! on the worker threads.

use std::io::{self, BufRead, Write};

use hexgui_common::consts::NUM_STRUT;
use hexgui_common::controller::{
    CommandKind, CommandRequest, CommandSource, LimitDirection, MotionPattern, Pose, StateTrigger,
    SubstateTrigger,
};
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::command::Confirm;
use crate::session::{ControllerView, Session};

pub const HELP: &str = "\
commands:
  connect | disconnect
  enable | standby | clear
  pos <x> <y> <z> <rx> <ry> <rz>      absolute target [um, deg]
  offset <x> <y> <z> <rx> <ry> <rz>   target relative to the current pose
  raw <s1> .. <s6>                    per-strut target [um]
  move [sync|async] | stop
  pivot <x> <y> <z>                   [um]
  source gui|csc
  mask extend|retract
  drives on|off
  accel <um/s2>
  vel <xy> <uv> <z> <w>               [um/s, deg/s]
  status [--json]
  help | quit";

/// One parsed console line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Submit(CommandKind),
    Status { json: bool },
    Connect,
    Disconnect,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("not a number: '{0}'")]
    BadNumber(String),
}

/// Parse one line. `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    match head.to_ascii_lowercase().as_str() {
        "connect" => Ok(Some(ConsoleCommand::Connect)),
        "disconnect" => Ok(Some(ConsoleCommand::Disconnect)),
        "help" | "?" => Ok(Some(ConsoleCommand::Help)),
        "quit" | "exit" => Ok(Some(ConsoleCommand::Quit)),
        "status" => match args.as_slice() {
            [] => Ok(Some(ConsoleCommand::Status { json: false })),
            ["--json"] => Ok(Some(ConsoleCommand::Status { json: true })),
            _ => Err(ParseError::Usage("status [--json]")),
        },
        "enable" => submit(CommandKind::SetState(StateTrigger::Enable)),
        "standby" => submit(CommandKind::SetState(StateTrigger::Standby)),
        "clear" => submit(CommandKind::SetState(StateTrigger::ClearError)),
        "move" => {
            let pattern = match args.as_slice() {
                [] | ["sync"] => MotionPattern::Sync,
                ["async"] => MotionPattern::Async,
                _ => return Err(ParseError::Usage("move [sync|async]")),
            };
            submit(CommandKind::SetEnabledSubstate {
                trigger: SubstateTrigger::Move,
                pattern,
            })
        }
        "stop" => submit(CommandKind::SetEnabledSubstate {
            trigger: SubstateTrigger::Stop,
            pattern: MotionPattern::Sync,
        }),
        "pos" => {
            let v = numbers::<6>(&args, "pos <x> <y> <z> <rx> <ry> <rz>")?;
            submit(CommandKind::SetPosition(Pose::from_array(v)))
        }
        "offset" => {
            let v = numbers::<6>(&args, "offset <x> <y> <z> <rx> <ry> <rz>")?;
            submit(CommandKind::SetPositionOffset(Pose::from_array(v)))
        }
        "raw" => {
            let struts = numbers::<NUM_STRUT>(&args, "raw <s1> <s2> <s3> <s4> <s5> <s6>")?;
            submit(CommandKind::SetRawPosition { struts })
        }
        "pivot" => {
            let [x, y, z] = numbers::<3>(&args, "pivot <x> <y> <z>")?;
            submit(CommandKind::SetPivot { x, y, z })
        }
        "source" => match args.as_slice() {
            ["gui"] => submit(CommandKind::SwitchCommandSource(CommandSource::Gui)),
            ["csc"] => submit(CommandKind::SwitchCommandSource(CommandSource::Csc)),
            _ => Err(ParseError::Usage("source gui|csc")),
        },
        "mask" => match args.as_slice() {
            ["extend"] => submit(CommandKind::MaskLimitSwitch(LimitDirection::Extend)),
            ["retract"] => submit(CommandKind::MaskLimitSwitch(LimitDirection::Retract)),
            _ => Err(ParseError::Usage("mask extend|retract")),
        },
        "drives" => match args.as_slice() {
            ["on"] => submit(CommandKind::EnableDrives(true)),
            ["off"] => submit(CommandKind::EnableDrives(false)),
            _ => Err(ParseError::Usage("drives on|off")),
        },
        "accel" => {
            let [accel] = numbers::<1>(&args, "accel <um/s2>")?;
            submit(CommandKind::ConfigAcceleration(accel))
        }
        "vel" => {
            let [xy, uv, z, w] = numbers::<4>(&args, "vel <xy> <uv> <z> <w>")?;
            submit(CommandKind::ConfigVelocity { xy, uv, z, w })
        }
        other => Err(ParseError::Unknown(other.to_string())),
    }
}

fn submit(kind: CommandKind) -> Result<Option<ConsoleCommand>, ParseError> {
    Ok(Some(ConsoleCommand::Submit(kind)))
}

fn numbers<const N: usize>(args: &[&str], usage: &'static str) -> Result<[f64; N], ParseError> {
    if args.len() != N {
        return Err(ParseError::Usage(usage));
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg
            .parse()
            .map_err(|_| ParseError::BadNumber((*arg).to_string()))?;
    }
    Ok(out)
}

/// Multi-line status report.
pub fn format_status(view: &ControllerView) -> String {
    let mut out = view.summary();
    if let Some(direction) = view.masked {
        out.push_str(&format!("\nlimit switch masked: {direction:?}"));
    }
    if let Some(pose) = view.pose() {
        out.push_str(&format!(
            "\npose: x {:.1} y {:.1} z {:.1} um, rx {:.4} ry {:.4} rz {:.4} deg",
            pose.x, pose.y, pose.z, pose.rx, pose.ry, pose.rz
        ));
    }
    if let Some(struts) = view.strut_positions() {
        let struts: Vec<String> = struts.iter().map(|s| format!("{s:.1}")).collect();
        out.push_str(&format!("\nstruts [um]: {}", struts.join(" ")));
    }
    for fault in view.faults.iter() {
        out.push_str(&format!(
            "\n  fault: {} (struts {:#08b}): {}{}",
            fault.code.name(),
            fault.struts,
            fault.cause,
            if fault.latched {
                ", requires power cycle"
            } else {
                ""
            }
        ));
    }
    if let Some(rate) = view.rate.mean_rate_hz() {
        out.push_str(&format!(
            "\ntelemetry: {} frames, {:.1} Hz, {} late",
            view.rate.frames, rate, view.rate.late
        ));
    }
    if view.rejected_transitions > 0 {
        out.push_str(&format!(
            "\nrejected transitions: {}",
            view.rejected_transitions
        ));
    }
    out
}

/// Answers confirmations from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

/// Run the console until `quit` or end of input.
///
/// # Errors
///
/// Only stdin/stdout failures; command failures are printed and the loop
/// continues.
pub fn run(runtime: &Runtime, session: &Session) -> io::Result<()> {
    println!("{HELP}");
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("hexgui> ");
        io::stdout().flush()?;
        line.clear();
        // The lock is released before a command may ask for confirmation.
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        debug!(?command, "console");

        match command {
            ConsoleCommand::Quit => break,
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Status { json: false } => println!("{}", format_status(&session.view())),
            ConsoleCommand::Status { json: true } => {
                match serde_json::to_string_pretty(&session.view()) {
                    Ok(json) => println!("{json}"),
                    Err(e) => println!("cannot encode status: {e}"),
                }
            }
            ConsoleCommand::Connect => match runtime.block_on(session.connect()) {
                Ok(()) => println!("connected"),
                Err(e) => println!("connect failed: {e}"),
            },
            ConsoleCommand::Disconnect => match runtime.block_on(session.disconnect()) {
                Ok(()) => println!("disconnected"),
                Err(e) => println!("{e}"),
            },
            ConsoleCommand::Submit(kind) => {
                let request = CommandRequest::gui(kind);
                match runtime.block_on(session.submit(request)) {
                    Ok(outcome) => println!(
                        "{} done in {:.0} ms{}",
                        outcome.command,
                        outcome.elapsed.as_secs_f64() * 1e3,
                        if outcome.observed { ", confirmed by telemetry" } else { "" }
                    ),
                    Err(e) => println!("{} failed: {e}", kind.name()),
                }
            }
        }
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
