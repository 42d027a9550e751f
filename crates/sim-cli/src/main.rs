//! CLI entry point for the machine simulator binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use sim_core::{Machine, MachineConfig, ADDRESS_SPACE_BYTES};

mod demos;
mod input;

const USAGE_TEXT: &str = "\
Usage: sim6502 <command> [options]

Commands:
  run <image.bin>     Run a flat binary program image
  demo <name>         Run a built-in demo (hello, increment, triangle, powers)

Options:
  -t, --tick-ms <n>   Milliseconds between clock ticks (default: 100)
      --at <addr>     Load and start address, hex with 0x prefix or
                      decimal (default: 0)
  -d, --debug         Print the per-tick register report to stderr
  -h, --help          Show this help message

Press Ctrl-C or Escape to halt a running program.

Examples:
  sim6502 demo triangle
  sim6502 run program.bin --at 0x0100 --debug
  sim6502 demo hello -t 10
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run(RunArgs),
    Demo(DemoArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    image: PathBuf,
    options: RunOptions,
}

#[derive(Debug, PartialEq, Eq)]
struct DemoArgs {
    name: String,
    options: RunOptions,
}

#[derive(Debug, PartialEq, Eq)]
struct RunOptions {
    tick_ms: u64,
    origin: u16,
    debug: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            origin: 0x0000,
            debug: false,
        }
    }
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "run" => {
            let (positional, options) = parse_common_args(args)?;
            let image = positional.ok_or_else(|| "missing image path".to_string())?;
            Ok(ParseResult::Command(Command::Run(RunArgs {
                image: PathBuf::from(image),
                options,
            })))
        }
        "demo" => {
            let (positional, options) = parse_common_args(args)?;
            let name = positional
                .ok_or_else(|| "missing demo name".to_string())?
                .to_string_lossy()
                .to_string();
            if demos::by_name(&name).is_none() {
                return Err(format!(
                    "unknown demo: {name} (available: {})",
                    demos::NAMES.join(", ")
                ));
            }
            Ok(ParseResult::Command(Command::Demo(DemoArgs {
                name,
                options,
            })))
        }
        other => Err(format!("unknown command: {other}")),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_common_args(
    mut args: impl Iterator<Item = OsString>,
) -> Result<(Option<OsString>, RunOptions), String> {
    let mut positional: Option<OsString> = None;
    let mut options = RunOptions::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--debug" || arg == "-d" {
            options.debug = true;
            continue;
        }

        if arg == "-t" || arg == "--tick-ms" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --tick-ms".to_string())?;
            options.tick_ms = value
                .to_string_lossy()
                .parse()
                .map_err(|_| format!("invalid tick interval: {}", value.to_string_lossy()))?;
            continue;
        }

        if arg == "--at" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --at".to_string())?;
            options.origin = parse_address(&value.to_string_lossy())?;
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if positional.is_some() {
            return Err("multiple positional arguments provided".to_string());
        }
        positional = Some(arg);
    }

    Ok((positional, options))
}

/// Parses a 16-bit address, accepting a `0x` hex prefix or decimal.
fn parse_address(text: &str) -> Result<u16, String> {
    let parsed = text.strip_prefix("0x").map_or_else(
        || text.parse(),
        |hex| u16::from_str_radix(hex, 16),
    );
    parsed.map_err(|_| format!("invalid address: {text}"))
}

fn run_machine(program: &[u8], options: &RunOptions) -> Result<(), i32> {
    if program.len() > ADDRESS_SPACE_BYTES {
        eprintln!(
            "error: image is {} bytes, larger than the {ADDRESS_SPACE_BYTES}-byte address space",
            program.len()
        );
        return Err(1);
    }

    let config = MachineConfig {
        tick_interval: Duration::from_millis(options.tick_ms),
        trace_ticks: options.debug,
    };
    let mut machine = Machine::new(&config);
    machine.flash(options.origin, program);
    machine.cpu_mut().set_pc(options.origin);

    let guard = match input::RawModeGuard::engage() {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("error: failed to configure terminal: {error}");
            return Err(1);
        }
    };
    let input_thread = input::spawn_input_thread(machine.keyboard(), machine.run_flag());

    machine.run();

    drop(guard);
    if input_thread.join().is_err() {
        eprintln!("error: input thread panicked");
        return Err(1);
    }
    Ok(())
}

fn run_image(args: &RunArgs) -> Result<(), i32> {
    let image = match fs::read(&args.image) {
        Ok(image) => image,
        Err(error) => {
            eprintln!("error: failed to read {}: {error}", args.image.display());
            return Err(1);
        }
    };
    run_machine(&image, &args.options)
}

fn run_demo(args: &DemoArgs) -> Result<(), i32> {
    // The name was validated at parse time.
    let Some(image) = demos::by_name(&args.name) else {
        eprintln!("error: unknown demo: {}", args.name);
        return Err(1);
    };
    run_machine(image, &args.options)
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Run(args))) => match run_image(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Demo(args))) => match run_demo(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
