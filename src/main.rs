use std::{
    fs,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use eyre::{bail, WrapErr};
use lang::Demo;
use pixel_vm::{launch, render::render, trace};
use tracing::{info, level_filters::LevelFilter};
use vm::{config::FramebufferConfig, memory::Memory, Config, Events, RunState, Severity};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Preset {
    /// 32-bit words, 64x64 framebuffer, 4-bit pixel fields
    Nibble,
    /// 32-bit words, 128x128 framebuffer, 3-bit colour channels
    Packed,
    /// 64-bit words, 256 registers, 64x64 framebuffer, 8-bit colour channels
    Wide,
}

impl From<Preset> for Config {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Nibble => Config::nibble(),
            Preset::Packed => Config::packed(),
            Preset::Wide => Config::wide(),
        }
    }
}

/// Run a flat binary (or assembly source) on the emulator without a window
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Program to load at address 0
    program: Option<PathBuf>,
    /// Treat PROGRAM as assembly source instead of a raw binary
    #[arg(long)]
    asm: bool,
    /// Run a built-in demo instead of a file
    #[arg(long, value_enum, conflicts_with = "program")]
    demo: Option<Demo>,
    #[arg(long, value_enum, default_value_t = Preset::Packed)]
    preset: Preset,
    /// Ticks to run before stopping
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Ticks per second
    #[arg(long, default_value_t = vm::config::DEFAULT_TICK_RATE)]
    rate: f64,
    /// Print the final framebuffer as braille
    #[arg(long)]
    render: bool,
    /// Log level for diagnostics on stderr
    #[arg(long, default_value_t = LevelFilter::WARN)]
    log_level: LevelFilter,
}

fn program(args: &Args, config: &Config) -> eyre::Result<Vec<u8>> {
    if let Some(demo) = args.demo {
        return lang::compile(&demo.source(config), config);
    }
    let Some(path) = &args.program else {
        bail!("Nothing to run: pass a PROGRAM or --demo");
    };
    if args.asm {
        let source = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        lang::compile(&source, config)
    } else {
        fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))
    }
}

fn print_events(events: &Events, began: Instant) {
    for event in events.drain_log() {
        let elapsed = began.elapsed().as_secs_f32();
        match event.severity {
            Severity::Error | Severity::Warning => eprintln!("[{elapsed:8.3}] {event}"),
            Severity::Success | Severity::Info => println!("[{elapsed:8.3}] {event}"),
        }
    }
    for status in events.drain_status() {
        println!("Status: {}", status.label);
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    trace::setup(args.log_level);

    let config = Config::from(args.preset).with_tick_rate(args.rate);
    let bytecode = program(&args, &config)?;
    let fb_config = config.framebuffer;
    let tick = config.tick_period();
    info!(preset = ?args.preset, bytes = bytecode.len(), "launching");

    let mut emulator = launch(config)?;
    emulator.load(bytecode);
    emulator.start();

    let began = Instant::now();
    let mut deadline = began;
    for _ in 0..args.ticks {
        print_events(&emulator.events, began);
        if emulator.snapshot().run_state == RunState::Halted {
            break;
        }

        deadline += tick;
        if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    emulator.stop();
    // Give the machine thread a tick to act on the stop before reading the final frame
    thread::sleep(tick + Duration::from_millis(1));
    let snapshot = emulator.snapshot().clone();
    let events = emulator.events.clone();
    emulator.shutdown();
    // Whatever the last ticks produced, including the halt itself
    print_events(&events, began);

    println!("PC: {:#018x}", snapshot.pc);
    println!(
        "Registers: {}",
        itertools::join(snapshot.registers.iter(), ", ")
    );
    if args.render {
        let mut memory = Memory::new(fb_config.len());
        memory.write_bytes(0, &snapshot.framebuffer);
        let local = FramebufferConfig {
            base: 0,
            ..fb_config
        };
        if let Some(fb) = memory.framebuffer(local) {
            println!("{}", render(&fb));
        }
    }
    Ok(())
}
