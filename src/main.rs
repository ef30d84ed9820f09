//! B5500 Emulator - CLI Entry Point
//!
//! Commands:
//! - `b5500-emu run <image>` - Load a memory image and run processor 1
//! - `b5500-emu dump <image>` - Print the words an image loads
//! - `b5500-emu test` - Built-in self check

use b5500::config::parse_octal_address;
use b5500::cpu::decode::{disassemble, op, MUL, ZPI};
use b5500::{io, load_image, Machine, MachineConfig, Memory, Number, RoundingMode, Word};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "b5500-emu")]
#[command(version = "0.1.0")]
#[command(about = "An instruction-level emulator of the Burroughs B5500 central processor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a memory image and run until processor 1 halts
    Run {
        /// Path to the memory image
        image: PathBuf,
        /// Maximum number of syllables to run
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Start address, octal
        #[arg(short, long, value_parser = parse_octal_address)]
        start: Option<u16>,
        /// Use E-mode rounding
        #[arg(long)]
        emode: bool,
        /// Install processor 2
        #[arg(long)]
        p2: bool,
        /// Log every syllable
        #[arg(short, long)]
        trace: bool,
        /// JSON machine configuration; flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the final register file as JSON
        #[arg(long)]
        dump_json: bool,
    },
    /// Print the words a memory image loads, in octal
    Dump {
        /// Path to the memory image
        image: PathBuf,
        /// First address to print, octal
        #[arg(short, long, value_parser = parse_octal_address)]
        from: Option<u16>,
        /// Number of words to print
        #[arg(short = 'n', long, default_value = "64")]
        count: usize,
    },
    /// Run the built-in self check
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { image, max_cycles, start, emode, p2, trace, config, dump_json }) => {
            init_logging(trace);
            let mut config = match config {
                Some(path) => MachineConfig::from_json_file(&path).unwrap_or_else(|e| {
                    fail(&format!("Failed to read {}: {}", path.display(), e))
                }),
                None => MachineConfig::default(),
            };
            config.memory_image = Some(image);
            if let Some(n) = max_cycles {
                config.cycle_budget = n;
            }
            if let Some(address) = start {
                config.start_address = address;
            }
            if emode {
                config.rounding = RoundingMode::Emode;
            }
            config.processor2 |= p2;
            run_image(&config, dump_json);
        }
        Some(Commands::Dump { image, from, count }) => {
            dump_image(&image, from, count);
        }
        Some(Commands::Test) => {
            init_logging(false);
            run_self_test();
        }
        None => {
            println!("B5500 Emulator v0.1.0");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(trace: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if trace { "trace" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn run_image(config: &MachineConfig, dump_json: bool) {
    let memory = Memory::new();
    if let Some(path) = &config.memory_image {
        let image = load_image(path).unwrap_or_else(|e| fail(&format!("Failed to load image: {}", e)));
        if let Err(e) = image.load_into(&memory) {
            fail(&format!("Failed to load image: {}", e));
        }
        println!("Loaded {} words from {}", image.len(), path.display());
    }

    let mut machine = Machine::new(memory, io::shared(b5500::RecordingIo::new()), config.rounding)
        .with_tick_interval(config.tick_interval);
    if config.processor2 {
        if let Err(e) = machine.install_processor2() {
            fail(&format!("Failed to start processor 2: {}", e));
        }
    }
    machine.preset(config.start_address);

    let result = machine.run(config.cycle_budget.max(1));
    let p1 = machine.processor1();
    let regs = &p1.regs;

    println!();
    println!("Syllables: {}", p1.cycles);
    println!("State:     {:?}", p1.state);
    println!("Mode:      {}", if regs.cwmf { "character" } else { "word" });
    println!("A = {:016o}  {}", regs.a, flag(regs.arof));
    println!("B = {:016o}  {}", regs.b, flag(regs.brof));
    println!("C = {:05o}  L = {}  T = {:04o} ({})", regs.c, regs.l, regs.t, disassemble(regs.t, regs.cwmf));
    println!("S = {:05o}  F = {:05o}  R = {:03o}", regs.s, regs.f, regs.r);
    println!("I = {:02X}  IAR = {:02X}", regs.i, machine.central_control().iar);

    if dump_json {
        match serde_json::to_string_pretty(regs) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to serialize registers: {}", e),
        }
    }

    match result {
        Ok(n) if p1.is_running() && n >= config.cycle_budget => {
            println!();
            println!("Reached the cycle budget ({}). Use --max-cycles to increase.", config.cycle_budget);
        }
        Ok(_) => {}
        Err(e) => fail(&format!("Emulator error at C={:05o}: {}", regs.c, e)),
    }
}

fn flag(full: bool) -> &'static str {
    if full { "full" } else { "empty" }
}

fn dump_image(path: &PathBuf, from: Option<u16>, count: usize) {
    let image = load_image(path).unwrap_or_else(|e| fail(&format!("Failed to load image: {}", e)));
    let memory = Memory::new();
    if let Err(e) = image.load_into(&memory) {
        fail(&format!("Failed to load image: {}", e));
    }
    let start = from.or(image.first_address()).unwrap_or(0);
    for (address, word) in memory.dump(start, count) {
        println!("{:05o}  {:016o}", address, word);
    }
}

/// Pack syllables four to a word, first syllable in the high bits.
fn pack(syllables: &[u16]) -> Vec<Word> {
    syllables
        .chunks(4)
        .map(|chunk| {
            chunk.iter().enumerate().fold(0, |w, (j, &s)| {
                b5500::word::insert(w, j as u32 * 12, 12, s as Word)
            })
        })
        .collect()
}

fn run_self_test() {
    println!("━━━ B5500 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Word mode: 2 3 MUL, then halt
    print!("Integer multiply (2 × 3)... ");
    let memory = Memory::new();
    let literal = |n: u16| n << 2;
    let program = pack(&[literal(2), literal(3), MUL, ZPI]);
    let loaded = memory.load(0o100, &program);
    let mut machine = Machine::new(memory, io::shared(b5500::NullIo), RoundingMode::Legacy);
    machine.processor1_mut().regs.halt_switch = true;
    machine.preset(0o100);
    let ran = machine.run(100);
    let b = machine.processor1().regs.b;
    if loaded.is_ok() && ran.is_ok() && machine.processor1().is_halted() && b == Number::from_i64(6).compose() {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (B = {:016o})", b);
        failed += 1;
    }

    // Bit-field round trip
    print!("Field insert/isolate... ");
    let w = b5500::word::insert(0, 9, 39, 0o1234567);
    if b5500::word::isolate(w, 9, 39) == 0o1234567 && op(0x01, 0x04) == MUL {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
