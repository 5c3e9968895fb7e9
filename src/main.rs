//! PIC16F84 Emulator - CLI Entry Point
//!
//! Commands:
//! - `pic16-emu run <program>` - Run a PHEX or ASM file
//! - `pic16-emu debug <program>` - Interactive debugger
//! - `pic16-emu asm <source>` - Assemble to PHEX
//! - `pic16-emu disasm <image>` - Disassemble PHEX

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "pic16-emu")]
#[command(version = "0.1.0")]
#[command(about = "An instruction-accurate emulator of the PIC16F84 microcontroller")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it sleeps
    Run {
        /// Path to the PHEX or ASM file to execute
        program: String,
        /// Maximum number of cycles to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Dump the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the PHEX or ASM file to debug
        program: String,
    },
    /// Assemble source to PHEX
    Asm {
        /// Path to the source file
        source: String,
        /// Output PHEX file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble PHEX to readable text
    Disasm {
        /// Path to the PHEX file
        image: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, json }) => {
            run_program(&program, max_cycles, trace, json);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("PIC16F84 Emulator v0.1.0");
            println!("An instruction-accurate 8-bit microcontroller emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// `RUST_LOG` wins over the verbosity flag when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    if let Err(e) = builder.try_init() {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
}

/// Load program words from an `.asm` source or a `.phex` image.
fn load_words(path: &str) -> Vec<u16> {
    use pic16::{assemble, load_image};

    let words = if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(words) => {
                println!("📝 Assembled {} words", words.len());
                words
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(image) => {
                println!("📂 Loaded {} words", image.len());
                image.words
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    };

    if words.is_empty() {
        eprintln!("❌ No instructions to execute");
        std::process::exit(1);
    }

    words
}

fn run_program(path: &str, max_cycles: u64, trace: bool, json: bool) {
    use pic16::Cpu;
    use pic16::asm::disasm::format_instruction;

    println!("🔧 Running: {}", path);
    let words = load_words(path);

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&words) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    println!();
    println!("━━━ Execution ━━━");

    let mut cycles = 0u64;
    while cpu.is_running() && cycles < max_cycles {
        let pc = cpu.pc();

        match cpu.step() {
            Ok(instr) => {
                if trace {
                    println!("{:04x}: {:<20} W={:#04x} STATUS={:?}",
                        pc, format_instruction(&instr), cpu.w(), cpu.core.status());
                }
                cycles += 1;
            }
            Err(e) => {
                eprintln!("❌ CPU error at PC={:#06x}: {}", pc, e);
                std::process::exit(1);
            }
        }
    }

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cycles);
    println!("State:  {:?}", cpu.state);
    println!("W:      {:#04x} ({})", cpu.w(), cpu.w());
    println!("PC:     {:#06x}", cpu.pc());
    println!("STATUS: {:?}", cpu.core.status());
    println!("Stack:  {:?}", cpu.core.stack);

    if json {
        match serde_json::to_string_pretty(&cpu) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
    }

    if cycles >= max_cycles {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use pic16::tui::run_debugger;

    println!("🔍 Loading: {}", path);
    let words = load_words(path);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(words) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("❌ Debugger not available: built without the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use pic16::{assemble, image_path_for, save_image, ImageFile};
    use std::path::{Path, PathBuf};

    let out_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| image_path_for(source_path));

    if out_path.as_path() == Path::new(source_path) {
        eprintln!("❌ Refusing to overwrite the source file {}", source_path);
        std::process::exit(1);
    }

    println!("📝 Assembling: {} → {}", source_path, out_path.display());

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let words = match assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} words", words.len());

    if let Err(e) = save_image(&out_path, &ImageFile::from_words(&words)) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path.display());
}

fn disassemble_file(image_path: &str) {
    use pic16::{disassemble, load_image};

    println!("📖 Disassembling: {}", image_path);
    println!();

    let image = match load_image(image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", disassemble(&image.words));
}

fn run_self_test() {
    use pic16::{assemble, Cpu};

    println!("━━━ PIC16F84 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, source: &str, verify: &dyn Fn(&Cpu) -> bool| {
        print!("{}... ", name);
        let mut cpu = Cpu::new();
        let ok = assemble(source)
            .ok()
            .and_then(|words| cpu.load_program(&words).ok())
            .and_then(|_| cpu.run_limited(1000).ok())
            .is_some()
            && verify(&cpu);
        if ok { println!("✓"); passed += 1; }
        else { println!("✗"); failed += 1; }
    };

    check("SLEEP stops the core", "  SLEEP\n", &|cpu: &Cpu| cpu.is_sleeping());

    check("ADDWF carry and zero", "
        MOVLW 0xff
        MOVWF 0x20
        MOVLW 0x01
        ADDWF 0x20, F
        SLEEP
    ", &|cpu: &Cpu| {
        let s = cpu.core.status();
        cpu.register(0x20) == 0 && s.carry() && s.digit_carry() && s.zero()
    });

    check("SUBLW borrow", "
        MOVLW 0x05
        SUBLW 0x03
        SLEEP
    ", &|cpu: &Cpu| cpu.w() == 0xfe && !cpu.core.status().carry());

    check("Indirect addressing", "
        MOVLW 0x30
        MOVWF FSR
        MOVLW 0x42
        MOVWF INDF
        SLEEP
    ", &|cpu: &Cpu| cpu.register(0x30) == 0x42);

    check("CALL/RETLW table", "
        CALL TABLE
        SLEEP
TABLE   RETLW 0x99
    ", &|cpu: &Cpu| cpu.w() == 0x99 && cpu.pc() == 4);

    check("DECFSZ countdown loop", "
        MOVLW 0x05
        MOVWF 0x20
LOOP    DECFSZ 0x20, F
        GOTO LOOP
        SLEEP
    ", &|cpu: &Cpu| cpu.register(0x20) == 0 && cpu.is_sleeping());

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
