use clap::Parser;
use miniasm::{parser, AsmError, Engine, Limits};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Assembly source file to run
    file: PathBuf,

    /// JSON file with resource limits
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Abort after executing this many instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Print the parsed program listing before running
    #[arg(long)]
    dump: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_limits(args: &Args) -> Result<Limits, AsmError> {
    let mut limits = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        }
        None => Limits::default(),
    };
    if args.max_steps.is_some() {
        limits.max_steps = args.max_steps;
    }
    limits.validate()?;
    Ok(limits)
}

fn run(args: &Args) -> Result<(), AsmError> {
    let limits = load_limits(args)?;
    info!(file = %args.file.display(), ?limits, "loading program");

    let source = fs::read_to_string(&args.file)?;
    limits.check_source_size(source.len())?;
    let program = parser::parse(&source)?;
    limits.check_instruction_count(program.len())?;

    if args.dump {
        print!("{}", program);
    }

    let report = Engine::with_limits(&program, limits).run()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.registers);
    }
    Ok(())
}
