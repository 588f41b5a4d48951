use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::{ArgAction, Parser};
use log::{error, LevelFilter};

use qbfdd::driver::Session;
use qbfdd::error::Error;
use qbfdd::options::Options;

/// Delta debugger for QBF solvers.
///
/// Shrinks a QDIMACS formula while the solver given as CMD keeps failing on
/// it. CMD is split on whitespace and the path of each candidate is appended.
#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Failure-inducing QDIMACS file.
    #[arg(value_name = "INFILE")]
    input: PathBuf,

    /// Solver command line.
    #[arg(value_name = "CMD")]
    command: String,

    /// Exit code of failing runs (default: behaviour of the initial run).
    #[arg(short = 'f', long = "failed", value_name = "VAL", allow_hyphen_values = true)]
    failed: Option<i32>,

    /// Exit code of passing runs.
    #[arg(short = 'p', long = "passed", value_name = "VAL", allow_hyphen_values = true)]
    passed: Option<i32>,

    /// Output file (default: INFILE name with `_reduced` before the extension).
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Working file handed to the solver (default: a fresh temporary file).
    #[arg(short = 'O', long = "tmp", value_name = "FILE")]
    work_file: Option<PathBuf>,

    /// Minimization mode: ddmin, sddmin, iddmin, isddmin, obo or qobo.
    #[arg(short = 'm', long = "mode", value_name = "MODE", default_value = "ddmin")]
    mode: String,

    /// Granularity: b (clauses and literals), c (clauses only) or l (literals only).
    #[arg(short = 'g', long = "gran", value_name = "GRAN", default_value = "b")]
    granularity: String,

    /// Try quantifier swaps and shifts once nothing else can be removed.
    #[arg(short = 's', long = "shift")]
    shift: bool,

    /// Compare exit codes only, ignore solver output.
    #[arg(short = 'S', long = "skip-output")]
    skip_output: bool,

    /// Per-run timeout in seconds (0 disables it).
    #[arg(short = 't', long = "timeout", value_name = "SEC", default_value = "0")]
    timeout: u64,

    /// Do not enforce QDIMACS compliance of tested candidates.
    #[arg(short = 'q', long = "no-qdimacs")]
    no_qdimacs: bool,

    /// Increase verbosity (-v, -vv, -vvv).
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_options(self) -> Result<Options, Error> {
        let mut options = Options::new(self.input, self.command);
        options.output = self.output;
        options.work_file = self.work_file;
        options.fail_code = self.failed;
        options.pass_code = self.passed;
        options.mode = self.mode.parse()?;
        options.granularity = self.granularity.parse()?;
        options.shift = self.shift;
        options.skip_output = self.skip_output;
        options.timeout = self.timeout;
        options.compliant = !self.no_qdimacs;
        Ok(options)
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let session = Session::new(args.into_options()?)?;

    let interrupt = session.interrupt_flag();
    ctrlc::set_handler(move || interrupt.store(true, Ordering::SeqCst))?;

    match session.run() {
        Ok(summary) => {
            print!("{}", summary);
            Ok(())
        }
        Err(Error::Interrupted) => {
            error!(
                "interrupted, last failing candidate is in {}",
                session.options().output_path().display()
            );
            std::process::exit(130);
        }
        Err(e) => Err(e.into()),
    }
}
