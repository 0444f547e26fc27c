use std::io::{self, BufWriter};
use std::process;

use clap::{Parser, Subcommand};
use crashrun_birthday::{write_curve, BirthdayError, CollisionCurve, CurveParams, OutputFormat};
use crashrun_core::launcher::{Launcher, FALLBACK_EXIT_CODE};
use crashrun_core::session::{create_session, SessionSettings};
use crashrun_utils::{debug, info, init_logging, LogLevel};

/// Run a program under a debugger and report how it ended.
#[derive(Parser, Debug)]
#[command(name = "crashrun")]
#[command(version)]
#[command(about = "Run a program under a debugger, dump all thread backtraces on a crash, and mirror its exit code", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Run a program under the debugger
    ///
    /// Exits with the program's own exit code, 2 if a signal stopped it
    /// (after printing a backtrace of all threads), or 1 if it ended
    /// without an exit code.
    Run
    {
        /// Ask before killing a live target
        #[arg(long, default_value_t = false)]
        confirm: bool,
        /// Page the backtrace when stdout is a terminal
        #[arg(long, default_value_t = false)]
        pagination: bool,
        /// Leave address-space layout randomization on for the target
        #[arg(long, default_value_t = false)]
        randomize: bool,
        /// Path to the executable to run
        program: String,
        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print the birthday-bound collision probability curve
    Collisions
    {
        /// Hash width in bits; the space holds 2^bits values
        #[arg(long, default_value_t = 16)]
        bits: u32,
        /// Largest number of draws to evaluate
        #[arg(long, default_value_t = 9999)]
        max_trials: u64,
        /// Stop once the probability is within this distance of 1
        #[arg(long, default_value_t = 1e-12)]
        tolerance: f64,
        /// Record layout: plain or csv
        #[arg(long, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
}

fn main()
{
    let cli = Cli::parse();
    let code = run_command(cli);
    process::exit(code);
}

fn run_command(cli: Cli) -> i32
{
    // Console logs go to stderr; defaults to WARN unless RUST_LOG says otherwise.
    // Dropped before `process::exit` so a file sink gets flushed.
    let _guard = match init_logging(LogLevel::Warn) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return FALLBACK_EXIT_CODE;
        }
    };

    match cli.command {
        Commands::Run {
            confirm,
            pagination,
            randomize,
            program,
            args,
        } => {
            let settings = SessionSettings {
                confirm,
                pagination,
                disable_randomization: !randomize,
            };
            run_target(settings, &program, &args)
        }
        Commands::Collisions {
            bits,
            max_trials,
            tolerance,
            format,
        } => match print_collisions(bits, max_trials, tolerance, format) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {}", e);
                FALLBACK_EXIT_CODE
            }
        },
    }
}

fn run_target(settings: SessionSettings, program: &str, args: &[String]) -> i32
{
    info!("Running program: {} with args: {:?}", program, args);

    let result = create_session().and_then(|mut session| Launcher::new(settings).run(session.as_mut(), program, args));
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            FALLBACK_EXIT_CODE
        }
    }
}

fn print_collisions(bits: u32, max_trials: u64, tolerance: f64, format: OutputFormat) -> Result<(), BirthdayError>
{
    let params = CurveParams::for_bits(bits)?
        .with_max_trials(max_trials)?
        .with_tolerance(tolerance)?;

    let mut out = BufWriter::new(io::stdout().lock());
    let records = write_curve(&mut out, CollisionCurve::new(params), format)?;
    debug!(records, ?params, "collision curve written");
    Ok(())
}

#[cfg(test)]
mod tests
{
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_consistent()
    {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_passes_target_flags_through()
    {
        let cli = Cli::try_parse_from(["crashrun", "run", "--confirm", "./target", "--verbose", "-x"]).unwrap();
        match cli.command {
            Commands::Run {
                confirm,
                pagination,
                randomize,
                program,
                args,
            } => {
                assert!(confirm);
                assert!(!pagination);
                assert!(!randomize);
                assert_eq!(program, "./target");
                assert_eq!(args, vec!["--verbose", "-x"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_collisions_defaults()
    {
        let cli = Cli::try_parse_from(["crashrun", "collisions"]).unwrap();
        match cli.command {
            Commands::Collisions {
                bits,
                max_trials,
                tolerance,
                format,
            } => {
                assert_eq!(bits, 16);
                assert_eq!(max_trials, 9999);
                assert_eq!(tolerance, 1e-12);
                assert_eq!(format, OutputFormat::Plain);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_collisions_rejects_unknown_format()
    {
        assert!(Cli::try_parse_from(["crashrun", "collisions", "--format", "xml"]).is_err());
    }
}
