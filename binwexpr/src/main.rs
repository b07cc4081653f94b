//! Wexpr command-line tool for checking and formatting Wexpr documents.
//!
//! Usage: wexpr [OPTIONS] [FILE|DIR]
//!
//! Options:
//!   -p, --pretty               Pretty-print output
//!   -b, --binary <PATH>        Write the string at PATH as a binary blob (repeatable)
//!   -r, --references <FILE>    Wexpr file whose root map predefines references
//!   -w, --write                Rewrite the input file in place
//!   -o, --output <FILE>        Write output to FILE
//!       --check                Check if input is valid (exit 0 if valid, 1 if invalid)
//!   -h, --help                 Print help
//!   -V, --version              Print version

use clap::Parser;
use libwexpr::{decode_with_references, encode_with, EncodeError, EncodeOptions, References, Value};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXTENSION: &str = "wexpr";

const EXAMPLES: &str = "\
EXAMPLES:
    # Reformat a Wexpr file to canonical compact form
    wexpr config.wexpr

    # Pretty-print in place
    wexpr -p -w config.wexpr

    # Validate all Wexpr files in a directory
    wexpr --check ./configs/

    # Resolve *[name] uses against a shared table of references
    wexpr -r shared.wexpr config.wexpr

    # Emit the `icon` field of the root map as base64
    wexpr -b -.icon app.wexpr";

#[derive(Parser)]
#[command(name = "wexpr", version)]
#[command(about = "Wexpr command-line tool")]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Input file or directory (reads from stdin if omitted or `-`).
    /// A directory processes every `.wexpr` file in it.
    #[arg(value_name = "FILE|DIR")]
    input: Option<String>,

    /// Pretty-print output
    #[arg(short, long)]
    pretty: bool,

    /// Write the string at PATH (e.g. `-.field.2`) as a binary blob
    #[arg(short, long, value_name = "PATH", allow_hyphen_values = true)]
    binary: Vec<String>,

    /// Wexpr file whose root map predefines references
    #[arg(short, long, value_name = "FILE")]
    references: Option<String>,

    /// Rewrite the input file in place
    #[arg(short, long, conflicts_with = "output")]
    write: bool,

    /// Write output to the specified file (not valid with directory input)
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Check if input is valid (exit 0 if valid, 1 if invalid)
    #[arg(long)]
    check: bool,
}

/// Settings shared by every input processed in one run.
struct Job<'a> {
    encode_options: EncodeOptions,
    references: References,
    output_file: Option<&'a str>,
    write_back: bool,
    check_only: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wexpr=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let references = match &cli.references {
        Some(path) => match load_references(path) {
            Ok(references) => references,
            Err(e) => {
                eprintln!("{}: {}", path, e);
                return 1;
            }
        },
        None => References::new(),
    };

    let encode_options = cli
        .binary
        .iter()
        .fold(EncodeOptions::new().pretty(cli.pretty), |options, path| {
            options.binary_path(path.as_str())
        });

    let job = Job {
        encode_options,
        references,
        output_file: cli.output.as_deref(),
        write_back: cli.write,
        check_only: cli.check,
    };

    let input_path = cli.input.as_deref().filter(|path| *path != "-");

    if let Some(path) = input_path {
        if Path::new(path).is_dir() {
            if job.output_file.is_some() {
                eprintln!("Error: --output cannot be used with directory input");
                return 1;
            }
            return process_directory(path, &job);
        }
    }

    let raw_bytes: Vec<u8> = match input_path {
        Some(path) => match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Error reading {}: {}", path, e);
                return 1;
            }
        },
        None => {
            let mut buffer = Vec::new();
            if let Err(e) = io::stdin().read_to_end(&mut buffer) {
                eprintln!("Error reading stdin: {}", e);
                return 1;
            }
            buffer
        }
    };

    process_input(&raw_bytes, input_path, &job)
}

/// Read a Wexpr file whose root map seeds the reference table.
fn load_references(path: &str) -> Result<References, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Error reading references: {}", e))?;
    let value = libwexpr::decode(&text).map_err(|e| e.to_string())?;
    References::try_from(value).map_err(|e| e.to_string())
}

fn process_directory(dir_path: &str, job: &Job<'_>) -> i32 {
    let entries = match fs::read_dir(dir_path) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error reading directory {}: {}", dir_path, e);
            return 1;
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == EXTENSION))
        .collect();
    paths.sort();

    let mut had_errors = false;
    for path in paths {
        let path_str = path.to_string_lossy();
        let raw_bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Error reading {}: {}", path_str, e);
                had_errors = true;
                continue;
            }
        };

        if process_input(&raw_bytes, Some(path_str.as_ref()), job) != 0 {
            had_errors = true;
        }
    }

    i32::from(had_errors)
}

fn decode_input(raw_bytes: &[u8], job: &Job<'_>) -> Result<Value, String> {
    let input = std::str::from_utf8(raw_bytes)
        .map_err(|e| format!("Error: input is not valid UTF-8: {}", e))?;
    decode_with_references(input, job.references.clone()).map_err(|e| e.to_string())
}

/// Encode `value`, returning the text and the warnings to print. A failed
/// encode yields its warnings followed by the error itself.
fn encode_output(value: &Value, job: &Job<'_>) -> Result<(String, Vec<String>), Vec<String>> {
    match encode_with(value, &job.encode_options) {
        Ok(encoded) => {
            let warnings = encoded.warnings.iter().map(ToString::to_string).collect();
            Ok((encoded.text, warnings))
        }
        Err(err) => {
            let mut messages: Vec<String> = match &err {
                EncodeError::RootOmitted(warnings) => {
                    warnings.iter().map(ToString::to_string).collect()
                }
                EncodeError::TooDeep { .. } => Vec::new(),
            };
            messages.push(err.to_string());
            Err(messages)
        }
    }
}

fn process_input(raw_bytes: &[u8], input_file: Option<&str>, job: &Job<'_>) -> i32 {
    debug!(input = input_file.unwrap_or("<stdin>"), "processing");

    let report = |message: &str| match input_file {
        Some(path) => eprintln!("{}: {}", path, message),
        None => eprintln!("{}", message),
    };

    let value = match decode_input(raw_bytes, job) {
        Ok(v) => v,
        Err(e) => {
            report(e.as_str());
            return 1;
        }
    };

    if job.check_only {
        if let Some(path) = input_file {
            println!("{}: ok", path);
        }
        return 0;
    }

    let text = match encode_output(&value, job) {
        Ok((text, warnings)) => {
            warnings.iter().for_each(|warning| report(warning.as_str()));
            text
        }
        Err(messages) => {
            messages.iter().for_each(|message| report(message.as_str()));
            return 1;
        }
    };

    match write_output(&text, input_file, job) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn write_output(output: &str, input_file: Option<&str>, job: &Job<'_>) -> Result<(), String> {
    let output = format!("{}\n", output);
    if let Some(path) = job.output_file {
        fs::write(path, output).map_err(|e| format!("Error writing {}: {}", path, e))
    } else if job.write_back {
        let input_path = input_file.ok_or("Error: --write requires an input file")?;
        fs::write(input_path, output).map_err(|e| format!("Error writing {}: {}", input_path, e))
    } else {
        io::stdout()
            .lock()
            .write_all(output.as_bytes())
            .map_err(|e| format!("Error writing to stdout: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job<'static> {
        Job {
            encode_options: EncodeOptions::new(),
            references: References::new(),
            output_file: None,
            write_back: false,
            check_only: false,
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_options() {
        let cli = Cli::parse_from(["wexpr", "-p", "-b", "-.a", "-b", "-.b.0", "in.wexpr"]);
        assert!(cli.pretty);
        assert_eq!(cli.binary, vec!["-.a", "-.b.0"]);
        assert_eq!(cli.input.as_deref(), Some("in.wexpr"));
    }

    #[test]
    fn test_write_conflicts_with_output() {
        assert!(Cli::try_parse_from(["wexpr", "-w", "-o", "out.wexpr", "in.wexpr"]).is_err());
    }

    #[test]
    fn test_format_options_are_gone() {
        assert!(Cli::try_parse_from(["wexpr", "-t", "json", "in.wexpr"]).is_err());
    }

    #[test]
    fn test_decode_input_uses_references() {
        let mut job = job();
        job.references = vec![("x", Value::from(1))].into_iter().collect();
        let value = decode_input(b"#( *[x] )", &job).unwrap();
        assert_eq!(value, Value::Array(vec![Value::Number(1.0)]));
    }

    #[test]
    fn test_decode_input_reports_wexpr_errors() {
        let err = decode_input(b"<", &job()).unwrap_err();
        assert!(err.starts_with("1:1:Syntax Error: Unknown token."));
        let err = decode_input(&[0xff], &job()).unwrap_err();
        assert!(err.starts_with("Error: input is not valid UTF-8"));
    }

    #[test]
    fn test_encode_output_with_binary_path() {
        let mut job = job();
        job.encode_options = EncodeOptions::new().binary_path("-.icon");
        let value = decode_input(b"@( icon hi )", &job).unwrap();
        let (text, warnings) = encode_output(&value, &job).unwrap();
        assert_eq!(text, "@( icon <aGk=> )");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_encode_output_reports_root_omission() {
        let messages = encode_output(&Value::Number(f64::NAN), &job()).unwrap_err();
        assert_eq!(
            messages,
            vec![
                "Warning: Cannot insert NaN at -".to_string(),
                "Error: Nothing to encode because the root value was omitted.".to_string(),
            ]
        );
    }

    #[test]
    fn test_write_back_rewrites_input() {
        let path = std::env::temp_dir().join(format!("wexpr-write-back-{}.wexpr", process::id()));
        let path_str = path.to_string_lossy().into_owned();
        fs::write(&path, "#(  a\n b )").unwrap();

        let mut job = job();
        job.write_back = true;
        let raw_bytes = fs::read(&path).unwrap();
        assert_eq!(process_input(&raw_bytes, Some(&path_str), &job), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#( a b )\n");
        fs::remove_file(&path).unwrap();
    }
}
