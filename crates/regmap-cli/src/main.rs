//! CLI entry point for the `regmap` binary.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{LevelFilter, Log, Metadata, Record};
use regmap_core::{
    format_register_dump, parse_hex_value, read_file, values_comparison, Number, QFormat,
    RegistersMap,
};
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: regmap <command> [options]

Commands:
  show   <schema.json> [--values <dump>] [--hex]   Print registers and their elements
  dump   <schema.json> [--values <dump>] [-o <out>] Write register values as a text dump
  diff   <a.txt> <b.txt> [--all]                  Compare two text dumps by address
  encode <value> [-f <format>]                    Encode a real value to bits and bytes
  decode <word> [-f <format>]                     Decode a hex word to a real value

Options:
  --values <file>      Text dump loaded into the map before printing
  -f, --format <fmt>   q9.23 (default), int32, intN, or qA.B
  -o, --output <file>  Output path (stdout when omitted)
  --hex                Show element values in hex and binary
  --all                Show unchanged addresses in diff output
  -v, --verbose        Log debug diagnostics to stderr
  -h, --help           Show this help message

Examples:
  regmap show ad9833.json --values capture.txt --hex
  regmap diff before.txt after.txt
  regmap encode -- -1.5 -f q9.23
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Show(ShowArgs),
    Dump(DumpArgs),
    Diff(DiffArgs),
    Encode(CodecArgs),
    Decode(CodecArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct ShowArgs {
    schema: PathBuf,
    values: Option<PathBuf>,
    hex: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct DumpArgs {
    schema: PathBuf,
    values: Option<PathBuf>,
    output: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
struct DiffArgs {
    left: PathBuf,
    right: PathBuf,
    all: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct CodecArgs {
    input: String,
    format: QFormat,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{}: {}", record.level().as_str().to_lowercase(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        });
    }
}

/// Splits `-v`/`--verbose` off the argument list; it is accepted anywhere.
fn take_verbose(args: impl Iterator<Item = OsString>) -> (bool, Vec<OsString>) {
    let mut verbose = false;
    let rest = args
        .filter(|arg| {
            let is_verbose = arg == "-v" || arg == "--verbose";
            verbose |= is_verbose;
            !is_verbose
        })
        .collect();
    (verbose, rest)
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    let command = match command_str.as_str() {
        "show" => parse_show_args(args).map(Command::Show),
        "dump" => parse_dump_args(args).map(Command::Dump),
        "diff" => parse_diff_args(args).map(Command::Diff),
        "encode" => parse_codec_args(args).map(Command::Encode),
        "decode" => parse_codec_args(args).map(Command::Decode),
        other => Err(format!("unknown command: {other}")),
    }?;
    Ok(ParseResult::Command(command))
}

fn next_value(args: &mut impl Iterator<Item = OsString>, flag: &str) -> Result<OsString, String> {
    args.next()
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn reject_flag(arg: &OsString) -> Result<(), String> {
    if arg == "--help" || arg == "-h" {
        return Err(USAGE_TEXT.to_string());
    }
    if arg.to_string_lossy().starts_with('-') {
        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }
    Ok(())
}

#[allow(clippy::while_let_on_iterator)]
fn parse_show_args(mut args: impl Iterator<Item = OsString>) -> Result<ShowArgs, String> {
    let mut schema: Option<PathBuf> = None;
    let mut values: Option<PathBuf> = None;
    let mut hex = false;

    while let Some(arg) = args.next() {
        if arg == "--hex" {
            hex = true;
            continue;
        }
        if arg == "--values" {
            values = Some(PathBuf::from(next_value(&mut args, "--values")?));
            continue;
        }
        reject_flag(&arg)?;
        if schema.is_some() {
            return Err("multiple schema paths provided".to_string());
        }
        schema = Some(PathBuf::from(arg));
    }

    let schema = schema.ok_or_else(|| "missing schema path".to_string())?;
    Ok(ShowArgs {
        schema,
        values,
        hex,
    })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_dump_args(mut args: impl Iterator<Item = OsString>) -> Result<DumpArgs, String> {
    let mut schema: Option<PathBuf> = None;
    let mut values: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        if arg == "--values" {
            values = Some(PathBuf::from(next_value(&mut args, "--values")?));
            continue;
        }
        if arg == "-o" || arg == "--output" {
            output = Some(PathBuf::from(next_value(&mut args, "-o")?));
            continue;
        }
        reject_flag(&arg)?;
        if schema.is_some() {
            return Err("multiple schema paths provided".to_string());
        }
        schema = Some(PathBuf::from(arg));
    }

    let schema = schema.ok_or_else(|| "missing schema path".to_string())?;
    Ok(DumpArgs {
        schema,
        values,
        output,
    })
}

fn parse_diff_args(args: impl Iterator<Item = OsString>) -> Result<DiffArgs, String> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut all = false;

    for arg in args {
        if arg == "--all" {
            all = true;
            continue;
        }
        reject_flag(&arg)?;
        paths.push(PathBuf::from(arg));
    }

    match <[PathBuf; 2]>::try_from(paths) {
        Ok([left, right]) => Ok(DiffArgs { left, right, all }),
        Err(paths) => Err(format!("diff needs two dump paths, got {}", paths.len())),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_codec_args(mut args: impl Iterator<Item = OsString>) -> Result<CodecArgs, String> {
    let mut input: Option<String> = None;
    let mut format = QFormat::default();
    let mut positional_next = false;

    while let Some(arg) = args.next() {
        if positional_next {
            positional_next = false;
        } else {
            if arg == "--" {
                positional_next = true;
                continue;
            }
            if arg == "-f" || arg == "--format" {
                let value = next_value(&mut args, "--format")?;
                format = parse_format(&value.to_string_lossy())?;
                continue;
            }
            reject_flag(&arg)?;
        }
        if input.is_some() {
            return Err("multiple values provided".to_string());
        }
        input = Some(arg.to_string_lossy().to_string());
    }

    let input = input.ok_or_else(|| "missing value".to_string())?;
    Ok(CodecArgs { input, format })
}

/// Parses `q9.23`, `int32`, `intN`, or `qA.B` (the `q` is optional).
fn parse_format(text: &str) -> Result<QFormat, String> {
    let lower = text.trim().to_ascii_lowercase();
    let (a, b) = lower.strip_prefix("int").map_or_else(
        || {
            lower
                .strip_prefix('q')
                .unwrap_or(&lower)
                .split_once('.')
                .ok_or_else(|| format!("invalid format '{text}': expected qA.B or intN"))
        },
        |bits| Ok((bits, "0")),
    )?;
    let a = a
        .parse::<u32>()
        .map_err(|e| format!("invalid format '{text}': {e}"))?;
    let b = b
        .parse::<u32>()
        .map_err(|e| format!("invalid format '{text}': {e}"))?;
    QFormat::new(a, b).map_err(|e| e.to_string())
}

fn parse_hex_word(text: &str) -> Result<u64, String> {
    parse_hex_value(text).map_err(|e| format!("invalid hex word '{text}': {e}"))
}

fn load_map(schema: &Path, values: Option<&Path>) -> Result<RegistersMap, i32> {
    let mut map = RegistersMap::load_json_file(schema).map_err(|e| {
        eprintln!("error: {}: {e}", schema.display());
        1
    })?;
    if let Some(values) = values {
        let applied = map.load_file(values).map_err(|e| {
            eprintln!("error: {}: {e}", values.display());
            1
        })?;
        log::debug!("loaded {applied} register values from {}", values.display());
    }
    Ok(map)
}

fn run_show(args: &ShowArgs) -> Result<(), i32> {
    let map = load_map(&args.schema, args.values.as_deref())?;
    println!("{}", map.name());
    if let Some(description) = map.description() {
        println!("{description}");
    }
    println!("{}", map.render(args.hex));
    Ok(())
}

fn run_dump(args: &DumpArgs) -> Result<(), i32> {
    let map = load_map(&args.schema, args.values.as_deref())?;
    match &args.output {
        Some(path) => {
            map.save_to_file(path).map_err(|e| {
                eprintln!("error: failed to write {}: {e}", path.display());
                1
            })?;
            println!(
                "Wrote {} registers -> {}",
                map.registers().len(),
                path.display()
            );
        }
        None => print!(
            "{}",
            format_register_dump(Some(map.name()), &map.addressed_values())
        ),
    }
    Ok(())
}

fn run_diff(args: &DiffArgs) -> Result<(), i32> {
    let read = |path: &Path| {
        read_file(path).map_err(|e| {
            eprintln!("error: {}: {e}", path.display());
            1
        })
    };
    let left = read(&args.left)?;
    let right = read(&args.right)?;
    let rows = values_comparison(&left, &right);

    println!("{:>6}  {:>18}  {:>18}", "addr", "left", "right");
    for row in rows.iter().filter(|row| args.all || row.different) {
        println!("{row}");
    }

    let differing = rows.iter().filter(|row| row.different).count();
    println!();
    println!("{differing} of {} addresses differ", rows.len());
    if differing == 0 {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_encode(args: &CodecArgs) -> Result<(), i32> {
    let value = args.input.trim().parse::<f64>().map_err(|e| {
        eprintln!("error: invalid value '{}': {e}", args.input);
        1
    })?;
    let number = Number::new(value, args.format).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let hex_bytes: String = number
        .bytes()
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "{} {} -> bits {:#x} bytes {hex_bytes}",
        args.format,
        number.value(),
        number.bits()
    );
    Ok(())
}

fn run_decode(args: &CodecArgs) -> Result<(), i32> {
    let bits = parse_hex_word(&args.input).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    let number = Number::from_bits(bits, args.format);
    println!("{} {bits:#x} -> {}", args.format, number.value());
    Ok(())
}

fn main() {
    let (verbose, args) = take_verbose(env::args_os().skip(1));
    init_logging(verbose);

    let exit_code = match parse_args(args.into_iter()) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let result = match command {
                Command::Show(args) => run_show(&args),
                Command::Dump(args) => run_dump(&args),
                Command::Diff(args) => run_diff(&args),
                Command::Encode(args) => run_encode(&args),
                Command::Decode(args) => run_decode(&args),
            };
            result.err().unwrap_or(0)
        }
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
