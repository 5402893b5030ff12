//! CLI entry point for the Bus8 assembler binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assembler::assembler::{assemble, compile, AssembleOptions};
use assembler::errors::AssembleError;
use assembler::source::{extract_source, SourceContent};
use assembler::test_format::parse_test_block;
use assembler::test_runner::run_tests;
use emulator_core::{
    disassemble, Architecture, IoPort, Machine, MachineConfig, RunOutcome, Word,
};
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: bus8-asm <command> [options]

Commands:
  build <input> [-o <output>] [--verbose]  Assemble source to a memory image
  test  <input>                            Assemble and run inline tests
  run   <input>                            Assemble and run until hlt
  isa                                      Print the instruction table

Options:
  -o, --output <file>    Output file path (default: input stem + .bin)
  -v, --verbose          Print a listing to stderr (build only)
      --word-size <n>    Word modulus W (default 256)
      --max-ticks <n>    Tick budget per run or test block (default 100000)
      --strict           Reject unknown tokens instead of dropping them
  -h, --help             Show this help message

Examples:
  bus8-asm build hello.b8
  bus8-asm test counter.md
  RUST_LOG=debug bus8-asm run echo.b8 --max-ticks 5000
";

const DEFAULT_MAX_TICKS: u64 = 100_000;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Build(CommandArgs),
    Test(CommandArgs),
    Run(CommandArgs),
    Isa,
}

#[derive(Debug, PartialEq, Eq)]
struct CommandArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    verbose: bool,
    word_size: Option<u32>,
    max_ticks: u64,
    strict: bool,
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

    let command = match command_str.as_str() {
        "build" => Command::Build(parse_command_args(args, true)?),
        "test" => Command::Test(parse_command_args(args, false)?),
        "run" => Command::Run(parse_command_args(args, false)?),
        "isa" => match args.next() {
            None => Command::Isa,
            Some(arg) if arg == "--help" || arg == "-h" => return Err(USAGE_TEXT.to_string()),
            Some(arg) => return Err(format!("unexpected argument: {}", arg.to_string_lossy())),
        },
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(ParseResult::Command(command))
}

fn parse_number<T: std::str::FromStr>(
    flag: &str,
    value: Option<OsString>,
) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("missing value for {flag}"))?;
    value
        .to_string_lossy()
        .parse()
        .map_err(|_| format!("invalid value for {flag}: {}", value.to_string_lossy()))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_command_args(
    mut args: impl Iterator<Item = OsString>,
    build: bool,
) -> Result<CommandArgs, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut verbose = false;
    let mut word_size = None;
    let mut max_ticks = DEFAULT_MAX_TICKS;
    let mut strict = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if build && (arg == "--verbose" || arg == "-v") {
            verbose = true;
            continue;
        }

        if build && (arg == "-o" || arg == "--output") {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -o".to_string())?;
            output = Some(PathBuf::from(value));
            continue;
        }

        if arg == "--word-size" {
            word_size = Some(parse_number("--word-size", args.next())?);
            continue;
        }

        if arg == "--max-ticks" {
            max_ticks = parse_number("--max-ticks", args.next())?;
            continue;
        }

        if arg == "--strict" {
            strict = true;
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err("multiple input paths provided".to_string());
        }
        input = Some(PathBuf::from(arg));
    }

    let input = input.ok_or_else(|| "missing input path".to_string())?;
    Ok(CommandArgs {
        input,
        output,
        verbose,
        word_size,
        max_ticks,
        strict,
    })
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let stem = stem.strip_suffix(".b8").unwrap_or(stem);

    let parent = input.parent().unwrap_or_else(|| Path::new(""));

    parent.join(format!("{stem}.bin"))
}

fn architecture(word_size: Option<u32>) -> Result<Arc<Architecture>, i32> {
    let arch = match word_size {
        None => Architecture::standard(),
        Some(word_size) => {
            let config = MachineConfig {
                word_size,
                memory_size: usize::try_from(word_size).unwrap_or(usize::MAX),
                ..MachineConfig::default()
            };
            Architecture::with_config(config).map(Arc::new)
        }
    };
    arch.map_err(|e| {
        eprintln!("error: {e}");
        2
    })
}

fn read_source(input: &Path) -> Result<SourceContent, i32> {
    match fs::read_to_string(input) {
        Ok(content) => Ok(extract_source(input, &content)),
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", input.display());
            Err(1)
        }
    }
}

fn report_assemble_error(source: &SourceContent, e: &AssembleError) -> i32 {
    eprintln!("{}", e.format_for_stderr(&source.file_path));
    1
}

/// Serializes an image: one byte per word when words fit in a byte, two
/// little-endian bytes per word otherwise.
fn image_bytes(image: &[Word], word_size: u32) -> Vec<u8> {
    if word_size <= 256 {
        image.iter().map(|word| word.to_le_bytes()[0]).collect()
    } else {
        image.iter().flat_map(|word| word.to_le_bytes()).collect()
    }
}

fn run_build(args: CommandArgs) -> Result<(), i32> {
    let arch = architecture(args.word_size)?;
    let source = read_source(&args.input)?;
    let options = AssembleOptions { strict: args.strict };
    let config = arch.config();

    let program = assemble(
        &source.program,
        arch.isa(),
        config.word_size,
        config.memory_size,
        &options,
    )
    .map_err(|e| report_assemble_error(&source, &e))?;

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));
    let bytes = image_bytes(&program.image, config.word_size);

    if let Err(e) = fs::write(&output_path, &bytes) {
        eprintln!("error: failed to write output: {e}");
        return Err(1);
    }

    if args.verbose {
        for row in disassemble(&program.image, arch.isa(), Some(&program.debug)) {
            eprintln!("{row}");
        }
    }

    println!(
        "Assembled {} ({} words, {} bytes) -> {}",
        args.input.display(),
        program.image.len(),
        bytes.len(),
        output_path.display()
    );

    Ok(())
}

fn run_test(args: &CommandArgs) -> Result<(), i32> {
    let arch = architecture(args.word_size)?;
    let source = read_source(&args.input)?;
    let options = AssembleOptions { strict: args.strict };

    let mut machine = Machine::new(arch);
    let debug = compile(&mut machine, &source.program, &options)
        .map_err(|e| report_assemble_error(&source, &e))?;

    if source.test_blocks.is_empty() {
        println!("No test blocks found in {}", args.input.display());
        return Ok(());
    }

    let mut parsed_blocks = Vec::with_capacity(source.test_blocks.len());
    for block in &source.test_blocks {
        match parse_test_block(&block.content, block.start_line, block.end_line) {
            Ok(parsed) => parsed_blocks.push(parsed),
            Err(e) => {
                eprintln!(
                    "{}:{}: error: invalid test block: {e}",
                    source.file_path, block.start_line
                );
                return Err(1);
            }
        }
    }

    let test_result = run_tests(&mut machine, &debug, &parsed_blocks, args.max_ticks);

    for block_result in &test_result.block_results {
        println!("{block_result}");

        if !block_result.passed() {
            for ar in block_result.assertion_results.iter().filter(|ar| !ar.passed) {
                println!("  {ar}");
            }
        }
    }

    let summary = test_result.summary();
    println!();
    println!("Test Summary: {summary} (total: {})", summary.total);

    if test_result.all_passed() {
        Ok(())
    } else {
        Err(1)
    }
}

/// Port 0 of `run`: writes bytes to stdout, reads bytes from stdin (0 at end
/// of input).
struct StdioPort;

impl IoPort for StdioPort {
    fn read(&mut self) -> Word {
        let mut byte = [0_u8; 1];
        match io::stdin().read(&mut byte) {
            Ok(1) => Word::from(byte[0]),
            Ok(_) => 0,
            Err(e) => {
                log::warn!("stdin read failed: {e}");
                0
            }
        }
    }

    fn write(&mut self, value: Word) {
        let byte = value.to_le_bytes()[0];
        let mut stdout = io::stdout();
        if let Err(e) = stdout.write_all(&[byte]).and_then(|()| stdout.flush()) {
            log::warn!("stdout write failed: {e}");
        }
    }
}

fn run_program(args: &CommandArgs) -> Result<(), i32> {
    let arch = architecture(args.word_size)?;
    let source = read_source(&args.input)?;
    let options = AssembleOptions { strict: args.strict };

    let mut machine = Machine::new(arch);
    compile(&mut machine, &source.program, &options)
        .map_err(|e| report_assemble_error(&source, &e))?;
    machine.register_port(0, Box::new(StdioPort));

    match machine.run_until_halt(args.max_ticks) {
        RunOutcome::Halted { ticks } => {
            log::info!("halted after {ticks} ticks");
            Ok(())
        }
        RunOutcome::BudgetExhausted => {
            eprintln!("error: no hlt within {} ticks", args.max_ticks);
            Err(1)
        }
    }
}

fn print_isa() -> Result<(), i32> {
    let arch = architecture(None)?;
    for def in arch.isa().iter() {
        let operands: Vec<String> = def.operands.iter().map(ToString::to_string).collect();
        println!(
            "{:>3}  {:<6} {:<18} {}",
            def.opcode,
            def.name,
            operands.join(" "),
            def.summary
        );
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let result = match command {
                Command::Build(args) => run_build(args),
                Command::Test(args) => run_test(&args),
                Command::Run(args) => run_program(&args),
                Command::Isa => print_isa(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn os_args(args: &[&str]) -> impl Iterator<Item = OsString> {
        args.iter().map(OsString::from).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_build_command() {
        let result = parse_command_args(
            os_args(&["program.b8", "-o", "out.bin", "--verbose", "--strict"]),
            true,
        )
        .expect("valid build args should parse");

        assert_eq!(
            result,
            CommandArgs {
                input: PathBuf::from("program.b8"),
                output: Some(PathBuf::from("out.bin")),
                verbose: true,
                word_size: None,
                max_ticks: DEFAULT_MAX_TICKS,
                strict: true,
            }
        );
    }

    #[test]
    fn parses_numeric_options() {
        let result = parse_command_args(
            os_args(&["--word-size", "1024", "prog.md", "--max-ticks", "50"]),
            false,
        )
        .expect("numeric options should parse");

        assert_eq!(result.word_size, Some(1024));
        assert_eq!(result.max_ticks, 50);
    }

    #[test]
    fn rejects_bad_numbers() {
        let error = parse_command_args(os_args(&["p.b8", "--max-ticks", "lots"]), false)
            .expect_err("non-numeric tick budget should fail");
        assert!(error.contains("--max-ticks"));

        let error = parse_command_args(os_args(&["p.b8", "--word-size"]), false)
            .expect_err("missing value should fail");
        assert!(error.contains("missing value"));
    }

    #[test]
    fn output_flag_is_build_only() {
        let error = parse_command_args(os_args(&["p.b8", "-o", "x.bin"]), false)
            .expect_err("-o is not a test option");
        assert!(error.contains("unknown option"));
    }

    #[test]
    fn parses_isa_and_help() {
        assert!(matches!(
            parse_args(os_args(&["isa"])),
            Ok(ParseResult::Command(Command::Isa))
        ));
        assert!(matches!(parse_args(os_args(&["-h"])), Ok(ParseResult::Help)));
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(os_args(&["explode"])).expect_err("unknown command should fail");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn rejects_multiple_inputs() {
        let error = parse_command_args(os_args(&["a.b8", "b.b8"]), false)
            .expect_err("two inputs should fail");
        assert!(error.contains("multiple input paths"));
    }

    #[test]
    fn default_output_path_strips_the_source_extension() {
        assert_eq!(
            default_output_path(&PathBuf::from("program.b8")),
            PathBuf::from("program.bin")
        );
        assert_eq!(
            default_output_path(&PathBuf::from("src/program.b8.md")),
            PathBuf::from("src/program.bin")
        );
        assert_eq!(
            default_output_path(&PathBuf::from("program")),
            PathBuf::from("program.bin")
        );
    }

    #[test]
    fn images_use_one_byte_per_narrow_word() {
        assert_eq!(image_bytes(&[0, 17, 255], 256), [0, 17, 255]);
        assert_eq!(image_bytes(&[0, 0x1234], 65_536), [0, 0, 0x34, 0x12]);
    }
}
