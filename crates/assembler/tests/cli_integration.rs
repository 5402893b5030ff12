//! Integration tests for the bus8-asm CLI.

use assembler as _;
use emulator_core as _;
use env_logger as _;
use log as _;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("bus8-asm")
}

fn create_temp_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn build_simple_program() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "simple.b8", "::top loa 7\njmp :top\n");

    let output = temp_dir.path().join("simple.bin");

    let status = Command::new(binary_path())
        .args([
            "build",
            source.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .status()
        .expect("failed to run bus8-asm");

    assert!(status.success());
    assert_eq!(fs::read(&output).unwrap(), [0, 17, 7, 1, 1]);
}

#[test]
fn build_with_default_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "test.b8", "nop\n");

    let expected_output = temp_dir.path().join("test.bin");

    let status = Command::new(binary_path())
        .args(["build", source.to_str().unwrap()])
        .current_dir(temp_dir.path())
        .status()
        .expect("failed to run bus8-asm");

    assert!(status.success());
    assert!(expected_output.exists());
}

#[test]
fn build_wide_words_as_little_endian_pairs() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "wide.b8", "loa 1000 hlt\n");
    let output = temp_dir.path().join("wide.bin");

    let status = Command::new(binary_path())
        .args([
            "build",
            source.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--word-size",
            "4096",
        ])
        .status()
        .expect("failed to run bus8-asm");

    assert!(status.success());
    assert_eq!(fs::read(&output).unwrap(), [0, 0, 17, 0, 0xE8, 0x03, 2, 0]);
}

const LITERATE_CONTENT: &str = r"# Test

Prose is ignored.

```bus8
nop
hlt
```
";

#[test]
fn build_literate_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "lit.md", LITERATE_CONTENT);

    let output = temp_dir.path().join("lit.bin");

    let status = Command::new(binary_path())
        .args([
            "build",
            source.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .status()
        .expect("failed to run bus8-asm");

    assert!(status.success());
    assert_eq!(fs::read(&output).unwrap(), [0, 0, 2]);
}

#[test]
fn build_reports_errors_with_position() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "bad.b8", "nop\n  jmp :nowhere\n");

    let output = Command::new(binary_path())
        .args(["build", source.to_str().unwrap()])
        .output()
        .expect("failed to run bus8-asm");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad.b8:2:7: error: undefined label ':nowhere'"), "{stderr}");
}

#[test]
fn strict_build_rejects_unknown_tokens() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "typo.b8", "nop\nhtl\n");

    let lenient = Command::new(binary_path())
        .args(["build", source.to_str().unwrap()])
        .current_dir(temp_dir.path())
        .output()
        .expect("failed to run bus8-asm");
    assert!(lenient.status.success());

    let strict = Command::new(binary_path())
        .args(["build", source.to_str().unwrap(), "--strict"])
        .current_dir(temp_dir.path())
        .output()
        .expect("failed to run bus8-asm");
    assert!(!strict.status.success());
    let stderr = String::from_utf8_lossy(&strict.stderr);
    assert!(stderr.contains("unknown token 'htl'"), "{stderr}");
}

#[test]
fn build_verbose_prints_listing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "verbose.b8", "::start jmp :start\n");

    let output = temp_dir.path().join("verbose.bin");

    let result = Command::new(binary_path())
        .args([
            "build",
            source.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--verbose",
        ])
        .output()
        .expect("failed to run bus8-asm");

    assert!(result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("0001:"));
    assert!(stderr.contains("JMP"));
    assert!(stderr.contains(":start"));
}

const PASSING_TEST_CONTENT: &str = r"# Test

```bus8
loa 2 add 3 hlt
```

```bus8test
; 2 + 3
a == 5
b == 3
```
";

#[test]
fn test_with_passing_assertions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "pass.md", PASSING_TEST_CONTENT);

    let result = Command::new(binary_path())
        .args(["test", source.to_str().unwrap()])
        .output()
        .expect("failed to run bus8-asm");

    let stdout = String::from_utf8_lossy(&result.stdout);
    let stderr = String::from_utf8_lossy(&result.stderr);

    assert!(
        result.status.success(),
        "test should pass\nstdout: {stdout}\nstderr: {stderr}"
    );
    assert!(stdout.contains("PASS"));
    assert!(stdout.contains("Test Summary: 1 passed, 0 failed"));
}

#[test]
fn test_with_no_test_blocks() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "notests.b8", "nop\nhlt\n");

    let result = Command::new(binary_path())
        .args(["test", source.to_str().unwrap()])
        .output()
        .expect("failed to run bus8-asm");

    let stdout = String::from_utf8_lossy(&result.stdout);

    assert!(result.status.success());
    assert!(stdout.contains("No test blocks"));
}

const FAILING_TEST_CONTENT: &str = r"# Test

```bus8
loa 1 hlt
```

```bus8test
a == 2
```
";

#[test]
fn test_reports_failing_assertions() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "fail.md", FAILING_TEST_CONTENT);

    let result = Command::new(binary_path())
        .args(["test", source.to_str().unwrap()])
        .output()
        .expect("failed to run bus8-asm");

    assert!(!result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("FAIL"));
    assert!(stdout.contains("a == 2 (got 1)"));
}

#[test]
fn run_echoes_stdin_until_end_of_input() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(
        temp_dir.path(),
        "echo.b8",
        "::loop inp add 0 jpz :end aout jmp :loop ::end hlt",
    );

    let mut child = Command::new(binary_path())
        .args(["run", source.to_str().unwrap()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run bus8-asm");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"ok!")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"ok!");
}

#[test]
fn run_without_hlt_exhausts_the_budget() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "spin.b8", "::spin jmp :spin");

    let output = Command::new(binary_path())
        .args(["run", source.to_str().unwrap(), "--max-ticks", "500"])
        .output()
        .expect("failed to run bus8-asm");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no hlt within 500 ticks"));
}

#[test]
fn isa_lists_every_instruction() {
    let output = Command::new(binary_path())
        .args(["isa"])
        .output()
        .expect("failed to run bus8-asm");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 46);
    assert!(stdout.contains("movcm"));
}

#[test]
fn help_shows_usage() {
    let result = Command::new(binary_path())
        .args(["--help"])
        .output()
        .expect("failed to run bus8-asm");

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Commands:"));
    assert!(stdout.contains("build"));
    assert!(stdout.contains("run"));
}

#[test]
fn unknown_command_fails() {
    let result = Command::new(binary_path())
        .args(["unknown"])
        .output()
        .expect("failed to run bus8-asm");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("unknown command"));
}

#[test]
fn sample_programs_pass_their_tests() {
    let programs = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../programs");

    for name in ["counter.b8.md", "hello.b8.md"] {
        let result = Command::new(binary_path())
            .args(["test", programs.join(name).to_str().unwrap()])
            .output()
            .expect("failed to run bus8-asm");

        let stdout = String::from_utf8_lossy(&result.stdout);
        assert!(result.status.success(), "{name} tests failed:\n{stdout}");
    }
}
