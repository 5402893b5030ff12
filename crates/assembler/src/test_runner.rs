//! HALT-driven test execution engine for inline test blocks.
//!
//! ## Execution Model
//!
//! 1. The program is compiled into a fresh [`Machine`].
//! 2. For each `bus8test` block in document order:
//!    a. Tick until the next `hlt` (or until the tick budget runs out).
//!    b. Evaluate all assertions against the current machine state.
//!    c. Report failures with expected vs. actual values.
//!    d. Resume past the `hlt` for the next test block.
//! 3. Report summary: passed, failed, unexecuted.

use std::fmt;

use emulator_core::{DebugDatabase, Machine, RunOutcome};

use crate::test_format::{Assertion, Operand, ParsedTestBlock, Target};

/// Result of evaluating a single assertion against machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    /// The original assertion that was evaluated.
    pub assertion: Assertion,
    /// Whether the assertion passed.
    pub passed: bool,
    /// The actual value observed, or why it could not be observed.
    pub actual: String,
}

/// Result of running a single test block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBlockResult {
    /// 1-indexed source line where the test block starts.
    pub start_line: usize,
    /// 1-indexed source line where the test block ends.
    pub end_line: usize,
    /// Results for each assertion in the block.
    pub assertion_results: Vec<AssertionResult>,
    /// Ticks executed before the block's `hlt`, or `None` when the budget
    /// ran out first.
    pub ticks: Option<u64>,
}

impl TestBlockResult {
    /// Returns true if the block reached a `hlt` and all assertions passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.ticks.is_some() && self.assertion_results.iter().all(|r| r.passed)
    }
}

/// Result of running all test blocks for a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunResult {
    /// Results for each executed test block in order.
    pub block_results: Vec<TestBlockResult>,
    /// Number of test blocks that were not executed.
    pub unexecuted_blocks: usize,
}

impl TestRunResult {
    /// Returns true if every block ran and passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.unexecuted_blocks == 0 && self.block_results.iter().all(TestBlockResult::passed)
    }

    /// Returns counts for summary reporting.
    #[must_use]
    pub fn summary(&self) -> TestSummary {
        let passed = self.block_results.iter().filter(|b| b.passed()).count();
        TestSummary {
            passed,
            failed: self.block_results.len() - passed,
            unexecuted: self.unexecuted_blocks,
            total: self.block_results.len() + self.unexecuted_blocks,
        }
    }
}

/// Summary counts for test run reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSummary {
    /// Number of test blocks that passed.
    pub passed: usize,
    /// Number of test blocks that failed.
    pub failed: usize,
    /// Number of test blocks that were not executed.
    pub unexecuted: usize,
    /// Total number of test blocks.
    pub total: usize,
}

/// Runs `test_blocks` against the program already loaded in `machine`.
///
/// Each block gets at most `max_ticks` ticks to reach its `hlt`. A block
/// that runs out of budget fails and the remaining blocks are left
/// unexecuted.
#[must_use]
pub fn run_tests(
    machine: &mut Machine,
    debug: &DebugDatabase,
    test_blocks: &[ParsedTestBlock],
    max_ticks: u64,
) -> TestRunResult {
    let mut block_results = Vec::new();

    for block in test_blocks {
        let outcome = machine.run_until_halt(max_ticks);
        let ticks = match outcome {
            RunOutcome::Halted { ticks } => Some(ticks),
            RunOutcome::BudgetExhausted => None,
        };
        log::debug!(
            "test block at lines {}-{}: {outcome:?}",
            block.start_line,
            block.end_line
        );

        let assertion_results = block
            .assertions
            .iter()
            .map(|assertion| evaluate_assertion(machine, debug, assertion))
            .collect();
        block_results.push(TestBlockResult {
            start_line: block.start_line,
            end_line: block.end_line,
            assertion_results,
            ticks,
        });

        if ticks.is_none() {
            break;
        }
    }

    TestRunResult {
        unexecuted_blocks: test_blocks.len() - block_results.len(),
        block_results,
    }
}

/// Evaluates a single assertion against the current machine state.
fn evaluate_assertion(
    machine: &Machine,
    debug: &DebugDatabase,
    assertion: &Assertion,
) -> AssertionResult {
    let observed = read_target(machine, debug, &assertion.target).and_then(|actual| {
        resolve(debug, &assertion.expected).map(|expected| (actual, expected))
    });

    match observed {
        Ok((actual, expected)) => AssertionResult {
            assertion: assertion.clone(),
            passed: assertion.operator.holds(actual, expected),
            actual: actual.to_string(),
        },
        Err(reason) => AssertionResult {
            assertion: assertion.clone(),
            passed: false,
            actual: reason,
        },
    }
}

fn read_target(machine: &Machine, debug: &DebugDatabase, target: &Target) -> Result<i64, String> {
    match target {
        Target::Component(name) => machine
            .datapath()
            .get(name)
            .map(i64::from)
            .map_err(|error| error.to_string()),
        Target::Memory(address) => {
            let address = resolve(debug, address)?;
            usize::try_from(address)
                .ok()
                .and_then(|index| machine.datapath().memory().get(index))
                .map(|&word| i64::from(word))
                .ok_or_else(|| format!("address {address} is outside memory"))
        }
    }
}

fn resolve(debug: &DebugDatabase, operand: &Operand) -> Result<i64, String> {
    match operand {
        Operand::Literal(value) => Ok(*value),
        Operand::Label(label) => debug
            .address_of(label)
            .map(i64::from)
            .ok_or_else(|| format!("unknown label '{label}'")),
    }
}

impl fmt::Display for TestBlockResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            write!(
                f,
                "PASS (lines {}-{}): {} assertions",
                self.start_line,
                self.end_line,
                self.assertion_results.len()
            )
        } else if self.ticks.is_none() {
            write!(
                f,
                "FAIL (lines {}-{}): no hlt reached within the tick budget",
                self.start_line, self.end_line
            )
        } else {
            let failures = self.assertion_results.iter().filter(|r| !r.passed).count();
            write!(
                f,
                "FAIL (lines {}-{}): {failures} assertion(s) failed",
                self.start_line, self.end_line
            )
        }
    }
}

impl fmt::Display for AssertionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            write!(f, "PASS: {}", self.assertion)
        } else {
            write!(f, "FAIL: {} (got {})", self.assertion, self.actual)
        }
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} passed, {} failed", self.passed, self.failed)?;
        if self.unexecuted > 0 {
            write!(f, ", {} unexecuted", self.unexecuted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use emulator_core::{Architecture, DebugDatabase, Machine};

    use super::{run_tests, TestRunResult};
    use crate::assembler::{compile, AssembleOptions};
    use crate::test_format::parse_test_block;

    fn run(source: &str, blocks: &[&str], max_ticks: u64) -> TestRunResult {
        let mut machine = Machine::new(Architecture::standard().unwrap());
        let debug: DebugDatabase = compile(&mut machine, source, &AssembleOptions::default()).unwrap();
        let parsed: Vec<_> = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| parse_test_block(block, index * 10, index * 10 + 5).unwrap())
            .collect();
        run_tests(&mut machine, &debug, &parsed, max_ticks)
    }

    #[test]
    fn each_block_sees_its_own_halt() {
        let result = run(
            "loa 1 hlt loa 2 hlt",
            &["a == 1", "a == 2\na != 1"],
            1_000,
        );

        assert!(result.all_passed(), "{result:?}");
        assert_eq!(result.summary().passed, 2);
    }

    #[test]
    fn failing_assertion_reports_the_actual_value() {
        let result = run("loa 5 hlt", &["a == 6"], 1_000);

        assert!(!result.all_passed());
        let failure = &result.block_results[0].assertion_results[0];
        assert_eq!(failure.actual, "5");
        assert_eq!(failure.to_string(), "FAIL: a == 6 (got 5)");
    }

    #[test]
    fn memory_assertions_resolve_labels() {
        let result = run(
            "loa 'h movam $slot hlt",
            &["[$slot] == 'h\n[s0] != 0 ; no such string"],
            1_000,
        );

        let block = &result.block_results[0];
        assert!(block.assertion_results[0].passed);
        assert!(!block.assertion_results[1].passed);
        assert_eq!(block.assertion_results[1].actual, "unknown label 's0'");
    }

    #[test]
    fn unknown_components_fail_instead_of_panicking() {
        let result = run("hlt", &["r9 == 0"], 1_000);

        assert!(!result.block_results[0].assertion_results[0].passed);
    }

    #[test]
    fn exhausted_budget_leaves_later_blocks_unexecuted() {
        let result = run("::spin jmp :spin", &["a == 0", "a == 0", "a == 0"], 200);

        let summary = result.summary();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unexecuted, 2);
        assert_eq!(summary.total, 3);
        assert!(result.block_results[0].to_string().contains("tick budget"));
        assert_eq!(summary.to_string(), "0 passed, 1 failed, 2 unexecuted");
    }
}
