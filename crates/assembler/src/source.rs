//! Source ingestion for plain and literate assembly formats.
//!
//! - **Literate** (`.md`): Markdown files where fenced code blocks tagged
//!   `bus8` contain program text and blocks tagged `bus8test` contain inline
//!   test assertions. Everything else is prose.
//! - **Plain** (anything else): the entire file is program text.
//!
//! Prose lines are replaced by empty lines in the extracted program so that
//! token positions still point at the original file's lines.

use std::path::Path;

/// Language tag of program blocks.
pub const PROGRAM_TAG: &str = "bus8";
/// Language tag of test blocks.
pub const TEST_TAG: &str = "bus8test";

/// A `bus8test` block with its location in the original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBlock {
    /// Block text without fence lines.
    pub content: String,
    /// 1-indexed line of the opening fence.
    pub start_line: usize,
    /// 1-indexed line of the closing fence.
    pub end_line: usize,
}

/// Program text and test blocks extracted from an input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContent {
    /// Program text, line-aligned with the original file.
    pub program: String,
    /// Test blocks in document order.
    pub test_blocks: Vec<TestBlock>,
    /// The file path, for error reporting.
    pub file_path: String,
}

/// Extracts program text and test blocks from `content`, read from
/// `file_path`.
#[must_use]
pub fn extract_source(file_path: &Path, content: &str) -> SourceContent {
    let file_path = file_path.to_string_lossy().to_string();

    if is_literate_file(Path::new(&file_path)) {
        let (program, test_blocks) = extract_literate(content);
        SourceContent {
            program,
            test_blocks,
            file_path,
        }
    } else {
        SourceContent {
            program: content.to_string(),
            test_blocks: Vec::new(),
            file_path,
        }
    }
}

/// Returns true if the file should be treated as literate (Markdown) format.
fn is_literate_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    Program,
    Test { start_line: usize },
    Other,
}

fn extract_literate(content: &str) -> (String, Vec<TestBlock>) {
    let mut program = String::new();
    let mut test_blocks = Vec::new();
    let mut open: Option<(Block, usize)> = None;
    let mut test_content = String::new();

    for (idx, line) in content.lines().enumerate() {
        let line_num = idx + 1;
        let fence = is_fence_start(line);

        match (open, fence) {
            (Some((block, fence_len)), Some(len)) if len >= fence_len && is_bare_fence(line) => {
                if let Block::Test { start_line } = block {
                    test_blocks.push(TestBlock {
                        content: std::mem::take(&mut test_content),
                        start_line,
                        end_line: line_num,
                    });
                }
                open = None;
            }
            (Some((Block::Program, _)), _) => program.push_str(line),
            (Some((Block::Test { .. }, _)), _) => {
                test_content.push_str(line);
                test_content.push('\n');
            }
            (Some((Block::Other, _)), _) => {}
            (None, Some(len)) => {
                let tag = line.trim_start()[len..].split_whitespace().next();
                let block = match tag {
                    Some(PROGRAM_TAG) => Block::Program,
                    Some(TEST_TAG) => Block::Test {
                        start_line: line_num,
                    },
                    _ => Block::Other,
                };
                open = Some((block, len));
            }
            (None, None) => {}
        }
        program.push('\n');
    }

    if let Some((Block::Test { start_line }, _)) = open {
        log::debug!("test block opened at line {start_line} is never closed");
        test_blocks.push(TestBlock {
            content: test_content,
            start_line,
            end_line: content.lines().count(),
        });
    }

    (program, test_blocks)
}

/// Returns the number of backticks if `line` opens or closes a fenced code
/// block (>= 3 backticks), or None otherwise.
fn is_fence_start(line: &str) -> Option<usize> {
    let count = line.trim_start().chars().take_while(|&c| c == '`').count();
    (count >= 3).then_some(count)
}

fn is_bare_fence(line: &str) -> bool {
    line.trim().chars().all(|c| c == '`')
}
