use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::page::PageNumber;
use crate::region::Policy;
use crate::stats::StatsLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write,
}

/// One line of the operation stream: `<read|write> <page> <word offset> <value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub kind: OpKind,
    pub page: PageNumber,
    pub word_offset: usize,
    pub value: i32,
}

impl Operation {
    pub fn parse(line: &str, line_no: usize) -> Result<Self> {
        let err = |message: String| Error::Parse { line: line_no, message };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(err(format!("expected 4 fields, got {}", tokens.len())));
        }

        let kind = match tokens[0] {
            "read" => OpKind::Read,
            "write" => OpKind::Write,
            other => return Err(err(format!("invalid operation: {}", other))),
        };
        let page: PageNumber = tokens[1]
            .parse()
            .map_err(|_| err(format!("invalid page number: {}", tokens[1])))?;
        let word_offset: usize = tokens[2]
            .parse()
            .map_err(|_| err(format!("invalid offset: {}", tokens[2])))?;
        let value: i32 = tokens[3]
            .parse()
            .map_err(|_| err(format!("invalid value: {}", tokens[3])))?;

        Ok(Operation { kind, page, word_offset, value })
    }
}

pub fn parse_operations(content: &str) -> Result<Vec<Operation>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| Operation::parse(line, i + 1))
        .collect()
}

pub fn read_operations<P: AsRef<Path>>(path: P) -> Result<Vec<Operation>> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_operations(&content)
}

/// `<dir>/result-<policy code>-<frames>-<input file name>`
pub fn output_path<P: AsRef<Path>>(dir: P, policy: Policy, frames: usize, input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.as_ref().join(format!("result-{}-{}-{}", policy.code(), frames, name))
}

/// Write the report to `path`, creating its directory if needed.
pub fn write_results<P: AsRef<Path>>(
    path: P,
    log: &StatsLog,
    page_size: usize,
    frames: usize,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = fs::File::create(path)?;
    log.write_report(&mut file, page_size, frames)
}
