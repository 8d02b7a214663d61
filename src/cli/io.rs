//! JSON I/O for the CLI
//!
//! - Input: one JSON value on stdin
//! - Output: one JSON object on stdout
//! - Logs go to stderr and never mix with output

use std::io::{self, Read, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Reads one JSON value from stdin
pub fn read_request() -> CliResult<Value> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_request(&input)
}

/// Reads a JSON value from stdin, or `default` when stdin is empty
pub fn read_request_or(default: Value) -> CliResult<Value> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    if input.trim().is_empty() {
        return Ok(default);
    }
    parse_request(&input)
}

fn parse_request(input: &str) -> CliResult<Value> {
    if input.trim().is_empty() {
        return Err(CliError::usage("Empty input"));
    }
    Ok(serde_json::from_str(input)?)
}

/// Writes a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&json!({
        "status": "ok",
        "data": data
    }))
}

/// Writes an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

fn write_line(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
