use std::io::{self, Write};

use serde::Serialize;

/// How a command reports its result. Logs go to stderr either way; `Json`
/// also prints the result document on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Log,
    Json,
}

impl OutputMode {
    pub fn emit<T: Serialize>(self, value: &T) -> io::Result<()> {
        match self {
            OutputMode::Log => Ok(()),
            OutputMode::Json => write_json(&mut io::stdout().lock(), value),
        }
    }
}

/// Pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::other)?;
    out.write_all(b"\n")
}
