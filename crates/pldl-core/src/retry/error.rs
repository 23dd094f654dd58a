//! Error type returned by one download-capability call.

use std::fmt;

/// How many produced file names a `NoOutput` message lists.
const MAX_LISTED_FILES: usize = 10;

/// Failure of a single backend invocation. Kept separate from `PldlError`
/// so the rotation loop can classify it before it is turned into a message.
#[derive(Debug)]
pub enum BackendError {
    /// The tool binary could not be started.
    Spawn { tool: String, source: std::io::Error },
    /// The tool exited unsuccessfully; `output` is the tail of stderr/stdout.
    Exited {
        tool: String,
        code: Option<i32>,
        output: String,
    },
    /// The tool ran longer than the configured subprocess timeout.
    TimedOut { tool: String, secs: u64 },
    /// Missing credentials or unusable settings.
    Config(String),
    /// Tool output could not be understood.
    Metadata(String),
    /// The call reported success but no new audio file appeared.
    NoOutput { produced: Vec<String> },
    Io(std::io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Spawn { tool, source } => write!(f, "failed to start {}: {}", tool, source),
            BackendError::Exited { tool, code, output } => {
                match code {
                    Some(c) => write!(f, "{} failed (exit {})", tool, c)?,
                    None => write!(f, "{} failed (killed by signal)", tool)?,
                }
                if !output.is_empty() {
                    write!(f, ": {}", output)?;
                }
                Ok(())
            }
            BackendError::TimedOut { tool, secs } => write!(f, "{} timed out ({}s)", tool, secs),
            BackendError::Config(msg) => write!(f, "configuration: {}", msg),
            BackendError::Metadata(msg) => write!(f, "metadata: {}", msg),
            BackendError::NoOutput { produced } => {
                write!(f, "download step completed but no audio file was produced")?;
                if produced.is_empty() {
                    write!(f, " (no files)")
                } else {
                    let listed: Vec<&str> = produced
                        .iter()
                        .take(MAX_LISTED_FILES)
                        .map(String::as_str)
                        .collect();
                    write!(f, ". Produced files: {}", listed.join(", "))
                }
            }
            BackendError::Io(e) => write!(f, "io: {}", e),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Spawn { source, .. } => Some(source),
            BackendError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e)
    }
}
