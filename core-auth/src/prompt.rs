//! Operator interaction for the one-time authorization step.

use crate::error::{AuthError, Result};
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

/// Shows the authorization URL and blocks until the operator supplies a code.
///
/// There is no timeout; nothing else proceeds until the call returns.
pub trait AuthCodePrompt: Send {
    fn request_code(&mut self, auth_url: &str) -> Result<String>;
}

/// Line-oriented prompt over any reader/writer pair.
///
/// Blank lines are skipped; end of input is an error.
pub struct ConsolePrompt<R, W> {
    reader: R,
    writer: W,
}

impl ConsolePrompt<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    fn io_error(e: io::Error) -> AuthError {
        AuthError::PromptFailed(e.to_string())
    }
}

impl<R, W> AuthCodePrompt for ConsolePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn request_code(&mut self, auth_url: &str) -> Result<String> {
        writeln!(
            self.writer,
            "Go to the following link in your browser, then paste the authorization code \
             (or the full address you were redirected to):\n\n{}\n",
            auth_url
        )
        .map_err(Self::io_error)?;

        loop {
            write!(self.writer, "Authorization code: ").map_err(Self::io_error)?;
            self.writer.flush().map_err(Self::io_error)?;

            let mut line = String::new();
            let read = self.reader.read_line(&mut line).map_err(Self::io_error)?;
            if read == 0 {
                return Err(AuthError::PromptFailed(
                    "input closed before an authorization code was entered".to_string(),
                ));
            }

            let code = line.trim();
            if !code.is_empty() {
                return Ok(code.to_string());
            }
        }
    }
}
