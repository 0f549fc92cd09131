use std::io::{self, BufRead, Write};

/// Host console seam for the read/print instructions. The processor is
/// generic over this so tests can script input and capture output.
pub trait Console {
    /// Blocks until one line of input is available. Returns an empty string
    /// when the input stream is closed or fails; the read instructions then
    /// fall back to zero.
    fn read_line(&mut self) -> String;

    fn write_line(&mut self, line: &str);
}

/// Console backed by stdin/stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self) -> String {
        let mut buffer = String::new();
        if io::stdin().lock().read_line(&mut buffer).is_err() {
            buffer.clear();
        }
        buffer
    }

    fn write_line(&mut self, line: &str) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{line}");
    }
}
