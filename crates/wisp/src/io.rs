use std::{
    borrow::Cow,
    io::{self, Write as _},
};

/// Trait for handling output from the `print` native function.
///
/// Implement this trait to capture or redirect interpreter output. The
/// default implementation, [`StdPrint`], writes straight to stdout.
pub trait PrintWriter {
    /// Writes one already-escape-expanded chunk of text.
    ///
    /// Called once per `print` argument; the caller is responsible for any
    /// trailing newline.
    fn write_str(&mut self, text: Cow<'_, str>) -> io::Result<()>;
}

/// Default `PrintWriter` that writes straight to stdout.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_str(&mut self, text: Cow<'_, str>) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(text.as_bytes())?;
        lock.flush()
    }
}

/// A `PrintWriter` that collects all output into a string.
///
/// Useful for tests that assert on what a program printed without going
/// through the process's real stdout.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    /// Creates a new empty `CollectStringPrint`.
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    /// Returns the collected output as a string slice.
    #[must_use]
    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the writer and returns the collected output.
    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn write_str(&mut self, text: Cow<'_, str>) -> io::Result<()> {
        self.0.push_str(&text);
        Ok(())
    }
}

/// `PrintWriter` that discards all output.
///
/// Useful for benchmarks, where the cost of formatting should be measured
/// without the cost of a real write.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_str(&mut self, _text: Cow<'_, str>) -> io::Result<()> {
        Ok(())
    }
}
