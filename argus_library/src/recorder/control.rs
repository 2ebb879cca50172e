//! Line-oriented interactive control for a running recorder.
//!
//! Accepted commands: `start`, `stop`, `help`, `exit`. Anything else is
//! reported back with the offending token. The loop returns 0 on clean
//! shutdown so embedding binaries can use it as the process exit code.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared toggles linking a control loop to a recorder running elsewhere.
#[derive(Clone)]
pub struct RecorderControls {
    record_on: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl RecorderControls {
    pub(crate) fn new(record_on: Arc<AtomicBool>, running: Arc<AtomicBool>) -> Self {
        Self { record_on, running }
    }

    pub fn set_record_on(&self, on: bool) {
        self.record_on.store(on, Ordering::Release);
    }

    pub fn record_on(&self) -> bool {
        self.record_on.load(Ordering::Acquire)
    }

    /// Ask the recorder loop to stop; observed within one wait tick.
    pub fn request_exit(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

const HELP: &str = "COMMANDS
CMD         FUNCTION
 help       Print this information.
 start      Start recording. Appends to the file if it
            already exists.
 stop       Pause recording without starting a new file.
 exit       Exit the program.
";

/// Drive a recorder from a line-oriented command stream. Blocks until
/// `exit` or end-of-input; returns the process exit code (0 on clean
/// shutdown).
pub fn control_recorder<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    controls: &RecorderControls,
    prompt: bool,
) -> std::io::Result<i32> {
    let mut line = String::new();
    loop {
        if prompt {
            write!(output, ">>> ")?;
            output.flush()?;
        }

        line.clear();
        if input.read_line(&mut line)? == 0 {
            // End of input stream behaves like `exit`.
            controls.request_exit();
            return Ok(0);
        }

        match line.trim() {
            "exit" => {
                controls.request_exit();
                writeln!(output, "Received exit signal.")?;
                return Ok(0);
            }
            "help" => {
                output.write_all(HELP.as_bytes())?;
            }
            "start" => {
                controls.set_record_on(true);
                writeln!(output, "Recording ON.")?;
                output.flush()?;
            }
            "stop" => {
                controls.set_record_on(false);
                writeln!(output, "Recording OFF.")?;
            }
            other => {
                writeln!(output, "Invalid command '{other}'")?;
            }
        }
    }
}
