#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Invalid CLI flags (bad durations, missing/conflicting stop condition).
    InvalidInput = 30,

    /// Internal/runtime error (bad target URL, IO errors, join failures).
    ///
    /// Per-request failures are not errors at this level: they surface as
    /// counters in the summary and leave the exit code at `Success`.
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
