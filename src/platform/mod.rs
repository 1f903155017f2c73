//! Platform specific process helpers

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// Pid of the process that supervises the workers. A reporter embedded in a
/// worker sees the supervisor as its own parent.
pub fn supervisor_pid() -> u32 {
    #[cfg(unix)]
    {
        unix::parent_pid()
    }

    #[cfg(windows)]
    {
        windows::parent_pid().unwrap_or_else(std::process::id)
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::process::id()
    }
}
