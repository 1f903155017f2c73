/// Parent pid of the current process
///
/// Encapsulates the getppid call, which cannot fail
pub fn parent_pid() -> u32 {
    let ppid = unsafe { libc::getppid() };
    ppid as u32
}
