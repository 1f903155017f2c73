use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Parent pid of the current process from a sysinfo snapshot
pub fn parent_pid() -> Option<u32> {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::new(),
    );
    system
        .process(pid)
        .and_then(|process| process.parent())
        .map(|parent| parent.as_u32())
}
