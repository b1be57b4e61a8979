//! Unix specific plumbing needed by the logx library and daemon:
//! advisory file locks, forking/daemonization, pid liveness probes and
//! signal handler installation.

pub mod daemon;
pub mod file_lock;
pub mod file_util;
pub mod signal;
pub mod unix;
