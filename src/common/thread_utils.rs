use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug)]
pub enum JoinOutcome<T> {
    Finished(T),
    Panicked,
    /// The thread is still running and has been detached.
    TimedOut,
}

/// Joins `handle`, giving up after `timeout`. A thread that has not finished
/// by then is left running on its own.
pub fn join_with_timeout<T>(handle: JoinHandle<T>, timeout: Duration) -> JoinOutcome<T> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return JoinOutcome::TimedOut;
        }
        std::thread::sleep(JOIN_POLL_INTERVAL);
    }
    match handle.join() {
        Ok(value) => JoinOutcome::Finished(value),
        Err(_) => JoinOutcome::Panicked,
    }
}
