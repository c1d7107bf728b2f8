use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Cooperative shutdown signal shared between the probe loop and its
/// caller (a Ctrl-C handler, a supervising thread, a test).
///
/// Waiting on the flag doubles as the interval tick and the send backoff:
/// `wait_timeout` returns as soon as shutdown is requested, so a session
/// never sleeps out a full interval on its way down.
#[derive(Clone)]
pub struct ShutdownFlag {
    condition: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownFlag {
    #[must_use]
    pub fn new() -> Self {
        Self {
            condition: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn request(&self) {
        let (lock, cvar) = &*self.condition;
        let mut requested = lock.lock().unwrap();
        *requested = true;
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        let (lock, _) = &*self.condition;
        *lock.lock().unwrap()
    }

    /// Blocks for at most `timeout`. Returns true when shutdown was
    /// requested before the timeout elapsed.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.condition;
        let deadline = Instant::now() + timeout;
        let mut requested = lock.lock().unwrap();
        while !*requested {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = cvar.wait_timeout(requested, deadline - now).unwrap();
            requested = guard;
        }
        *requested
    }
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unrequested() {
        assert!(!ShutdownFlag::new().is_requested());
    }

    #[test]
    fn request_is_visible_to_clones() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        flag.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn wait_returns_early_once_requested() {
        let flag = ShutdownFlag::new();
        flag.request();
        let started = Instant::now();
        assert!(flag.wait_timeout(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_times_out_when_not_requested() {
        let flag = ShutdownFlag::new();
        assert!(!flag.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn request_from_another_thread_interrupts_the_wait() {
        let flag = ShutdownFlag::new();
        let requester = flag.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            requester.request();
        });
        assert!(flag.wait_timeout(Duration::from_secs(10)));
        handle.join().unwrap();
    }
}
