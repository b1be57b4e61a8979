//! The reaper: a background thread that periodically sweeps the
//! registry for sessions whose owning process has died, so that
//! loggers of crashed clients (which never send DESTROY) get closed.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::session::SessionRegistry;

pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(5);

/// Sleep granularity: the interval is waited out in slices this long
/// so a shutdown request takes effect promptly.
const SLICE: Duration = Duration::from_millis(200);

pub struct Reaper {
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Start the sweep thread. `should_stop` is polled between sleep
    /// slices and before every sweep.
    pub fn spawn(
        registry: Arc<SessionRegistry>,
        interval: Duration,
        should_stop: impl Fn() -> bool + Send + 'static,
    ) -> Reaper {
        let handle = std::thread::spawn(move || loop {
            let mut slept = Duration::ZERO;
            while slept < interval {
                if should_stop() {
                    return;
                }
                let nap = SLICE.min(interval - slept);
                std::thread::sleep(nap);
                slept += nap;
            }
            if should_stop() {
                return;
            }
            let reaped = registry.cleanup_dead();
            if reaped > 0 {
                eprintln!("[logxd] reaped {reaped} session(s) of dead clients");
            }
        });
        Reaper { handle }
    }

    pub fn join(self) {
        _ = self.handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn reaps_dead_sessions_and_stops_on_request() {
        let registry = Arc::new(SessionRegistry::new());
        let cfg = Config {
            console_logging: false,
            file_logging: false,
            file_path: None,
            print_config: false,
            ..Config::default()
        };
        registry.create(std::process::id(), Some(cfg.clone())).unwrap();
        registry.create(3_999_999, Some(cfg)).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let reaper = {
            let stop = stop.clone();
            Reaper::spawn(registry.clone(), Duration::from_millis(50), move || {
                stop.load(Ordering::SeqCst)
            })
        };

        // wait out a couple of sweep intervals
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(registry.session_count(), 1);
        assert!(registry.find(std::process::id()).is_some());

        stop.store(true, Ordering::SeqCst);
        reaper.join();
    }
}
