use std::sync::{Condvar, Mutex};

/// A blocking wait/notify event used for boss/worker communication.
///
/// A notification delivered while no thread is waiting is latched and
/// consumed by the next call to [`wait`](Signal::wait), so a notifier
/// racing ahead of its waiter cannot cause a missed wakeup. Spurious
/// condition-variable wakeups are absorbed internally.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<SignalState>,
    cvar: Condvar,
}

#[derive(Debug, Default)]
struct SignalState {
    /// One latched notification from `notify_one`, consumed by a single
    /// waiter.
    pending: bool,
    /// Bumped by `notify_all`; releases every waiter that registered
    /// before the bump.
    epoch: u64,
    /// Threads currently blocked in `wait`.
    waiters: usize,
}

impl Signal {
    /// Creates a signal with no pending notification.
    pub fn new() -> Self {
        Signal {
            state: Mutex::new(SignalState::default()),
            cvar: Condvar::new(),
        }
    }

    /// Blocks until a notification is pending, then consumes it.
    ///
    /// Returns immediately if a latched notification is already waiting.
    pub fn wait(&self) {
        let mut state = self.state.lock().expect("signal mutex poisoned");
        if state.pending {
            state.pending = false;
            return;
        }

        let epoch = state.epoch;
        state.waiters += 1;
        loop {
            state = self.cvar.wait(state).expect("signal mutex poisoned");
            // A broadcast covers every waiter from before the bump.
            if state.epoch != epoch {
                break;
            }
            if state.pending {
                state.pending = false;
                break;
            }
        }
        state.waiters -= 1;
    }

    /// Wakes at most one waiter, or latches the notification for the
    /// next waiter if none is currently blocked.
    pub fn notify_one(&self) {
        let mut state = self.state.lock().expect("signal mutex poisoned");
        state.pending = true;
        self.cvar.notify_one();
    }

    /// Wakes every currently blocked waiter, or latches a single
    /// notification for the next waiter if none is blocked.
    pub fn notify_all(&self) {
        let mut state = self.state.lock().expect("signal mutex poisoned");
        if state.waiters > 0 {
            state.epoch += 1;
            self.cvar.notify_all();
        } else {
            state.pending = true;
        }
    }
}
