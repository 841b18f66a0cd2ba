//! Process-wide bring-up and teardown.
//!
//! [`initialize`] and [`finalize`] may be called any number of times, from any thread. Only the
//! first call of each pair has an effect.
use log::{error, info};
use parking_lot::{const_mutex, Mutex};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RuntimeState {
    Uninitialized,
    Initialized,
    Finalized,
}

static STATE: Mutex<RuntimeState> = const_mutex(RuntimeState::Uninitialized);

/// Brings up the process-wide state. Calling it again before [`finalize`] does nothing.
pub fn initialize() {
    let mut state = STATE.lock();
    if *state != RuntimeState::Initialized {
        info!("nlfem runtime initialized (version {})", env!("CARGO_PKG_VERSION"));
        *state = RuntimeState::Initialized;
    }
}

/// Tears down the process-wide state and flushes the logger.
///
/// The runtime may be initialized again afterwards.
pub fn finalize() {
    let mut state = STATE.lock();
    if *state == RuntimeState::Initialized {
        info!("nlfem runtime finalized");
        log::logger().flush();
        *state = RuntimeState::Finalized;
    }
}

pub fn is_initialized() -> bool {
    *STATE.lock() == RuntimeState::Initialized
}

/// Reports a fatal error and terminates the process with the given exit code.
pub fn abort(code: i32) -> ! {
    error!("nlfem aborted with exit code {}", code);
    log::logger().flush();
    std::process::exit(code)
}
