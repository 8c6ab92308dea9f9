//! Cross-platform time utilities.
//!
//! Certificate validity is expressed in whole seconds since the unix epoch;
//! these helpers produce that value on both native and WASM targets.

pub use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current system time.
#[cfg(not(target_arch = "wasm32"))]
pub fn now() -> SystemTime {
    SystemTime::now()
}

/// Returns the current system time.
#[cfg(target_arch = "wasm32")]
pub fn now() -> SystemTime {
    use web_time::web::SystemTimeExt;
    web_time::SystemTime::now().to_std()
}

/// Returns the current time as whole seconds since the unix epoch.
///
/// A clock set before the epoch reads as `0`.
pub fn unix_now() -> u64 {
    now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_returns_reasonable_timestamp() {
        // 2020-01-01T00:00:00Z
        assert!(unix_now() > 1_577_836_800);
    }

    #[test]
    fn it_truncates_to_whole_seconds() {
        let before = now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let seconds = unix_now();
        assert!(seconds >= before && seconds - before <= 1);
    }
}
