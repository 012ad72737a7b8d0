//! Containment of panics raised by device implementations.
//!
//! Device code is treated like a plugin: a panic inside it is captured at the
//! boundary of the update loop and reported through the bridge's log instead
//! of unwinding into the host process.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

/// Captured panic payload, displayed as the panic message when it has one.
///
/// ```
/// use relaybridge::panic::format_panic;
/// assert_eq!(format_panic(Box::new("boom")).to_string(), "boom");
/// assert_eq!(format_panic(Box::new(String::from("boom"))).to_string(), "boom");
/// assert_eq!(format_panic(Box::new(5_u32)).to_string(), "unknown panic payload");
/// ```
#[must_use]
pub struct PanicMessage(Box<dyn Any + Send>);

impl PanicMessage {
    /// Return the message text if the payload carried one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| self.0.downcast_ref::<&'static str>().copied())
    }
}

impl fmt::Display for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("unknown panic payload"))
    }
}

impl fmt::Debug for PanicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicMessage").field(&self.as_str()).finish()
    }
}

/// Wrap a payload obtained from [`std::panic::catch_unwind`].
pub fn format_panic(panic: Box<dyn Any + Send>) -> PanicMessage { PanicMessage(panic) }

/// Run `f`, turning a panic into an error.
///
/// The closure is asserted unwind-safe: callers only use it around code whose
/// shared state stays consistent across a panic (poisoned locks are recovered
/// elsewhere in the crate).
///
/// # Errors
///
/// Returns the captured [`PanicMessage`] if `f` panicked.
pub fn contain<R, F: FnOnce() -> R>(f: F) -> Result<R, PanicMessage> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(format_panic)
}

#[cfg(test)]
mod tests {
    use super::contain;

    #[test]
    fn returns_value_when_closure_completes() {
        assert_eq!(contain(|| 7).ok(), Some(7));
    }

    #[test]
    fn captures_formatted_panic_message() {
        let captured = contain::<(), _>(|| panic!("device fault {}", 3)).expect_err("panicked");
        assert_eq!(captured.as_str(), Some("device fault 3"));
        assert_eq!(captured.to_string(), "device fault 3");
    }
}
