//! Input-event entry points for a guest display client.
//!
//! No transport to the running guest exists yet; events are logged and
//! dropped. Display clients are expected to talk VNC directly to the guest
//! in the meantime.

use tracing::debug;

/// Accept a relative mouse movement with a button mask. Log-only.
pub fn send_mouse_event(dx: i32, dy: i32, buttons: i32) {
    debug!(dx, dy, buttons, "mouse event dropped, no transport");
}

/// Accept a key press or release. Log-only.
pub fn send_key_event(key_code: i32, is_down: bool) {
    debug!(key_code, is_down, "key event dropped, no transport");
}
