//! Per-hook diagnostics, gated by an environment variable.
//!
//! Grounded on `tinymist-vfs`'s `TraceAccessModel`, which wraps an access
//! model purely to log each access; here the wrapping is a free function
//! called from the hooks themselves, since there is only ever one "access
//! model" installed at a time.

use std::sync::OnceLock;

/// The environment variable consulted for this subsystem's debug token,
/// following the `NODE_DEBUG`-style convention named in `spec.md` §6.
pub const DEBUG_ENV_VAR: &str = "SNAPSHOT_FS_DEBUG";

/// The token that must appear (comma-separated) in `DEBUG_ENV_VAR` to enable
/// tracing.
const DEBUG_TOKEN: &str = "snapshot-fs";

fn debug_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(DEBUG_ENV_VAR)
            .map(|val| val.split(',').any(|tok| tok.trim() == DEBUG_TOKEN))
            .unwrap_or(false)
    })
}

/// Emits a one-line diagnostic for a hook invocation, when enabled.
///
/// `input` is the path/argument as the host runtime passed it; `translated`
/// is its virtual-root form, if any translation applied.
pub fn trace_hook(hook: &str, input: &str, translated: Option<&str>) {
    if !debug_enabled() {
        return;
    }

    match translated {
        Some(translated) => log::trace!("[snapshot-fs] {hook}: {input} -> {translated}"),
        None => log::trace!("[snapshot-fs] {hook}: {input}"),
    }
}
