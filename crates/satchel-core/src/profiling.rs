//! Profiling utilities based on the `puffin` crate.

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

#[cfg(feature = "profiling")]
use std::sync::OnceLock;

/// Address the puffin HTTP server binds to by default.
pub const DEFAULT_PROFILING_ADDR: &str = "0.0.0.0:8585";

/// Global profiling server instance.
#[cfg(feature = "profiling")]
static PROFILING_SERVER: OnceLock<puffin_http::Server> = OnceLock::new();

/// Enable puffin scopes and serve them over HTTP on `addr`.
///
/// Connect `puffin_viewer` to the address to inspect load and packing times.
///
/// # Example
/// ```no_run
/// use satchel_core::profiling::{init_profiling, DEFAULT_PROFILING_ADDR};
///
/// init_profiling(DEFAULT_PROFILING_ADDR);
/// ```
#[cfg(feature = "profiling")]
pub fn init_profiling(addr: &str) {
    puffin::set_scopes_on(true);

    match puffin_http::Server::new(addr) {
        Ok(server) => {
            tracing::info!("Puffin profiler server started on http://{}", addr);
            // Keep the server alive for the rest of the process
            let _ = PROFILING_SERVER.set(server);
        }
        Err(e) => {
            tracing::error!("Failed to start puffin server: {}", e);
        }
    }
}

/// Mark a frame boundary. The converter calls this once per packed file.
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}
