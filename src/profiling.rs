//! Optional CPU profiling via Tracy.
//!
//! Instrumentation is compiled in only with the `profiling` feature:
//!
//! ```bash
//! cargo run --example frame_loop --features profiling
//! ```
//!
//! Without the feature every macro expands to nothing.
//!
//! ```ignore
//! use reflex_render::profiling::{frame_mark, profile_scope};
//!
//! fn record_frame() {
//!     profile_scope!("record_frame");
//!     // ...
//!     frame_mark!();
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, frame_mark as tracy_frame_mark, span};

/// Open a profiling span that ends with the enclosing scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Open a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Profile the enclosing function under its own name.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Profile the enclosing function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Mark the end of a frame for Tracy's frame view.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

pub use frame_mark;
pub use profile_function;
pub use profile_scope;
