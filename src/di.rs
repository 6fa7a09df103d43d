//! Dependency resolution from the application [`Context`](crate::context::Context).
//!
//! Services and shared handles implement `FromRef<Context>` so handlers can
//! ask for exactly what they need:
//!
//! ```ignore
//! let graph = ctx.resolve::<GraphService>();
//! ```

/// Extracts a value from a reference to `T`.
pub trait FromRef<T> {
    fn from_ref(input: &T) -> Self;
}

impl<T: Clone> FromRef<T> for T {
    fn from_ref(input: &T) -> Self {
        input.clone()
    }
}
