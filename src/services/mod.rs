pub mod handle;
pub mod reconciler;

pub use handle::CartHandle;
pub use reconciler::{AuthState, CartReconciler, CartReconcilerBuilder, OperationFlags};
