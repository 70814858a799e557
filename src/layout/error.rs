use std::any::Any;

/// Failures inside the layout pipeline. None of these reach the caller of
/// `LayoutEngine::generate_layout` as an `Err`; they end up either replaced
/// by the fallback strategy or folded into a `success: false` result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("dagre layout failed: {message}")]
    Dagre { message: String },
    #[error("layout placed {placed} of {expected} nodes")]
    IncompleteLayout { expected: usize, placed: usize },
    #[error("invalid layout config: {0}")]
    InvalidConfig(String),
    #[error("node {node} has a non-finite position or size")]
    NonFiniteGeometry { node: String },
    #[error("layout panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
