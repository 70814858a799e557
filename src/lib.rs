//! Automatic layout for node/edge diagrams.
//!
//! [`LayoutEngine`] turns a graph plus a diagram-type tag into positioned
//! nodes, routed edges and bounds. Two node boxes never come closer than the
//! configured overlap margin.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{LayoutConfig, LayoutConfigPatch, load_config};
pub use ir::{DiagramType, Edge, Graph, Node, RankDirection};
pub use layout::{DiagramLayout, EngineMode, LayoutEngine, LayoutError, LayoutResult};
