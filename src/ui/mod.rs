//! Terminal UI rendering using ratatui.
//!
//! This module contains the in-terminal renderer driven by the engine and
//! the view-specific rendering logic. Each view is implemented in its own
//! submodule with a `render` function.
//!
//! ## Submodules
//!
//! - [`graph`]: [`TuiGraph`], the renderer the engine reconciles into
//! - [`services`]: Table of every service in layout order with health tier
//! - [`dependencies`]: Table of call relationships, worst first
//! - [`flow`]: Caller/callee matrix coloured by call health
//! - [`detail`]: Detail panel and its modal overlay
//! - [`common`]: Shared components (header, tabs, status bar, help overlay)
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Rendering Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (common::render_header)       │
//! ├──────────────────────────────────────┤
//! │ Tabs (common::render_tabs)           │
//! ├──────────────────────────────────────┤
//! │                                      │
//! │ View Content                         │
//! │ (services/dependencies/flow::render) │
//! │                                      │
//! ├──────────────────────────────────────┤
//! │ Status Bar (common::render_status)   │
//! └──────────────────────────────────────┘
//!         ↑
//!    Overlays rendered on top:
//!    - detail::render_overlay
//!    - common::render_help
//! ```

pub mod common;
pub mod dependencies;
pub mod detail;
pub mod flow;
pub mod graph;
pub mod services;
pub mod theme;

pub use dependencies::DependencySortColumn;
pub use detail::DetailPane;
pub use graph::TuiGraph;
pub use theme::Theme;
