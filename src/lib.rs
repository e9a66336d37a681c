//! # depviz
//!
//! A live service-dependency graph viewer and library.
//!
//! Snapshots of a call graph (services with call and error counts, and the
//! call relationships between them) arrive from a data source, are classified
//! into health tiers and reconciled incrementally into a renderer so that
//! unchanged elements keep their place between refreshes.
//!
//! ## Architecture
//!
//! ```text
//!   source ──poll──▶ GraphSnapshot
//!                         │
//!                         ▼
//!                  data::project()  ── classify() per element
//!                         │
//!                         ▼
//!               GraphEngine::reconcile() ──▶ TuiGraph (add/update/remove, layout)
//!                         │
//!                         ▼
//!               SelectionBridge::refresh() ──▶ DetailPane
//! ```
//!
//! - **[`source`]**: Data source abstraction ([`DataSource`] trait) and transports
//! - **[`data`]**: Health classification, projection into visual elements,
//!   span aggregation and history for sparklines
//! - **[`engine`]**: [`GraphEngine`] reconciliation and the selection/detail bridge
//! - **[`ui`]**: Terminal rendering using ratatui
//! - **[`app`]**, **[`events`]**: Application state and input handling
//! - **[`settings`]**, **[`logging`]**, **[`export`]**: Configuration, diagnostics and JSON export
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch a JSON snapshot file
//! depviz --file graph.json
//!
//! # Poll a collector over HTTP
//! depviz --url http://localhost:8080
//!
//! # Receive pushed snapshots over WebSocket
//! depviz --ws ws://localhost:8080/ws
//! ```
//!
//! ### As a library
//!
//! ```
//! use depviz::{GraphEngine, GraphSnapshot, TuiGraph};
//!
//! let snapshot: GraphSnapshot = serde_json::from_str(
//!     r#"{"nodes":[{"name":"svc-a","call_count":100,"error_count":0}],"edges":[]}"#,
//! ).unwrap();
//!
//! let mut engine = GraphEngine::new(TuiGraph::new());
//! let report = engine.apply_snapshot(&snapshot);
//! assert_eq!(report.added.len(), 1);
//! ```
//!
//! ### With a stream source (TCP, etc.)
//!
//! ```no_run
//! use std::io::Cursor;
//! use depviz::StreamSource;
//!
//! # tokio_test::block_on(async {
//! // Example with a cursor (in practice, use TcpStream)
//! let data = b"{\"nodes\":[],\"edges\":[]}\n";
//! let source = StreamSource::spawn(Cursor::new(data.to_vec()), "example");
//! # });
//! ```

pub mod app;
pub mod data;
pub mod engine;
pub mod events;
pub mod export;
pub mod logging;
pub mod settings;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use data::{classify, project, ElementId, HealthTier, VisualElement};
pub use engine::{GraphEngine, GraphRenderer, LayoutPolicy, SelectionBridge, TapTarget};
pub use source::{
    ChannelSource, ConnectionStatus, DataSource, FileSource, GraphSnapshot, HttpSource,
    SpanReplaySource, StreamSource, WebSocketSource,
};
pub use ui::TuiGraph;
