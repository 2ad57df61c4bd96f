//! Resource REST: CRUD and search endpoints derived from a declared data model. Each request
//! runs a staged pipeline; list requests resolve search terms across the association graph.

pub mod case;
pub mod config;
pub mod controllers;
pub mod error;
pub mod graph;
pub mod handlers;
pub mod pipeline;
pub mod response;
pub mod routes;
pub mod search;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_path, resolve, Action, FullConfig, ResolvedModel, ResourceDescriptor, Settings};
pub use controllers::{Controller, ResourceScope};
pub use error::{AppError, ConfigError, DataError};
pub use graph::{AssociationEdge, AssociationGraph, Cardinality};
pub use pipeline::{Context, Flow, Pipeline, RequestView, Stage};
pub use response::{error_body, ResponseSink};
pub use routes::{common_routes, resource_routes};
pub use state::AppState;
pub use store::{DataStore, FindQuery, Instance, MemoryStore, PgStore};
