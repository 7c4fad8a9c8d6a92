//! Query analysis subsystem.
//!
//! # Data Flow
//! ```text
//! query text + operationName
//!     → shape.rs (parse, select operation, inline fragments)
//!     → depth.rs (nesting ceiling)
//!     → complexity.rs (weighted cost ceiling)
//!     → introspection.rs (mode gate)
//!     → printer.rs (per-subgraph operation text)
//! ```
//!
//! # Design Decisions
//! - Every analyzer runs on the fragment-free [`QueryShape`], never on raw documents
//! - Analyzers are pure functions; nothing here touches the network

pub mod complexity;
pub mod depth;
pub mod introspection;
pub mod printer;
pub mod shape;

pub use complexity::{check_complexity, ComplexityAnalyzer};
pub use depth::{check_depth, query_depth};
pub use introspection::{check_introspection, is_introspection};
pub use printer::print_operation;
pub use shape::{FieldNode, OperationKind, QueryShape, SelectionNode, VariableDefinition};
