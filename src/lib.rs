// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Managed Delivery
//!
//! Tooling for Spinnaker managed delivery configs.
//!
//! ## Overview
//!
//! A delivery config is a YAML file describing an application's artifacts and
//! the environments its resources are deployed to. This crate lets you:
//!
//! - Load, edit and save the config without losing comments or unknown keys
//! - Export deployed resources and their artifacts into the config
//! - Diff, validate, plan, publish and delete the config through the API
//!
//! ## Architecture
//!
//! The config is held twice and every edit updates both copies:
//!
//! 1. **Typed view**: [`model::DeliveryConfig`], used for lookups
//! 2. **Raw tree**: [`document::Document`], which keeps formatting and is
//!    what gets written back
//! 3. **Processor**: [`processor::DeliveryConfigProcessor`] owns both and
//!    talks to the API through [`spinnaker::SpinnakerClient`]
//!
//! ## Modules
//!
//! - [`document`]: Comment-preserving YAML tree, emitter and key ordering
//! - [`model`]: Typed delivery config and API documents
//! - [`processor`]: Loading, editing, saving and remote operations
//! - [`spinnaker`]: API client, transport and resource discovery
//! - [`export`]: Export of deployed resources into the config
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! name: myapp-manifest
//! application: myapp
//! artifacts:
//!   - name: myapp
//!     type: docker
//!     tagVersionStrategy: semver-tag
//! environments:
//!   - name: testing
//!     resources:
//!       - kind: titus/cluster@v1 # myapp-test/test
//!         spec:
//!           moniker:
//!             app: myapp
//!             stack: test
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod document;
pub mod error;
pub mod export;
pub mod model;
pub mod processor;
pub mod spinnaker;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use document::Document;
pub use error::{DeliveryError, DocumentError, RemoteError, Result};
pub use export::{ExportOptions, ExportSummary, export_application};
pub use model::{DeliveryArtifact, DeliveryConfig, DeliveryResource, ResourceIdentity};
pub use processor::{DeliveryConfigProcessor, ProcessorConfig};
pub use spinnaker::{ClientSettings, SpinnakerClient, Transport};
