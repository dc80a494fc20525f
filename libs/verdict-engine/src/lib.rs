//! Untrusted code execution and test grading.
//!
//! Layers, leaf first:
//! - [`sandbox`]: one OS process per run, temp source lifecycle, timeouts
//! - [`executor`]: one implementation per language over the sandbox
//! - [`dispatcher`]: language routing and fault isolation
//! - [`evaluator`]: output normalization and per-case verdicts
//! - [`runner`]: sequential suite execution and aggregation
//! - [`suite`]: tolerant parsing of challenge requirements

pub mod dispatcher;
pub mod evaluator;
pub mod executor;
pub mod runner;
pub mod sandbox;
pub mod suite;


pub use dispatcher::Dispatcher;
pub use executor::LanguageExecutor;
pub use runner::TestRunner;

use std::any::Any;

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
