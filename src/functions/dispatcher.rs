//! Name-to-function dispatch

use super::{FunctionError, FunctionOutput, FunctionRegistry};
use crate::schema::FunctionDescriptor;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Executes registered functions by name; every outcome becomes result text
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }

    pub fn descriptors(&self) -> Arc<[FunctionDescriptor]> {
        self.registry.descriptors()
    }

    /// Run `name` against raw argument JSON
    pub async fn execute(&self, name: &str, raw_arguments: &str) -> FunctionOutput {
        let Some(function) = self.registry.get(name) else {
            tracing::warn!(name, "Unknown function requested");
            return FunctionOutput::error(FunctionError::NotFound(name.to_string()).to_string());
        };

        let started = Instant::now();
        let outcome = AssertUnwindSafe(function.invoke(raw_arguments))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis();

        match outcome {
            Ok(output) => {
                if output.success {
                    tracing::debug!(name, elapsed_ms = %elapsed_ms, "Function succeeded");
                } else {
                    tracing::warn!(name, elapsed_ms = %elapsed_ms, output = %output.output, "Function reported failure");
                }
                output
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(name, elapsed_ms = %elapsed_ms, reason = %reason, "Function panicked");
                FunctionOutput::error(format!("Error executing {name}: {reason}"))
            }
        }
    }

    /// Result text only
    pub async fn dispatch(&self, name: &str, raw_arguments: &str) -> String {
        self.execute(name, raw_arguments).await.output
    }
}
