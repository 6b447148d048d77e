//! Function discovery and lookup
//!
//! Discovery walks an ordered list of [`FunctionSource`]s. Each source hands
//! back registrations: a declared name, an enabled flag and a factory that
//! builds the function against the shared [`FunctionContext`]. Bad
//! candidates are logged and skipped; only a name clash under
//! [`DuplicatePolicy::Reject`] stops discovery.

use super::{
    Function, FunctionContext, FunctionError, GetAccountBalance, ListAccounts, ListPayees,
    ListTransactions, MakePayment, TransferFunds,
};
use crate::schema::FunctionDescriptor;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Builds a function against the shared context
pub type Factory =
    Box<dyn Fn(&FunctionContext) -> Result<Arc<dyn Function>, FunctionError> + Send + Sync>;

/// One candidate offered by a [`FunctionSource`]
pub struct Registration {
    pub name: String,
    pub enabled: bool,
    pub factory: Factory,
}

impl Registration {
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(&FunctionContext) -> Result<Arc<dyn Function>, FunctionError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            factory: Box::new(factory),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Somewhere functions come from: the compiled-in set or a loadable unit
pub trait FunctionSource: Send + Sync {
    /// Name used in logs
    fn label(&self) -> &str;

    fn registrations(&self) -> Result<Vec<Registration>, DiscoveryError>;
}

/// The compiled-in banking functions
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSource;

impl FunctionSource for BuiltinSource {
    fn label(&self) -> &str {
        "builtin"
    }

    fn registrations(&self) -> Result<Vec<Registration>, DiscoveryError> {
        Ok(vec![
            Registration::new("list_accounts", |ctx| {
                Ok(Arc::new(ListAccounts::new(ctx.ledger().clone())))
            }),
            Registration::new("get_account_balance", |ctx| {
                Ok(Arc::new(GetAccountBalance::new(ctx.ledger().clone())))
            }),
            Registration::new("list_payees", |ctx| {
                Ok(Arc::new(ListPayees::new(ctx.ledger().clone())))
            }),
            Registration::new("list_transactions", |ctx| {
                Ok(Arc::new(ListTransactions::new(ctx.ledger().clone())))
            }),
            Registration::new("make_payment", |ctx| {
                Ok(Arc::new(MakePayment::new(ctx.ledger().clone())))
            }),
            Registration::new("transfer_funds", |ctx| {
                Ok(Arc::new(TransferFunds::new(ctx.ledger().clone())))
            }),
        ])
    }
}

/// What to do when two candidates declare the same name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail discovery
    #[default]
    Reject,
    /// Later candidate wins; logged
    Replace,
}

impl DuplicatePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(DuplicatePolicy::Reject),
            "replace" => Some(DuplicatePolicy::Replace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    pub duplicates: DuplicatePolicy,
    /// Names to skip even when their registration is enabled
    pub disabled: HashSet<String>,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("function {0:?} is registered more than once")]
    DuplicateName(String),
    #[error("function source {label} failed: {reason}")]
    Source { label: String, reason: String },
}

/// Read-only set of discovered functions
pub struct FunctionRegistry {
    functions: Vec<Arc<dyn Function>>,
    descriptors: Arc<[FunctionDescriptor]>,
    index: HashMap<String, usize>,
}

impl FunctionRegistry {
    /// Discover from the compiled-in set only
    pub fn builtin(
        context: &FunctionContext,
        options: &DiscoveryOptions,
    ) -> Result<Self, DiscoveryError> {
        Self::discover(&[&BuiltinSource], context, options)
    }

    pub fn discover(
        sources: &[&dyn FunctionSource],
        context: &FunctionContext,
        options: &DiscoveryOptions,
    ) -> Result<Self, DiscoveryError> {
        let mut functions: Vec<Arc<dyn Function>> = Vec::new();
        let mut descriptors: Vec<FunctionDescriptor> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for source in sources {
            let registrations = match source.registrations() {
                Ok(registrations) => registrations,
                Err(e) => {
                    tracing::warn!(source = source.label(), error = %e, "Skipping function source");
                    continue;
                }
            };

            for registration in registrations {
                if !registration.enabled || options.disabled.contains(&registration.name) {
                    tracing::debug!(name = %registration.name, "Function disabled");
                    continue;
                }

                let function = match (registration.factory)(context) {
                    Ok(function) => function,
                    Err(e) => {
                        tracing::warn!(name = %registration.name, error = %e, "Function failed to instantiate");
                        continue;
                    }
                };
                let descriptor = match function.descriptor() {
                    Ok(descriptor) => descriptor,
                    Err(e) => {
                        tracing::warn!(name = %registration.name, error = %e, "Function descriptor rejected");
                        continue;
                    }
                };

                match index.get(&descriptor.name) {
                    Some(&slot) => match options.duplicates {
                        DuplicatePolicy::Reject => {
                            return Err(DiscoveryError::DuplicateName(descriptor.name));
                        }
                        DuplicatePolicy::Replace => {
                            tracing::warn!(name = %descriptor.name, source = source.label(), "Replacing previously registered function");
                            functions[slot] = function;
                            descriptors[slot] = descriptor;
                        }
                    },
                    None => {
                        index.insert(descriptor.name.clone(), functions.len());
                        functions.push(function);
                        descriptors.push(descriptor);
                    }
                }
            }
        }

        tracing::info!(
            count = functions.len(),
            names = ?descriptors.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            "Functions discovered"
        );

        Ok(Self {
            functions,
            descriptors: descriptors.into(),
            index,
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.index.get(name).map(|&slot| self.functions[slot].clone())
    }

    /// Descriptors in discovery order; shared, never copied per request
    pub fn descriptors(&self) -> Arc<[FunctionDescriptor]> {
        self.descriptors.clone()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
