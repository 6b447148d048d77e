//! Payee directory with a name filter

use super::{non_empty, parse_arguments, Function, FunctionError, DATE_FORMAT};
use crate::ledger::{Ledger, Payee};
use crate::schema::ParamSpec;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ListPayees {
    ledger: Ledger,
}

impl ListPayees {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListPayeesInput {
    #[serde(default)]
    name_filter: Option<String>,
}

#[async_trait]
impl Function for ListPayees {
    fn name(&self) -> &str {
        "list_payees"
    }

    fn description(&self) -> &str {
        "List all registered payees that payments can be sent to"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("name_filter").describe("Filter payees by name (partial match)")]
    }

    fn activity(&self) -> &str {
        "listing payees"
    }

    async fn call(&self, raw_arguments: &str) -> Result<Value, FunctionError> {
        let input: ListPayeesInput = parse_arguments(raw_arguments)?;
        let needle = non_empty(input.name_filter.as_ref()).map(str::to_lowercase);

        let payees: Vec<Payee> = self
            .ledger
            .list_payees()
            .into_iter()
            .filter(|p| {
                needle
                    .as_deref()
                    .map_or(true, |n| p.name.to_lowercase().contains(n))
            })
            .collect();

        Ok(json!({
            "payees": payees.iter().map(|p| json!({
                "id": p.id,
                "name": p.name,
                "account_number": p.account_number,
                "routing_number": p.routing_number,
                "email": p.email,
                "phone": p.phone,
                "created_date": p.created_date.format(DATE_FORMAT).to_string(),
            })).collect::<Vec<_>>(),
            "total_payees": payees.len(),
            "filter_applied": input.name_filter,
        }))
    }
}
