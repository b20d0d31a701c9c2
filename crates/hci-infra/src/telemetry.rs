//! Operation log for mutating calls against the compute provider.

use std::fmt;

use tracing::{error, info};

use crate::types::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateOrUpdate,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateOrUpdate => "CreateOrUpdate",
            Self::Delete => "Delete",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    VirtualMachine,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::VirtualMachine => "VirtualMachine",
        })
    }
}

/// Record the outcome of one provider operation against `name`.
pub fn write_operation_log<E: fmt::Display>(
    scope: &Scope,
    operation: Operation,
    resource_type: ResourceType,
    name: &str,
    err: Option<&E>,
) {
    let owner = scope.owner();
    let resource = scope.resource_name(name);
    match err {
        Some(e) => error!(
            %operation,
            %owner,
            %resource_type,
            %resource,
            error = %e,
            "moc operation failed"
        ),
        None => info!(%operation, %owner, %resource_type, %resource, "moc operation succeeded"),
    }
}
