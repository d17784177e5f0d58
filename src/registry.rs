use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use displaydoc::Display;
use thiserror::Error;

use crate::contract::ContractHandle;
use crate::contracts;
use crate::schema::AbiSchema;
use crate::transport::Transport;

/// Represents errors raised by the schema registry.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Schema `{0}` is already registered
    Duplicate(String),
    /// No schema registered under `{0}`
    NotFound(String),
}

/// Schemas by name. A plain value: callers own and pass it around.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<AbiSchema>>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in contract schema.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for schema in contracts::all() {
            registry
                .schemas
                .insert(schema.name().to_string(), schema);
        }
        registry
    }

    /// Registers `schema` under its name.
    pub fn register(&mut self, schema: Arc<AbiSchema>) -> Result<(), Error> {
        let name = schema.name().to_string();
        if self.schemas.contains_key(&name) {
            return Err(Error::Duplicate(name));
        }
        log::debug!("Registered schema {name} v{}", schema.version());
        self.schemas.insert(name, schema);
        Ok(())
    }

    /// The schema registered as `name`.
    pub fn get(&self, name: &str) -> Result<Arc<AbiSchema>, Error> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Binds the schema registered as `name` to `address`.
    pub fn handle(
        &self,
        name: &str,
        address: Address,
        transport: Arc<dyn Transport>,
    ) -> Result<ContractHandle, Error> {
        Ok(ContractHandle::new(self.get(name)?, address, transport))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schema is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
