//! Registries: admin-defined record collections and the lookup across them.

pub mod resolver;
pub mod schema;

pub use resolver::{RegistryResolver, ResolveError, ResolvedRecord};
pub use schema::{FieldType, RegistrySchema, SchemaError, SchemaField};
