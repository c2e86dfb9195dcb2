//! Entity registry and function-call validators
//!
//! Entities are registered once at startup. Each one owns its column schema,
//! the function names it permits and optional per-function validators.

mod allow_list;
mod entity;
mod registry;
mod signature;
mod validation;

pub use allow_list::AllowedFunctionsValidator;
pub use entity::{Entity, EntityBuilder, JoinRelationship};
pub use registry::{EntityRegistry, RegistryBuilder, RegistryError};
pub use signature::{ParamType, SignatureValidator};
pub use validation::{FunctionCallValidator, InvalidFunctionCall, SchemaScope};
