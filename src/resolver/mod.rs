//! Related Row Resolvers
//!
//! Each relation kind provides a resolver that reads rows of the related
//! table. The orchestrator never sees kind-specific row logic; custom
//! relation names get resolvers through `ResolverRegistry::register_for`.

pub mod framework;
pub mod kinds;

pub use framework::{RelatedRowResolver, ResolverRegistry, default_registry};
pub use kinds::{AttributesResolver, FeatureResolver, MediaResolver, SimpleAttributesResolver, TileResolver};
