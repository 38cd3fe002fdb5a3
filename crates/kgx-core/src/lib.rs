//! kgx: streaming knowledge-graph transformation engine.
//!
//! Knowledge graphs of typed nodes and typed, attributed edges are read
//! from a [`Source`], filtered, optionally accumulated in a [`GraphStore`],
//! and written to a [`Sink`]. Formats plug in through the [`Format`] trait
//! and are looked up by tag in a [`Registry`].

mod category;
mod config;
mod error;
mod filter;
mod format;
mod io;
mod prefix;
mod record;
mod registry;
mod store;
mod transformer;
mod types;
mod value;

pub use category::{CategoryLookup, StaticCategoryLookup};
pub use config::{RdfOptions, TabularOptions, TransformConfig, TransformContext};
pub use error::{KgxError, ReferentialWarning};
pub use filter::{FilterSet, matches};
pub use format::{Compression, Format, FormatDecl, InputSpec, OutputSpec};
pub use io::{ChainSource, IterSource, Sink, Source, VecSink, read_all};
pub use prefix::{BIOLINK, PrefixMap, RDF, XSD, is_absolute_iri};
pub use record::{
    Attributes, DEFAULT_CATEGORY, DEFAULT_PREDICATE, EDGE_CORE_FIELDS, Edge, EdgeView,
    MULTIVALUED_PROPERTIES, NODE_CORE_FIELDS, Node, Record, is_multivalued, normalize_multivalued,
};
pub use registry::Registry;
pub use store::GraphStore;
pub use transformer::{Inspector, TransformStats, Transformer};
pub use types::{PropertyType, PropertyTypeMap};
pub use value::{Properties, PropertiesExt, Value};
