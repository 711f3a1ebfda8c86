//! Natural language query understanding for mesh analysis.
//!
//! Turns free-form requests such as "测量体积" or "select all holes over 10mm"
//! into a [`ParsedQuery`]: an intent, a query type, the geometric entities that
//! were mentioned and numeric constraints normalized to millimeters.

pub mod command;
pub mod entities;
pub mod error;
pub mod intent;
pub mod models;
pub mod parser;
pub mod units;

pub use command::render_command;
pub use entities::{EntityExtractor, EntityKeywords};
pub use error::{NlqError, Result};
pub use intent::{IntentClassifier, PatternRule};
pub use models::{
    ConstraintFamily, ConstraintRole, Entity, GeometricEntity, Intent, ParsedQuery, QueryType,
    RawConstraintMatch, PARAM_MAX_VALUE, PARAM_MIN_VALUE, PARAM_TARGET_VALUE,
};
pub use parser::QueryParser;
pub use units::{normalize, UnitNormalizer};
