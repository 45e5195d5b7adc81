//! Statement routing: sharding value extraction, engine selection and the
//! route context the rewriter consumes.

pub mod context;
pub mod engine;
pub mod extractor;
pub mod factory;
pub mod hint;
pub mod value;

pub use context::{RouteContext, RouteMapper, RouteUnit};
pub use engine::{RouteEngine, RouteInput};
pub use extractor::{Extracted, ShardingValueExtractor};
pub use hint::HintValueContext;
pub use value::{ColumnValues, ShardingValue, ValueRange};

use crate::error::ShardResult;
use crate::rule::ShardingRule;
use crate::statement::SqlStatementContext;
use serde_json::Value;
use tracing::debug;

/// Route a bound statement against one rule snapshot.
pub fn route(
    context: &SqlStatementContext,
    rule: &ShardingRule,
    parameters: &[Value],
    hint: &HintValueContext,
) -> ShardResult<RouteContext> {
    let input = RouteInput {
        context,
        rule,
        parameters,
        hint,
    };
    let engine = factory::new_route_engine(&input)?;
    debug!("Routing with {} engine", engine.name());
    engine.route(&input)
}
