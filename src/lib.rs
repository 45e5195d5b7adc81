pub mod config;
pub mod error;
pub mod execution;
pub mod kernel;
pub mod rewrite;
pub mod route;
pub mod rule;
pub mod statement;

pub use config::{RouterConfig, RouterProps};
pub use error::{ErrorKind, ShardError, ShardResult};
pub use execution::{ExecutionContext, ExecutionUnit, SqlUnit};
pub use kernel::ShardingKernel;
pub use route::{HintValueContext, RouteContext, RouteMapper, RouteUnit};
pub use rule::{DataNode, RuleStore, ShardingRule, ShardingStrategy, TableRule};
pub use statement::{bind, SqlStatementContext};
