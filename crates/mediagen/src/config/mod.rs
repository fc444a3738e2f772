pub mod loader;
pub mod schema;

pub use loader::{
    default_config_path, environment_issues, load_config, load_config_from_str, resolve_script,
    validate_config,
};
pub use schema::{
    Config, DatabaseConfig, EngineConfig, PipelineSettings, WorkflowConfig, WorkflowsConfig,
};
