//! How a strategy workspace's entry point is launched and patched.

use serde::{Deserialize, Serialize};

/// Entry-point launch contract for strategy workspaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryPointConfig {
    /// Entry-point script, relative to the workspace root.
    pub script: String,

    /// Interpreter used to run the script (empty = execute the script directly).
    pub interpreter: String,

    /// Extra interpreter arguments placed before the script path.
    pub interpreter_args: Vec<String>,

    /// Workspace config file the parameters are merged into (`.json`, `.yaml`, `.yml`).
    pub config_file: String,

    /// Section of the config file holding strategy parameters.
    pub parameters_section: String,

    /// Environment variable pointing at the shared data directory.
    pub data_dir_env: String,

    /// Module search path variable the workspace paths are prepended to.
    pub module_path_env: String,

    /// Environment variable set to `1` to ask the entry point to skip validation.
    pub skip_validation_env: String,

    /// Whether assertion statements in the script are neutralised.
    pub patch_assertions: bool,

    /// Keyword that starts an assertion statement.
    pub assertion_keyword: String,

    /// Inert statement that replaces an assertion.
    pub assertion_replacement: String,
}

impl Default for EntryPointConfig {
    fn default() -> Self {
        Self {
            script: "main.py".to_string(),
            interpreter: "python3".to_string(),
            interpreter_args: vec!["-u".to_string()],
            config_file: "config.json".to_string(),
            parameters_section: "parameters".to_string(),
            data_dir_env: "BACKTEST_DATA_DIR".to_string(),
            module_path_env: "PYTHONPATH".to_string(),
            skip_validation_env: "SWEEP_SKIP_VALIDATION".to_string(),
            patch_assertions: true,
            assertion_keyword: "assert".to_string(),
            assertion_replacement: "pass".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_config_default() {
        let config = EntryPointConfig::default();

        assert_eq!(config.script, "main.py");
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.parameters_section, "parameters");
        assert!(config.patch_assertions);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "script: run.sh\ninterpreter: sh\ninterpreter_args: []\n";
        let config: EntryPointConfig = serde_yaml_bw::from_str(yaml).unwrap();

        assert_eq!(config.script, "run.sh");
        assert_eq!(config.interpreter, "sh");
        assert!(config.interpreter_args.is_empty());
        assert_eq!(config.config_file, "config.json");
    }
}
