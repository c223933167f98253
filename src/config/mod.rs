pub mod rules;
pub mod workflow_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

#[cfg(feature = "cli")]
mod cli {
    use crate::utils::error::Result;
    use crate::utils::validation::{validate_path, Validate};
    use clap::Parser;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, Parser)]
    #[command(name = "tabflow")]
    #[command(about = "Run a tabular data workflow from a TOML definition")]
    pub struct CliConfig {
        #[arg(long, short, default_value = "workflow.toml")]
        pub config: String,

        #[arg(long, help = "Override engine.data_dir")]
        pub data_dir: Option<String>,

        #[arg(long, short, help = "Write the result history here instead of stdout")]
        pub output: Option<String>,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, help = "Emit logs as JSON lines")]
        pub json_logs: bool,
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validate_path("config", &self.config)?;
            if let Some(dir) = &self.data_dir {
                validate_path("data_dir", dir)?;
            }
            if let Some(output) = &self.output {
                validate_path("output", output)?;
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_arguments() {
            let config = CliConfig::parse_from([
                "tabflow",
                "--config",
                "q3.toml",
                "--data-dir",
                "./uploads",
                "-o",
                "results.json",
                "--verbose",
            ]);
            assert_eq!(config.config, "q3.toml");
            assert_eq!(config.data_dir.as_deref(), Some("./uploads"));
            assert_eq!(config.output.as_deref(), Some("results.json"));
            assert!(config.verbose);
            assert!(!config.json_logs);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_defaults() {
            let config = CliConfig::parse_from(["tabflow"]);
            assert_eq!(config.config, "workflow.toml");
            assert!(config.data_dir.is_none());
        }
    }
}
