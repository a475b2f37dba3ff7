use super::Config;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File names searched for, in order.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["testservices.yaml", "testservices.yml"];

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Find config file starting from current directory
    pub fn find_config_file(&self) -> Result<PathBuf> {
        let current_dir = std::env::current_dir()?;
        Self::find_config_in_dir(&current_dir)
    }

    pub fn find_config_in_dir(dir: &Path) -> Result<PathBuf> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Ok(path);
            }
        }

        // Try parent directory
        if let Some(parent) = dir.parent() {
            return Self::find_config_in_dir(parent);
        }

        Err(Error::Config(
            "Could not find testservices.yaml in current directory or any parent".to_string(),
        ))
    }

    /// Load config from file path
    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<Config> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config = self.parse_config(&content)?;
        tracing::debug!(
            "Loaded {} need(s) from {}",
            config.needs.len(),
            path.as_ref().display()
        );
        Ok(config)
    }

    /// Parse config from YAML string
    pub fn parse_config(&self, content: &str) -> Result<Config> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| Error::Parse(format!("Failed to parse YAML config: {}", e)))?;

        Ok(config)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CandidateConfig;

    #[test]
    fn test_parse_simple_config() {
        let yaml = r#"
name: shop
needs:
  postgres:
    - env:
        name: ci-postgres
        preset: postgres
    - container:
        name: pg-test
        preset: postgres
        ports: ["5432"]
  redis:
    - container:
        name: redis-test
        image: redis:7
        ready_port: 6379
"#;

        let parser = Parser::new();
        let config = parser.parse_config(yaml).unwrap();

        assert_eq!(config.name.as_deref(), Some("shop"));
        assert_eq!(config.need_names(), vec!["postgres", "redis"]);

        let postgres = config.candidates("postgres").unwrap();
        assert_eq!(postgres.len(), 2);
        assert!(matches!(&postgres[0], CandidateConfig::Env { env } if env.name == "ci-postgres"));
        match &postgres[1] {
            CandidateConfig::Container { container } => {
                assert_eq!(container.name, "pg-test");
                assert_eq!(container.ports, vec!["5432".to_string()]);
            }
            other => panic!("expected container candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_candidate_kind() {
        let yaml = r#"
needs:
  postgres:
    - process:
        name: pg
"#;
        assert!(matches!(
            Parser::new().parse_config(yaml),
            Err(Error::Parse(_))
        ));
    }
}
