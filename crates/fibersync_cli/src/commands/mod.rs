//! CLI command implementations.

pub mod entities;
pub mod inspect;
pub mod status;
pub mod sync;

use fibersync_engine::StrategyRegistry;
use std::path::Path;

/// Loads a registry file, or the built-in dashboard registry.
pub fn load_registry(path: Option<&Path>) -> Result<StrategyRegistry, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read registry {}: {e}", path.display()))?;
            Ok(StrategyRegistry::from_json(&json)?)
        }
        None => Ok(StrategyRegistry::dashboard_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn registry_defaults_to_dashboard() {
        let registry = load_registry(None).unwrap();
        assert!(registry.contains("v_audit_logs"));
    }

    #[test]
    fn registry_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"name": "nodes", "strategy": "full"}}]"#).unwrap();

        let registry = load_registry(Some(file.path())).unwrap();
        assert_eq!(registry.entities(), vec!["nodes"]);
    }

    #[test]
    fn missing_registry_file_is_an_error() {
        let err = load_registry(Some(Path::new("/nonexistent/registry.json"))).unwrap_err();
        assert!(err.to_string().contains("Cannot read registry"));
    }
}
