//! Entities command implementation.

use fibersync_engine::StrategyRegistry;
use std::path::Path;

/// Runs the entities command.
pub fn run(registry: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let registry = super::load_registry(registry)?;

    println!("{:<32} {:<12} {:<20} {:<24} RELATED", "ENTITY", "STRATEGY", "CURSOR", "KEY");
    for line in describe(&registry) {
        println!("{line}");
    }
    println!();
    println!("{} entities", registry.len());
    Ok(())
}

fn describe(registry: &StrategyRegistry) -> Vec<String> {
    registry
        .iter()
        .map(|(name, config)| {
            format!(
                "{:<32} {:<12} {:<20} {:<24} {}",
                name,
                config.strategy.to_string(),
                config.strategy.timestamp_column().unwrap_or("-"),
                config.key.to_string(),
                config.related_table.as_deref().unwrap_or("-")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_each_entity_in_order() {
        let registry = StrategyRegistry::builder()
            .incremental("v_audit_logs", "created_at")
            .full("nodes")
            .build();

        let lines = describe(&registry);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("v_audit_logs"));
        assert!(lines[0].contains("created_at"));
        assert!(lines[1].starts_with("nodes"));
    }
}
