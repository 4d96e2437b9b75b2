use colored::Colorize;

use acton_service::classifier::{Classification, Router as ClassifierRouter};
use acton_service::prelude::Config;
use acton_service::registry;

use crate::error::CliError;

/// Classify free text against the configured registry and print the
/// resolved `(org, service)` target, without dispatching it anywhere.
pub async fn execute(config_path: Option<&str>, text: &str) -> Result<(), CliError> {
    let config = Config::load(config_path)?;
    let source = std::fs::read_to_string(&config.registry.path).map_err(|e| {
        CliError::Config(format!(
            "failed to read registry file {}: {e}",
            config.registry.path.display()
        ))
    })?;
    let registry = registry::parse(&source)?;

    let classifier = ClassifierRouter::new();
    let classification = classifier.classify(&registry, text);

    let branch = match &classification {
        Classification::ByRule { rule_pattern, .. } => format!("rule match ({rule_pattern})"),
        Classification::ByScore { category, .. } => format!("keyword score ({category})"),
        Classification::Fallback => "fallback".to_string(),
    };

    println!(
        "{} {}/{}  {}",
        "→".blue().bold(),
        classification.org().cyan().bold(),
        classification.service().cyan().bold(),
        format!("confidence={:.2} via {branch}", classification.confidence()).dimmed(),
    );

    Ok(())
}
