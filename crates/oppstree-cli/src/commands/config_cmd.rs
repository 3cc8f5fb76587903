//! `ost config`: display resolved configuration.
//!
//! ```text
//! ost config show
//! ost config providers
//! ```

use comfy_table::{Table, presets::UTF8_FULL};

use oppstree_llm::{ProviderRouter, builtin_providers, merge_providers};
use oppstree_types::Config;

/// Print the resolved configuration as formatted JSON.
pub fn config_show(config: &Config) {
    match serde_json::to_string_pretty(config) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("error: failed to serialize config: {e}"),
    }
}

/// Print the provider table (built-ins merged with config overrides).
pub fn config_providers(config: &Config) -> anyhow::Result<()> {
    let providers = merge_providers(builtin_providers(), &config.providers)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header([
        "NAME",
        "API",
        "PREFIX",
        "DEFAULT MODEL",
        "BASE URL",
        "KEY ENV",
        "KEY SET",
    ]);
    for p in &providers {
        let key_set = std::env::var(&p.api_key_env).is_ok_and(|v| !v.is_empty());
        table.add_row(vec![
            p.name.clone(),
            format!("{:?}", p.api).to_lowercase(),
            p.model_prefix.clone().unwrap_or_else(|| "-".into()),
            p.default_model.clone().unwrap_or_else(|| "-".into()),
            p.base_url.clone(),
            p.api_key_env.clone(),
            if key_set { "yes" } else { "no" }.to_string(),
        ]);
    }

    println!("{table}");
    match ProviderRouter::from_configs(providers).route(&config.model) {
        Some(route) => println!("  model: {} -> {route:?}", config.model),
        None => println!("  model: {} (no provider)", config.model),
    }
    Ok(())
}
