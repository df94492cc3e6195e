//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use qline_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "base_url": config.base_url,
                    "data_dir": config.data_dir,
                    "log_file": config.log_file,
                    "reconnect_initial_secs": config.reconnect_initial_secs,
                    "reconnect_max_secs": config.reconnect_max_secs,
                    "utc_offset_minutes": config.utc_offset_minutes
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.base_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  base_url:               {}", config.base_url);
            println!("  data_dir:               {}", config.data_dir.display());
            println!(
                "  log_file:               {}",
                config.log_path().display()
            );
            println!(
                "  reconnect_initial_secs: {}",
                config.reconnect_initial_secs
            );
            println!("  reconnect_max_secs:     {}", config.reconnect_max_secs);
            println!(
                "  utc_offset_minutes:     {}",
                config
                    .utc_offset_minutes
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "(system local)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: &str,
    value: &str,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, key, value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Validate and assign one key
fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";

    match key {
        "base_url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                bail!("base_url must start with http:// or https://");
            }
            config.base_url = value.trim_end_matches('/').to_string();
        }
        "data_dir" => {
            config.data_dir = value.into();
        }
        "log_file" => {
            config.log_file = if unset { None } else { Some(value.into()) };
        }
        "reconnect_initial_secs" => {
            config.reconnect_initial_secs = parse_secs(key, value)?;
        }
        "reconnect_max_secs" => {
            config.reconnect_max_secs = parse_secs(key, value)?;
        }
        "utc_offset_minutes" => {
            config.utc_offset_minutes = if unset {
                None
            } else {
                let minutes: i32 = value
                    .parse()
                    .context("Invalid value for utc_offset_minutes. Use minutes east of UTC.")?;
                if minutes.abs() >= 24 * 60 {
                    bail!("utc_offset_minutes must be within one day");
                }
                Some(minutes)
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: base_url, data_dir, log_file, reconnect_initial_secs, \
                 reconnect_max_secs, utc_offset_minutes",
                key
            );
        }
    }

    Ok(())
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    let secs: u64 = value
        .parse()
        .with_context(|| format!("Invalid value for {}. Use whole seconds.", key))?;
    if secs == 0 {
        bail!("{} must be at least 1", key);
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "base_url", "https://queue.example.com/").unwrap();
        assert_eq!(config.base_url, "https://queue.example.com");

        apply(&mut config, "reconnect_max_secs", "60").unwrap();
        assert_eq!(config.reconnect_max_secs, 60);

        apply(&mut config, "utc_offset_minutes", "180").unwrap();
        assert_eq!(config.utc_offset_minutes, Some(180));
        apply(&mut config, "utc_offset_minutes", "none").unwrap();
        assert_eq!(config.utc_offset_minutes, None);

        apply(&mut config, "log_file", "/tmp/qline.log").unwrap();
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/qline.log")));
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();

        assert!(apply(&mut config, "base_url", "localhost:5000").is_err());
        assert!(apply(&mut config, "reconnect_initial_secs", "0").is_err());
        assert!(apply(&mut config, "reconnect_initial_secs", "soon").is_err());
        assert!(apply(&mut config, "utc_offset_minutes", "1440").is_err());
        assert!(apply(&mut config, "sync_url", "x").is_err());
    }

    #[test]
    fn test_set_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set("reconnect_initial_secs", "5", Some(&path), &output).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("reconnect_initial_secs = 5"));
    }
}
