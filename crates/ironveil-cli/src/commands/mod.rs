pub mod bench;
pub mod bytes;
pub mod pool;
pub mod sources;

use std::path::Path;

use ironveil_core::{Result, SecurityContext, ToolkitConfig};

/// Configuration from `--config`, or defaults.
pub fn load_config(path: Option<&Path>) -> Result<ToolkitConfig> {
    match path {
        Some(path) => {
            let config = ToolkitConfig::load(path)?;
            log::debug!("loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(ToolkitConfig::default()),
    }
}

pub fn make_context(config_path: Option<&Path>) -> Result<SecurityContext> {
    SecurityContext::new(load_config(config_path)?)
}

pub fn show_config(config_path: Option<&Path>) -> Result<()> {
    println!("{}", load_config(config_path)?.to_json()?);
    Ok(())
}

pub fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}
