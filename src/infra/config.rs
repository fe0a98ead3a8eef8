use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::profile::ConfigurationProfile;
use crate::fiscal::cfop::MovementTables;

/// Config file names, first match wins.
pub const CONFIG_FILES: [&str; 4] = ["nfk.toml", ".nfk.toml", "nfk.yaml", "nfk.json"];

/// Environment prefix; nested keys use `__` (`NFK_MOVEMENT__SALES`).
pub const ENV_PREFIX: &str = "NFK";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Directory holding `<id>.toml` profiles (`~` expanded)
    pub profiles_dir: PathBuf,

    /// Worker threads for parse/edit/save; unset = available parallelism
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    /// Extra ignore globs applied to the batch directory
    pub ignore_patterns: Vec<String>,

    /// Movement-code families
    pub movement: MovementTables,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            profiles_dir: PathBuf::from("profiles"),
            jobs: None,
            ignore_patterns: vec!["*.orig.xml".to_string(), "~$*".to_string()],
            movement: MovementTables::default(),
        }
    }
}

impl Config
{
    /// `profiles_dir` with `~` and `$VARS` expanded.
    pub fn profiles_dir(&self) -> PathBuf
    {
        let raw = self
            .profiles_dir
            .to_string_lossy();
        match shellexpand::full(&raw)
        {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(_) => self
                .profiles_dir
                .clone(),
        }
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_in(Path::new("."))
}

/// Layer the first config file found in `dir` and `NFK_*` variables over the
/// built-in defaults.
pub fn load_config_in(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    for name in &CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// Write `nfk.toml` and an example profile under `profiles/`.
pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILES[0]);
    let config = Config::default();
    let profile_path = args
        .path
        .join(&config.profiles_dir)
        .join("example.toml");

    for path in [&config_path, &profile_path]
    {
        if path.exists() && !args.force
        {
            anyhow::bail!("{} already exists. Use --force to overwrite.", path.display());
        }
    }

    let config_toml =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;
    let profile_toml = toml::to_string_pretty(&ConfigurationProfile::example())
        .context("Failed to serialize example profile")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("Would create {}", config_path.display());
            println!("Would create {}", profile_path.display());
        }
        return Ok(());
    }

    if let Some(parent) = profile_path.parent()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&config_path, config_toml).context("Failed to write config file")?;
    std::fs::write(&profile_path, profile_toml).context("Failed to write example profile")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
        println!("Created example profile at {}", profile_path.display());
    }
    Ok(())
}
