//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

/// Profile seeded from factory defaults plus any address flags given.
fn profile_from_flags(global: &GlobalOpts) -> Profile {
    let mut profile = Profile::default();
    if let Some(ref device) = global.device {
        profile.ip.clone_from(device);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(interval) = global.reconnect_interval_ms {
        profile.reconnect_interval_ms = interval;
    }
    profile
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        ConfigCommand::Init { name, force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let profile = profile_from_flags(global);
            // Refuse to write a profile that would not load.
            rfidmon_config::profile_to_monitor_config(&profile)?;

            let mut cfg = Config {
                default_profile: Some(name.clone()),
                ..Config::default()
            };
            cfg.profiles.insert(name.clone(), profile);
            rfidmon_config::save_config_to(&cfg, &path)?;

            tracing::info!(path = %path.display(), profile = %name, "config written");
            output::print_output(
                &format!("Wrote profile '{name}' to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config(global)?;
            let as_toml =
                toml::to_string_pretty(&cfg).map_err(|e| CliError::Render(e.to_string()))?;
            let rendered = output::render_single(
                global.output,
                &cfg,
                |_| as_toml.trim_end().to_owned(),
                |_| as_toml.trim_end().to_owned(),
            )?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
    }
}
