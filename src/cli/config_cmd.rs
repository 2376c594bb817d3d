use anyhow::Result;

use crate::cli::output::OutputOptions;
use crate::core::config::AppConfig;

pub fn init(_opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    let config = AppConfig::default();
    let path = config.save()?;
    println!("Generated config at {}", path.display());
    println!("  Sessions: {}", config.sessions_dir().display());
    println!("  Data:     {}", config.data_dir().display());
    println!("  Notes:    {}", config.notes_dir().display());
    println!("  Budget:   ${:.2}/day", config.budget.daily);
    Ok(())
}

pub fn check(opts: &OutputOptions) -> Result<()> {
    let path = AppConfig::config_path();
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `tkm config init` to create one.");
        return Ok(());
    }

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if opts.is_json() {
        opts.print_json(&serde_json::json!({
            "path": path,
            "valid": issues.is_empty(),
            "issues": issues,
        }))?;
    } else if issues.is_empty() {
        println!("Config is valid ({})", path.display());
    } else {
        eprintln!("Config has {} issue(s):", issues.len());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
    }
    if !issues.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
