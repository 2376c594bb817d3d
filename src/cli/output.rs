use serde::Serialize;
use std::io::IsTerminal;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// `-j` wins, then `--format`, then the config default.
    pub fn resolve(json_flag: bool, format: Option<&str>, config_default: &str) -> Self {
        if json_flag {
            return Self::Json;
        }
        match format.unwrap_or(config_default) {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
}

impl OutputOptions {
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{}", json);
        Ok(())
    }
}

/// Colour is on unless disabled by flag, config (`never`), `NO_COLOR`, or a non-TTY stdout.
/// `always` in the config skips the TTY check.
pub fn detect_color(color_flag: bool, config_color: &str) -> bool {
    if !color_flag || config_color == "never" {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    config_color == "always" || std::io::stdout().is_terminal()
}

/// Write `content` to `path`, or to stdout when no path is given.
pub fn emit(content: &str, path: Option<&Path>) -> anyhow::Result<()> {
    use anyhow::Context;
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
