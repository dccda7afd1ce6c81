use colored::Colorize;

use crate::config::AppConfig;

fn masked(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "********",
        _ => "(not set)",
    }
}

pub fn show(cfg: &AppConfig) {
    println!("{}: {}", "Base URL".cyan(), cfg.base_url);
    println!("{}: {}", "WSAPI version".cyan(), cfg.wsapi_version);
    println!("{}: {}", "Input".cyan(), cfg.input.display());
    println!("{}: {:?}", "Delimiter".cyan(), cfg.delimiter);
    println!("{}: {}", "Encoding".cyan(), cfg.encoding);
    println!("{}: {}", "Log file".cyan(), cfg.log_file.display());
    println!("{}: {}", "Log level".cyan(), cfg.log_level);
    println!(
        "{}: {}",
        "Username".cyan(),
        cfg.auth.username.as_deref().unwrap_or("(not set)")
    );
    println!("{}: {}", "Password".cyan(), masked(cfg.auth.password.as_deref()));
    println!("{}: {}", "API key".cyan(), masked(cfg.auth.api_key.as_deref()));
    if let Some(name) = &cfg.integration.name {
        println!("{}: {}", "Integration".cyan(), name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked() {
        assert_eq!(masked(Some("secret")), "********");
        assert_eq!(masked(Some("")), "(not set)");
        assert_eq!(masked(None), "(not set)");
    }
}
