use std::io::{BufRead, Write};
use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::api::client::RestBackend;
use crate::app::AppConfig;
use crate::error::SessionError;
use crate::utils::{RUNTIME, normalize_url};

fn prompt(input: &mut impl BufRead, out: &mut impl Write, label: &str) -> Result<String, SessionError> {
    write!(out, "{label}")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Asks for the backend address, key and user id, checks that the backend
/// answers, and persists the result to `config_path`. A blank address switches
/// the client to offline mode.
pub fn prompt_setup(
    input: &mut impl BufRead,
    out: &mut impl Write,
    mut config: AppConfig,
    config_path: Option<&Path>,
) -> Result<AppConfig, SessionError> {
    writeln!(out, "Connect to theBandFam")?;
    let url = normalize_url(&prompt(input, out, "Backend URL (blank for offline): ")?);
    if url.is_empty() {
        config.offline = true;
        writeln!(out, "Starting offline with sample conversations.")?;
        return Ok(config);
    }
    let api_key = prompt(input, out, "API key: ")?;
    if api_key.is_empty() {
        writeln!(out, "An API key is required; starting offline.")?;
        config.offline = true;
        return Ok(config);
    }

    let user_id = prompt(input, out, &format!("Your user id [{}]: ", config.user_id))?;
    if !user_id.is_empty() {
        config.user_id = user_id;
    }

    let backend = RestBackend::new(&url, api_key.clone())?.with_timeout(Duration::from_secs(5))?;
    let status = match RUNTIME.block_on(backend.ping()) {
        Ok(code) if (200..300).contains(&code) => "Connected".to_string(),
        Ok(code) => format!("Saved (backend answered HTTP {code})"),
        Err(err) => {
            warn!("backend check failed: {err}");
            "Saved (backend unreachable)".to_string()
        }
    };
    info!("backend check: {url} - {status}");
    writeln!(out, "{status}")?;

    config.backend_url = url;
    config.api_key = api_key;
    config.access_token = None;
    config.offline = false;
    match config_path {
        Some(path) => {
            if let Err(err) = config.save_to(path) {
                writeln!(out, "Failed to save settings: {err}")?;
            }
        }
        None => writeln!(out, "No config directory; settings are kept for this session only.")?,
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_url_goes_offline() {
        let mut input = "\n".as_bytes();
        let mut out = Vec::new();
        let config = prompt_setup(&mut input, &mut out, AppConfig::default(), None).unwrap();
        assert!(config.offline);
        assert!(String::from_utf8(out).unwrap().contains("offline"));
    }

    #[test]
    fn missing_key_goes_offline_without_saving() {
        let mut input = "abc.backend.example\n\n".as_bytes();
        let mut out = Vec::new();
        let config = prompt_setup(&mut input, &mut out, AppConfig::default(), None).unwrap();
        assert!(config.offline);
        assert!(config.backend_url.is_empty());
    }

    #[test]
    fn setup_records_user_id_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bandfam.toml");
        let mut input = "http://127.0.0.1:9\nanon\nuser-42\n".as_bytes();
        let mut out = Vec::new();

        let config =
            prompt_setup(&mut input, &mut out, AppConfig::default(), Some(&path)).unwrap();

        assert_eq!(config.user_id, "user-42");
        assert_eq!(config.backend_url, "http://127.0.0.1:9");
        assert!(!config.offline);
        assert_eq!(AppConfig::load_toml(&path), Some(config));
    }

    #[test]
    fn blank_user_id_keeps_existing_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bandfam.toml");
        let mut input = "http://127.0.0.1:9\nanon\n\n".as_bytes();
        let mut out = Vec::new();
        let existing = AppConfig {
            user_id: "u-7".into(),
            ..AppConfig::default()
        };

        let config = prompt_setup(&mut input, &mut out, existing, Some(&path)).unwrap();

        assert_eq!(config.user_id, "u-7");
        assert!(String::from_utf8(out).unwrap().contains("Your user id [u-7]: "));
    }
}
