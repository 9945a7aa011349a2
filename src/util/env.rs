//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in the binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::debug;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_err() {
            // Fallback to the crate root so `cargo run` from a subdirectory still works
            let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
            let _ = dotenv::from_filename(candidate);
        }
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                debug!(target = "env", key, raw = %raw, "unparsable env value; using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Comma separated list, trimmed, empty entries dropped. None when unset.
pub fn env_list(key: &str) -> Option<Vec<String>> {
    env_opt(key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// `Name=Code` pairs separated by commas, e.g. `Nintendo Switch=Switch,Playstation 4=PS4`.
pub fn env_pairs(key: &str) -> Option<Vec<(String, String)>> {
    env_list(key).map(|items| {
        items
            .iter()
            .filter_map(|item| item.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists_and_pairs() {
        std::env::set_var("TRADEIN_TEST_LIST", " Comics , ,Toys ");
        std::env::set_var("TRADEIN_TEST_PAIRS", "Nintendo Switch=Switch, bad ,Playstation 5 = PS5");

        assert_eq!(
            env_list("TRADEIN_TEST_LIST"),
            Some(vec!["Comics".to_string(), "Toys".to_string()])
        );
        assert_eq!(
            env_pairs("TRADEIN_TEST_PAIRS"),
            Some(vec![
                ("Nintendo Switch".to_string(), "Switch".to_string()),
                ("Playstation 5".to_string(), "PS5".to_string()),
            ])
        );

        std::env::remove_var("TRADEIN_TEST_LIST");
        std::env::remove_var("TRADEIN_TEST_PAIRS");
    }

    #[test]
    fn parse_falls_back_on_garbage() {
        std::env::set_var("TRADEIN_TEST_NUM", "ten");
        assert_eq!(env_parse("TRADEIN_TEST_NUM", 10usize), 10);
        std::env::set_var("TRADEIN_TEST_NUM", " 25 ");
        assert_eq!(env_parse("TRADEIN_TEST_NUM", 10usize), 25);
        std::env::remove_var("TRADEIN_TEST_NUM");
    }
}
