use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// WebSocket endpoint, e.g. `wss://computernewb.com/collab-vm/vm0`.
    pub url: String,
    pub node: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientConfig {
    pub username: Option<String>,
    /// Staff password, sent once the node is joined.
    pub password: Option<String>,
    /// Account session token, sent when the server asks for auth.
    pub session_token: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CONFIG: &str = r#"
        [server]
        url = "wss://example.com/collab-vm/vm0"
        node = "vm0"

        [client]
        username = "guest123"
        password = "hunter2"
        session_token = "abc"
        request_timeout_ms = 10000
    "#;

    #[test]
    fn test_config_loads_from_toml_string() {
        let config = Config::from_toml_str(SAMPLE_CONFIG).expect("config should parse");
        assert_eq!(config.server.url, "wss://example.com/collab-vm/vm0");
        assert_eq!(config.server.node, "vm0");
    }

    #[test]
    fn test_config_client_fields() {
        let config = Config::from_toml_str(SAMPLE_CONFIG).expect("config should parse");
        assert_eq!(config.client.username.as_deref(), Some("guest123"));
        assert_eq!(config.client.password.as_deref(), Some("hunter2"));
        assert_eq!(config.client.session_token.as_deref(), Some("abc"));
        assert_eq!(config.client.request_timeout_ms, Some(10000));
    }

    #[test]
    fn test_config_client_section_optional() {
        let minimal = r#"
            [server]
            url = "ws://127.0.0.1:6004"
            node = "vm1"
        "#;
        let config = Config::from_toml_str(minimal).expect("config should parse");
        assert!(config.client.username.is_none());
        assert!(config.client.password.is_none());
        assert!(config.client.request_timeout_ms.is_none());
    }

    #[test]
    fn test_config_rejects_missing_required_fields() {
        let bad = r#"
            [server]
            node = "vm0"
        "#;
        assert!(Config::from_toml_str(bad).is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE_CONFIG.as_bytes()).expect("write");
        let path = file.path().to_str().expect("utf-8 path");
        let config = Config::from_file(path).expect("config should load");
        assert_eq!(config.server.node, "vm0");
    }

    #[test]
    fn test_config_from_missing_file_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope.toml");
        assert!(Config::from_file(path.to_str().expect("utf-8 path")).is_err());
    }
}
