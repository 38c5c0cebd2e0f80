use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bbs", about = "A tag-based anonymous forum server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Publish a system notification to every user
    Announce {
        /// Notification title
        #[arg(short, long)]
        title: String,

        /// Notification body
        #[arg(short = 'm', long)]
        content: String,
    },
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub graphql: GraphqlConfig,
    pub forum: ForumConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL used in login links sent by email
    pub public_url: Option<String>,
    pub cors_origins: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub pool_size: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub login_token_minutes: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GraphqlConfig {
    pub playground: bool,
    pub max_depth: usize,
    pub max_complexity: usize,
}

/// Forum rules. Limits count characters, not bytes.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ForumConfig {
    pub main_tags: Vec<String>,
    pub recommended_tags: Vec<String>,
    pub default_title: String,
    pub max_sub_tags: usize,
    pub max_slice_limit: i32,
    pub max_content_len: usize,
    pub max_title_len: usize,
    pub max_name_len: usize,
    pub max_tag_len: usize,
    pub max_subbed_tags: usize,
    pub max_quotes: usize,
    pub tree_sub_tag_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: None,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 8,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "bbs_session".to_string(),
            session_hours: 720,
            login_token_minutes: 30,
        }
    }
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            playground: true,
            max_depth: 12,
            max_complexity: 500,
        }
    }
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            main_tags: ["综合", "校园", "学习", "生活", "情感", "技术"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            recommended_tags: Vec::new(),
            default_title: "无题".to_string(),
            max_sub_tags: 4,
            max_slice_limit: 50,
            max_content_len: 20_000,
            max_title_len: 64,
            max_name_len: 20,
            max_tag_len: 32,
            max_subbed_tags: 64,
            max_quotes: 10,
            tree_sub_tag_limit: 20,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("bbs.db"));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".bbs")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("bbs.db"))
    }

    /// Base URL for links handed out to users, without a trailing slash.
    pub fn public_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.server.host, self.server.port),
        }
    }

    /// No public_url and a wildcard bind host: login links will not resolve
    /// for anyone outside this machine.
    pub fn public_url_is_wildcard(&self) -> bool {
        self.server.public_url.is_none()
            && self
                .server
                .host
                .parse::<IpAddr>()
                .map(|ip| ip.is_unspecified())
                .unwrap_or(false)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.forum.main_tags.is_empty() {
            anyhow::bail!("forum.main_tags must not be empty");
        }
        if self.forum.max_slice_limit < 1 {
            anyhow::bail!("forum.max_slice_limit must be at least 1");
        }
        if self.auth.cookie_name.is_empty() {
            anyhow::bail!("auth.cookie_name must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(data_dir: Option<PathBuf>) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir,
            command: None,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.cookie_name, "bbs_session");
        assert_eq!(config.auth.session_hours, 720);
        assert_eq!(config.auth.login_token_minutes, 30);
        assert_eq!(config.forum.default_title, "无题");
        assert_eq!(config.forum.max_sub_tags, 4);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli(Some(PathBuf::from("/tmp/test-bbs")));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-bbs"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_bbs() {
        let dir = Config::data_dir(&cli(None));
        assert!(dir.ends_with(".bbs"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli(Some(tmp.path().to_path_buf()))).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.db_path(), tmp.path().join("bbs.db"));
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cli = cli(Some(tmp.path().to_path_buf()));
        cli.host = Some("127.0.0.1".to_string());
        cli.port = Some(9090);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.public_url(), "http://127.0.0.1:9090");
        assert!(!config.public_url_is_wildcard());
    }

    #[test]
    fn wildcard_host_without_public_url_is_flagged() {
        let mut config = Config::default();
        assert!(config.public_url_is_wildcard());

        config.server.host = "::".to_string();
        assert!(config.public_url_is_wildcard());

        config.server.public_url = Some("https://bbs.example.org/".to_string());
        assert!(!config.public_url_is_wildcard());
        assert_eq!(config.public_url(), "https://bbs.example.org");
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
port = 9000
public_url = "https://bbs.example.org/"

[forum]
main_tags = ["news", "chat"]
recommended_tags = ["rust"]
max_slice_limit = 20
"#,
        )
        .unwrap();

        let mut cli = cli(Some(tmp.path().to_path_buf()));
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.public_url(), "https://bbs.example.org");
        assert_eq!(config.forum.main_tags, vec!["news", "chat"]);
        assert_eq!(config.forum.recommended_tags, vec!["rust"]);
        assert_eq!(config.forum.max_slice_limit, 20);
        // untouched keys keep their defaults
        assert_eq!(config.forum.max_sub_tags, 4);
    }

    #[test]
    fn load_rejects_empty_main_tags() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[forum]\nmain_tags = []\n").unwrap();

        let mut cli = cli(Some(tmp.path().to_path_buf()));
        cli.config = Some(config_path);
        assert!(Config::load(&cli).is_err());
    }

    #[test]
    fn cli_parses_announce_subcommand() {
        let cli = Cli::parse_from([
            "bbs",
            "--data-dir",
            "/tmp/x",
            "announce",
            "--title",
            "Maintenance",
            "-m",
            "Down at noon",
        ]);
        assert_eq!(
            cli.command,
            Some(Command::Announce {
                title: "Maintenance".to_string(),
                content: "Down at noon".to_string(),
            })
        );
    }
}
