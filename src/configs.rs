use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub mod logging;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_PROFILE_PATH: &str = "/users/me";
const DEFAULT_SESSION_FILE: &str = ".book-shop/session.json";
const ENV_PREFIX: &str = "BOOK_SHOP";

/// 백엔드 API 접속 설정
#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    base_url: String,

    /// 요청 하나당 최대 대기 시간(초), 이 시간을 넘기면 타임아웃 에러로 처리된다.
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,

    /// 로그인한 사용자의 프로필 조회 경로
    #[serde(default = "default_profile_path")]
    profile_path: String,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_profile_path() -> String {
    DEFAULT_PROFILE_PATH.to_owned()
}

impl Api {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Api {
            base_url: base_url.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            profile_path: DEFAULT_PROFILE_PATH.to_owned(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn profile_path(&self) -> &str {
        &self.profile_path
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
    #[serde(default = "default_session_file")]
    session_file: PathBuf,
}

fn default_session_file() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_FILE)
}

impl Default for Storage {
    fn default() -> Self {
        Storage { session_file: default_session_file() }
    }
}

impl Storage {
    pub fn session_file(&self) -> &PathBuf {
        &self.session_file
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    api: Api,
    #[serde(default)]
    storage: Storage,
    #[serde(default)]
    logger: Option<logging::Config>,
}

impl AppConfig {
    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn logger(&self) -> Option<&logging::Config> {
        self.logger.as_ref()
    }
}

/// 실행 환경에 따라 .env 파일을 로드한다.
pub fn load_dotenv() {
    let env_filename = env::var("RUN_MODE")
        .map(|env| format!(".env.{}", env))
        .unwrap_or_else(|_| ".env".into());

    dotenvy::from_filename(env_filename).ok();
}

/// `config/{RUN_MODE}.json` 파일을 읽고 `BOOK_SHOP__` 접두사 환경변수로 덮어쓴다.
///
/// 설정 파일이 없어도 환경변수 만으로 설정 할 수 있다.
/// (e.g. `BOOK_SHOP__API__BASE_URL=http://localhost:8000`)
pub fn load_config() -> Result<AppConfig, config::ConfigError> {
    let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
    let config = config::Config::builder()
        .add_source(config::File::with_name(&format!("config/{}.json", env)).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize()
}

/// 프로그램에서 사용할 로깅 옵션을 설정한다.
/// 로거 설정이 없으면 WARN 이상만 stderr로 출력한다.
pub fn set_global_logging_config(config: &AppConfig) -> Result<Option<logging::Guard>, logging::Error> {
    match config.logger() {
        Some(logger) => logging::set_global_logging_config(logger).map(Some),
        None => {
            logging::set_console_logging();
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let config: AppConfig = serde_json::from_str(r#"{"api": {"base_url": "http://localhost:8000"}}"#).unwrap();

        assert_eq!(config.api().base_url(), "http://localhost:8000");
        assert_eq!(config.api().timeout_seconds(), 10);
        assert_eq!(config.api().profile_path(), "/users/me");
        assert_eq!(config.storage().session_file(), &PathBuf::from(".book-shop/session.json"));
        assert!(config.logger().is_none());
    }
}
