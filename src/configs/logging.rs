use serde::Deserialize;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// 로그 파일 기록 스레드의 가드, 프로그램 종료 전까지 유지해야 남은 로그가 기록된다.
pub type Guard = WorkerGuard;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("로그 레벨(level)은 TRACE, DEBUG, INFO, WARN, ERROR만 가능 합니다: {0}")]
    InvalidLevel(String),

    #[error("로깅 파일 로테이션(rotation)은 DAILY, HOURLY, MINUTELY, NEVER만 가능 합니다: {0}")]
    InvalidRotation(String),

    #[error("Failed to create log appender: {0}")]
    AppenderFailed(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    dir: String,
    name: String,

    /// 최대 로그 파일 개수로 로그 파일이 설정한 개수보다 커질 경우 기존의 로그파일들은 삭제 된다.
    /// 설정 되지 않을 시 로그 파일은 삭제 되지 않는다.
    keep: Option<usize>,

    /// 파일과 stdout에 출력할 로그의 레벨로 지정된 로그 레벨 이상만 로깅된다.
    /// 설정하지 않을시 기본값은 INFO로 설정 된다.
    level: Option<String>,

    /// 로깅 파일이 분리 되는 기간으로 .log 파일 하나 당 설정된 기간 동안 로그가 기록 된다.
    /// 설정 되지 않을시 기본값은 DAILY로 설정된다.
    rotation: Option<String>,
}

pub fn set_global_logging_config(c: &Config) -> Result<Guard, Error> {
    let level = c.level.as_deref().map(parse_level).transpose()?.unwrap_or(tracing::Level::INFO);
    let rotation = c.rotation.as_deref().map(parse_rotation).transpose()?.unwrap_or(rolling::Rotation::DAILY);

    let mut file_appender = rolling::RollingFileAppender::builder()
        .filename_prefix(c.name.clone())
        .filename_suffix("log")
        .rotation(rotation);

    if let Some(keep) = c.keep {
        file_appender = file_appender.max_log_files(keep);
    }

    let file_appender = file_appender.build(c.dir.clone())
        .map_err(|e| Error::AppenderFailed(e.to_string()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let writer = std::io::stdout.and(non_blocking);

    tracing_subscriber::fmt()
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_timer(LocalTime::new(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]")))
        .with_writer(writer)
        .with_max_level(level)
        .init();

    Ok(guard)
}

/// 파일 로깅 설정이 없을 때 사용하는 stderr 로거
pub fn set_console_logging() {
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();
}

fn parse_rotation(s: &str) -> Result<rolling::Rotation, Error> {
    match s.to_uppercase().as_str() {
        "DAILY" => Ok(rolling::Rotation::DAILY),
        "HOURLY" => Ok(rolling::Rotation::HOURLY),
        "MINUTELY" => Ok(rolling::Rotation::MINUTELY),
        "NEVER" => Ok(rolling::Rotation::NEVER),
        _ => Err(Error::InvalidRotation(s.to_owned())),
    }
}

fn parse_level(l: &str) -> Result<tracing::Level, Error> {
    match l.to_uppercase().as_str() {
        "TRACE" => Ok(tracing::Level::TRACE),
        "DEBUG" => Ok(tracing::Level::DEBUG),
        "INFO" => Ok(tracing::Level::INFO),
        "WARN" => Ok(tracing::Level::WARN),
        "ERROR" => Ok(tracing::Level::ERROR),
        _ => Err(Error::InvalidLevel(l.to_owned())),
    }
}
