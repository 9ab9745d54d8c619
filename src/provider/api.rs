use crate::item::{AuthorDetail, Author, BasketItem, Book, BookId, Genre, Profile};
use serde::Serialize;
use thiserror::Error;

pub mod dto;
pub mod http;

/// API 호출 실패를 표현하는 구조화된 에러
///
/// 재시도는 하지 않으며 어떻게 대응할지(토스트, 리다이렉트 등)는 호출한 쪽에서 결정한다.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 응답을 받지 못함
    #[error("Network error: {0}")]
    Transport(String),

    /// 설정된 시간 안에 응답을 받지 못함
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// 요청 URL을 만들 수 없음
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    /// 4xx 응답 (401, 403, 404 제외)
    #[error("Validation failed ({status}): {message}")]
    Validation { status: u16, message: String },

    /// 401, 403 응답으로 세션이 만료된다.
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// 404 응답, 멱등한 삭제에서는 무해한 실패로 취급한다.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// 5xx 응답
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// 응답 본문의 형태가 예상과 다름
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP 상태 코드와 서버 메시지로 에러를 분류한다.
    ///
    /// # Example
    /// ```
    /// use book_shop_client::provider::api::ApiError;
    ///
    /// assert!(ApiError::from_status(403, "forbidden".into()).is_unauthorized());
    /// assert!(ApiError::from_status(404, "missing".into()).is_not_found());
    /// assert_eq!(ApiError::from_status(422, "bad".into()).status(), Some(422));
    /// ```
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => ApiError::Unauthorized { status, message },
            404 => ApiError::NotFound { message },
            400..=499 => ApiError::Validation { status, message },
            _ => ApiError::Server { status, message },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { status, .. }
            | ApiError::Unauthorized { status, .. }
            | ApiError::Server { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// 사용자에게 보여줄 메시지, 서버가 내려준 상세 메시지가 있으면 그것을 사용한다.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Transport(message)
            | ApiError::Timeout(message)
            | ApiError::InvalidUrl(message)
            | ApiError::Decode(message) => message,
            ApiError::Validation { message, .. }
            | ApiError::Unauthorized { message, .. }
            | ApiError::NotFound { message }
            | ApiError::Server { message, .. } => message,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// 로그인 요청 폼
///
/// 백엔드는 이메일을 `username` 필드로 받는다.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    #[serde(rename = "username")]
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new<E: Into<String>, P: Into<String>>(email: E, password: P) -> Self {
        Credentials { email: email.into(), password: password.into() }
    }
}

/// 회원가입 요청 폼
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub nickname: String,
    pub email: String,
    pub password: String,
}

/// 로그인 성공시 발급되는 토큰
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub nickname: Option<String>,
}

/// 구매 완료 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub message: Option<String>,
}

/// 관리자 등록 요청의 응답
///
/// 엔티티에 따라 `title` 혹은 `name`이 채워진다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Created {
    pub title: Option<String>,
    pub name: Option<String>,
    pub message: Option<String>,
}

/// 카탈로그 조회 조건
///
/// 비어있는 조건은 쿼리 파라미터로 직렬화 되지 않는다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    pairs: Vec<(String, String)>,
}

impl BookQuery {
    pub fn builder() -> BookQueryBuilder {
        BookQueryBuilder::default()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct BookQueryBuilder {
    pairs: Vec<(String, String)>,
}

impl BookQueryBuilder {
    /// 값이 비어있다면 무시한다.
    pub fn param<K: Into<String>>(mut self, key: K, value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() {
            self.pairs.push((key.into(), value.to_owned()));
        }
        self
    }

    pub fn build(self) -> BookQuery {
        BookQuery { pairs: self.pairs }
    }
}

/// 멀티파트로 업로드할 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// 관리자 등록 폼의 멀티파트 본문
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
    fields: Vec<(String, String)>,
    files: Vec<(String, FileUpload)>,
}

impl FormPayload {
    pub fn new() -> Self {
        FormPayload::default()
    }

    /// 비어있는 값은 전송하지 않는다.
    pub fn text<K: Into<String>>(mut self, key: K, value: &str) -> Self {
        if !value.trim().is_empty() {
            self.fields.push((key.into(), value.trim().to_owned()));
        }
        self
    }

    pub fn file<K: Into<String>>(mut self, key: K, file: Option<FileUpload>) -> Self {
        if let Some(file) = file {
            self.files.push((key.into(), file));
        }
        self
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn files(&self) -> &[(String, FileUpload)] {
        &self.files
    }

    pub fn into_parts(self) -> (Vec<(String, String)>, Vec<(String, FileUpload)>) {
        (self.fields, self.files)
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 백엔드 REST API
///
/// 백엔드 기능 하나당 함수 하나를 제공한다. 인증이 필요한 호출은 구현체가
/// 세션에서 토큰을 읽어 Bearer 헤더로 붙인다.
pub trait ShopApi: Send + Sync {
    fn register(&self, registration: &Registration) -> Result<Profile, ApiError>;

    fn login(&self, credentials: &Credentials) -> Result<Token, ApiError>;

    fn profile(&self) -> Result<Profile, ApiError>;

    fn list_books(&self, query: &BookQuery) -> Result<Vec<Book>, ApiError>;

    fn get_book(&self, id: &BookId) -> Result<Book, ApiError>;

    /// 첫 화면의 추천 도서
    fn list_featured(&self) -> Result<Vec<Book>, ApiError>;

    fn list_new_releases(&self) -> Result<Vec<Book>, ApiError>;

    fn list_popular(&self) -> Result<Vec<Book>, ApiError>;

    fn list_genres(&self) -> Result<Vec<Genre>, ApiError>;

    fn list_authors(&self) -> Result<Vec<Author>, ApiError>;

    fn get_author(&self, id: u64) -> Result<AuthorDetail, ApiError>;

    fn list_favorites(&self) -> Result<Vec<Book>, ApiError>;

    fn add_favorite(&self, id: &BookId) -> Result<(), ApiError>;

    fn remove_favorite(&self, id: &BookId) -> Result<(), ApiError>;

    fn get_basket(&self) -> Result<Vec<BasketItem>, ApiError>;

    fn add_basket_item(&self, id: &BookId, quantity: u32) -> Result<(), ApiError>;

    fn remove_basket_item(&self, id: &BookId) -> Result<(), ApiError>;

    fn purchase(&self) -> Result<PurchaseReceipt, ApiError>;

    fn create_book(&self, payload: FormPayload) -> Result<Created, ApiError>;

    fn create_genre(&self, payload: FormPayload) -> Result<Created, ApiError>;

    fn create_author(&self, payload: FormPayload) -> Result<Created, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(ApiError::from_status(400, "x".into()), ApiError::Validation { status: 400, .. }));
        assert!(matches!(ApiError::from_status(401, "x".into()), ApiError::Unauthorized { status: 401, .. }));
        assert!(matches!(ApiError::from_status(404, "x".into()), ApiError::NotFound { .. }));
        assert!(matches!(ApiError::from_status(503, "x".into()), ApiError::Server { status: 503, .. }));
    }

    #[test]
    fn book_query_skips_blank_values() {
        let query = BookQuery::builder()
            .param("title", "Dune")
            .param("year", "  ")
            .param("sort_by", "date")
            .build();

        assert_eq!(query.pairs(), &[
            ("title".to_owned(), "Dune".to_owned()),
            ("sort_by".to_owned(), "date".to_owned()),
        ]);
    }

    #[test]
    fn form_payload_drops_empty_fields_and_missing_files() {
        let payload = FormPayload::new()
            .text("name", "Fantasy")
            .text("info", "")
            .file("img", None);

        assert_eq!(payload.fields().len(), 1);
        assert_eq!(payload.field("name"), Some("Fantasy"));
        assert!(payload.files().is_empty());
    }
}
