use crate::configs;
use crate::item::{Author, AuthorDetail, BasketItem, Book, BookId, Genre, Profile};
use crate::provider::api::dto::{self, RawAuthor, RawBook, RawGenre, RawMessage, RawProfile, RawToken};
use crate::provider::api::{
    ApiError, BookQuery, Created, Credentials, FormPayload, PurchaseReceipt, Registration, ShopApi, Token,
};
use crate::session::SessionStore;
use reqwest::blocking::{self, multipart, RequestBuilder};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// 백엔드 REST API 클라이언트
///
/// 재시도는 하지 않는다. 모든 응답은 [`SessionStore::observe`]를 거쳐 401/403 정책이 적용된다.
pub struct Client {
    client: blocking::Client,
    base_url: Url,
    profile_path: Vec<String>,
    session: Arc<SessionStore>,
}

#[derive(Serialize)]
struct QuantityBody {
    quantity: u32,
}

pub fn new_client(settings: &configs::Api, session: Arc<SessionStore>) -> Result<Client, ApiError> {
    let base_url = Url::parse(settings.base_url())
        .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", settings.base_url(), e)))?;
    if base_url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(settings.base_url().to_owned()));
    }

    let client = blocking::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_seconds()))
        .cookie_store(true)
        .build()
        .map_err(|e| ApiError::Transport(format!("client build failed: {}", e)))?;

    let profile_path = settings.profile_path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    Ok(Client { client, base_url, profile_path, session })
}

impl Client {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 경로 조각들로 URL을 만든다. 마지막 조각이 빈 문자열이면 `/`로 끝난다.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "Dispatching request");
        let builder = self.client.request(method, url);
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn execute(&self, builder: RequestBuilder) -> Result<Value, ApiError> {
        let result = dispatch(builder);
        if let Err(err) = &result {
            error!(error = %err, "Request failed");
        }
        self.session.observe(result)
    }

    fn get(&self, segments: &[&str]) -> Result<Value, ApiError> {
        let url = self.endpoint(segments)?;
        self.execute(self.request(Method::GET, url))
    }

    fn delete(&self, segments: &[&str]) -> Result<Value, ApiError> {
        let url = self.endpoint(segments)?;
        self.execute(self.request(Method::DELETE, url))
    }

    fn post_json<B: Serialize>(&self, segments: &[&str], body: &B) -> Result<Value, ApiError> {
        let url = self.endpoint(segments)?;
        self.execute(self.request(Method::POST, url).json(body))
    }

    fn list_shelf(&self, name: &str) -> Result<Vec<Book>, ApiError> {
        let value = self.get(&["shop", name, ""])?;
        dto::narrow_list(value, name, RawBook::into_book)
    }

    fn post_form(&self, segments: &[&str], payload: FormPayload) -> Result<Value, ApiError> {
        let url = self.endpoint(segments)?;
        let form = to_multipart(payload)?;
        self.execute(self.request(Method::POST, url).multipart(form))
    }
}

fn dispatch(builder: RequestBuilder) -> Result<Value, ApiError> {
    let response = builder.send().map_err(transport_error)?;
    let status = response.status();
    let text = response.text().map_err(transport_error)?;

    if !status.is_success() {
        let message = dto::error_message(&text)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_owned());
        return Err(ApiError::from_status(status.as_u16(), message));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}

fn to_multipart(payload: FormPayload) -> Result<multipart::Form, ApiError> {
    let (fields, files) = payload.into_parts();
    let mut form = multipart::Form::new();
    for (key, value) in fields {
        form = form.text(key, value);
    }
    for (key, file) in files {
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime)
            .map_err(|e| ApiError::Validation { status: 400, message: format!("invalid file type: {}", e) })?;
        form = form.part(key, part);
    }
    Ok(form)
}

fn decode_book(value: Value) -> Result<Book, ApiError> {
    dto::narrow_one::<RawBook>(value, "book")?
        .into_book()
        .map_err(|e| ApiError::Decode(format!("book: {}", e)))
}

impl ShopApi for Client {
    fn register(&self, registration: &Registration) -> Result<Profile, ApiError> {
        let value = self.post_json(&["auth", "register"], registration)?;
        Ok(dto::narrow_one::<RawProfile>(value, "profile")?.into())
    }

    fn login(&self, credentials: &Credentials) -> Result<Token, ApiError> {
        let value = self.post_json(&["auth", "login"], credentials)?;
        Ok(dto::narrow_one::<RawToken>(value, "token")?.into())
    }

    fn profile(&self) -> Result<Profile, ApiError> {
        let segments: Vec<&str> = self.profile_path.iter().map(String::as_str).collect();
        let value = self.get(&segments)?;
        Ok(dto::narrow_one::<RawProfile>(value, "profile")?.into())
    }

    fn list_books(&self, query: &BookQuery) -> Result<Vec<Book>, ApiError> {
        let mut url = self.endpoint(&["shop", ""])?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.pairs());
        }
        let value = self.execute(self.request(Method::GET, url))?;
        dto::narrow_list(value, "book", RawBook::into_book)
    }

    fn get_book(&self, id: &BookId) -> Result<Book, ApiError> {
        decode_book(self.get(&["shop", "book", id.as_str()])?)
    }

    fn list_featured(&self) -> Result<Vec<Book>, ApiError> {
        self.list_shelf("featured")
    }

    fn list_new_releases(&self) -> Result<Vec<Book>, ApiError> {
        self.list_shelf("new-releases")
    }

    fn list_popular(&self) -> Result<Vec<Book>, ApiError> {
        self.list_shelf("popular")
    }

    fn list_genres(&self) -> Result<Vec<Genre>, ApiError> {
        let value = self.get(&["genres", ""])?;
        dto::narrow_list(value, "genre", RawGenre::into_genre)
    }

    fn list_authors(&self) -> Result<Vec<Author>, ApiError> {
        let value = self.get(&["authors", ""])?;
        dto::narrow_list(value, "author", RawAuthor::into_author)
    }

    fn get_author(&self, id: u64) -> Result<AuthorDetail, ApiError> {
        let value = self.get(&["authors", &id.to_string()])?;
        dto::narrow_one::<RawAuthor>(value, "author")?.into_detail()
    }

    fn list_favorites(&self) -> Result<Vec<Book>, ApiError> {
        let value = self.get(&["shop", "favorites", ""])?;
        dto::narrow_list(value, "favorite", |raw: RawBook| {
            let mut book = raw.into_book()?;
            book.set_favorite(true);
            Ok(book)
        })
    }

    fn add_favorite(&self, id: &BookId) -> Result<(), ApiError> {
        self.post_json(&["shop", "favorites", id.as_str()], &serde_json::json!({}))
            .map(|_| ())
    }

    fn remove_favorite(&self, id: &BookId) -> Result<(), ApiError> {
        self.delete(&["shop", "favorites", id.as_str()]).map(|_| ())
    }

    fn get_basket(&self) -> Result<Vec<BasketItem>, ApiError> {
        let value = self.get(&["shop", "basket", ""])?;
        dto::narrow_list(value, "basket", RawBook::into_basket_item)
    }

    fn add_basket_item(&self, id: &BookId, quantity: u32) -> Result<(), ApiError> {
        self.post_json(&["shop", "basket", id.as_str()], &QuantityBody { quantity })
            .map(|_| ())
    }

    fn remove_basket_item(&self, id: &BookId) -> Result<(), ApiError> {
        self.delete(&["shop", "basket", id.as_str()]).map(|_| ())
    }

    fn purchase(&self) -> Result<PurchaseReceipt, ApiError> {
        let value = self.post_json(&["shop", "basket", "purchase"], &serde_json::json!({}))?;
        Ok(optional_message(value).into())
    }

    fn create_book(&self, payload: FormPayload) -> Result<Created, ApiError> {
        Ok(optional_message(self.post_form(&["admin", "books", ""], payload)?).into())
    }

    fn create_genre(&self, payload: FormPayload) -> Result<Created, ApiError> {
        Ok(optional_message(self.post_form(&["admin", "genres", ""], payload)?).into())
    }

    fn create_author(&self, payload: FormPayload) -> Result<Created, ApiError> {
        Ok(optional_message(self.post_form(&["admin", "authors", ""], payload)?).into())
    }
}

/// 쓰기 요청의 응답 본문은 형식이 일정하지 않아 읽을 수 없는 경우 빈 메시지로 취급한다.
fn optional_message(value: Value) -> RawMessage {
    serde_json::from_value(value).unwrap_or_default()
}
