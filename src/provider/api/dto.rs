use crate::item::{Author, AuthorDetail, BasketItem, Book, BookId, Genre, ItemError, Profile, Role};
use crate::provider::api::{ApiError, Created, PurchaseReceipt, Token};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use tracing::warn;

const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";

/// 백엔드의 도서 응답
///
/// 모든 필드는 누락 될 수 있으며 [`RawBook::into_book`]에서 검증된다.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawBook {
    pub id: Option<BookId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub genre_name: Option<String>,
    pub author_name: Option<String>,
    pub release_date: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub favorites_count: Option<u32>,
    pub is_favorite: Option<bool>,
    pub img: Option<String>,
    /// 숫자 혹은 숫자 문자열(Decimal 직렬화)
    #[serde_as(deserialize_as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub price: Option<f64>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    pub quantity: Option<u32>,
}

impl RawBook {
    pub fn into_book(self) -> Result<Book, ItemError> {
        let mut builder = Book::builder()
            .is_favorite(self.is_favorite.unwrap_or(false))
            .favorites_count(self.favorites_count.unwrap_or(0))
            .price(self.price.unwrap_or(0.0));

        if let Some(id) = self.id {
            builder = builder.id(id);
        }
        if let Some(title) = self.title {
            builder = builder.title(title);
        }
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        if let Some(genre_name) = self.genre_name {
            builder = builder.genre_name(genre_name);
        }
        if let Some(author_name) = self.author_name {
            builder = builder.author_name(author_name);
        }
        if let Some(img) = self.img {
            builder = builder.img(img);
        }
        if let Some(date) = self.release_date.as_deref().and_then(parse_release_date) {
            builder = builder.release_date(date);
        }

        builder.build()
    }

    /// 수량이 없으면 1개로 취급한다.
    pub fn into_basket_item(self) -> Result<BasketItem, ItemError> {
        let quantity = self.quantity.filter(|q| *q >= 1).unwrap_or(1);
        BasketItem::new(self.into_book()?, quantity)
    }
}

fn parse_release_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let date = NaiveDate::parse_from_str(s, RELEASE_DATE_FORMAT).ok();
    if date.is_none() {
        warn!(release_date = s, "Unparsable release date, ignoring");
    }
    date
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawGenre {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub img: Option<String>,
}

impl RawGenre {
    pub fn into_genre(self) -> Result<Genre, ItemError> {
        let id = self.id.ok_or_else(|| ItemError::RequireArgumentMissing("id".to_owned()))?;
        let name = self.name.ok_or_else(|| ItemError::RequireArgumentMissing("name".to_owned()))?;
        Genre::new(id, name, self.img)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawAuthor {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub info: Option<String>,
    pub img: Option<String>,
    pub books: Option<Value>,
}

impl RawAuthor {
    pub fn into_author(self) -> Result<Author, ItemError> {
        let id = self.id.ok_or_else(|| ItemError::RequireArgumentMissing("id".to_owned()))?;
        let name = self.name.ok_or_else(|| ItemError::RequireArgumentMissing("name".to_owned()))?;
        Ok(Author::new(id, name)?
            .with_info(self.info)
            .with_img(self.img))
    }

    /// 저자의 도서 목록 중 잘못된 항목은 건너뛴다. 저자 이름이 빠진 도서에는 저자 이름을 채운다.
    pub fn into_detail(mut self) -> Result<AuthorDetail, ApiError> {
        let books = self.books.take();
        let author = self.into_author()
            .map_err(|e| ApiError::Decode(format!("author: {}", e)))?;

        let books = match books {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => narrow_list(value, "author book", |mut raw: RawBook| {
                if raw.author_name.as_deref().map_or(true, |n| n.trim().is_empty()) {
                    raw.author_name = Some(author.name().to_owned());
                }
                raw.into_book()
            })?,
        };

        Ok(AuthorDetail { author, books })
    }
}

#[derive(Debug, Deserialize)]
pub struct RawProfile {
    pub id: u64,
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role_id: Option<u64>,
}

impl From<RawProfile> for Profile {
    fn from(raw: RawProfile) -> Self {
        Profile {
            id: raw.id,
            nickname: raw.nickname,
            email: raw.email,
            role: raw.role_id.map(Role::from_role_id).unwrap_or(Role::Customer),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl From<RawToken> for Token {
    fn from(raw: RawToken) -> Self {
        Token {
            access_token: raw.access_token,
            token_type: raw.token_type.unwrap_or_else(|| "bearer".to_owned()),
            nickname: raw.nickname.filter(|n| !n.trim().is_empty()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawMessage {
    pub message: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
}

impl From<RawMessage> for PurchaseReceipt {
    fn from(raw: RawMessage) -> Self {
        PurchaseReceipt { message: raw.message }
    }
}

impl From<RawMessage> for Created {
    fn from(raw: RawMessage) -> Self {
        Created { title: raw.title, name: raw.name, message: raw.message }
    }
}

/// 목록 응답을 검증한다.
///
/// 응답이 배열이 아니면 [`ApiError::Decode`]를 반환하고, 변환에 실패한 항목은
/// 경고 로그를 남기고 건너뛴다. 잘못된 항목 하나 때문에 화면 전체가 실패하지 않도록 한다.
pub fn narrow_list<R, T, F>(value: Value, kind: &str, convert: F) -> Result<Vec<T>, ApiError>
where
    R: DeserializeOwned,
    F: Fn(R) -> Result<T, ItemError>,
{
    let entries = match value {
        Value::Array(entries) => entries,
        other => {
            warn!(kind, body = %other, "Expected an array response");
            return Err(ApiError::Decode(format!("invalid data format for {} list", kind)));
        }
    };

    let mut results = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let converted = serde_json::from_value::<R>(entry)
            .map_err(|e| ItemError::InvalidValue(e.to_string()))
            .and_then(&convert);
        match converted {
            Ok(item) => results.push(item),
            Err(err) => warn!(kind, index, error = %err, "Skipping malformed entry"),
        }
    }
    Ok(results)
}

/// 단건 응답을 역직렬화 한다.
pub fn narrow_one<R: DeserializeOwned>(value: Value, kind: &str) -> Result<R, ApiError> {
    serde_json::from_value::<R>(value)
        .map_err(|e| ApiError::Decode(format!("{}: {}", kind, e)))
}

/// 에러 응답 본문에서 사용자에게 보여줄 메시지를 추출한다.
///
/// `detail`이 문자열이면 그대로, 검증 에러 배열이면 각 항목의 `msg`를 이어 붙인다.
///
/// # Example
/// ```
/// use book_shop_client::provider::api::dto::error_message;
///
/// assert_eq!(error_message(r#"{"detail":"Book not found"}"#), Some("Book not found".to_owned()));
/// assert_eq!(error_message("plain text"), Some("plain text".to_owned()));
/// assert_eq!(error_message(""), None);
/// ```
pub fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) => return Some(body.to_owned()),
    };

    match value.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        Some(Value::Array(entries)) => {
            let messages: Vec<&str> = entries.iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        Some(other) => Some(other.to_string()),
        None => value.get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| Some(body.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn narrow_list_skips_entries_without_id_or_title() {
        let value = json!([
            {"id": "b1", "title": "Dune", "price": 1000.0},
            {"title": "No id"},
            {"id": 7},
            {"id": 8, "title": "Numeric", "price": "12.50", "is_favorite": true}
        ]);

        let books = narrow_list(value, "book", RawBook::into_book).unwrap();

        assert_eq!(books.len(), 2);
        assert_eq!(books[0].id().as_str(), "b1");
        assert_eq!(books[1].id().as_str(), "8");
        assert_eq!(books[1].price(), 12.5);
        assert!(books[1].is_favorite());
    }

    #[test]
    fn narrow_list_rejects_non_array() {
        let result = narrow_list(json!({"detail": "oops"}), "book", RawBook::into_book);

        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn malformed_optional_fields_do_not_drop_entry() {
        let value = json!([
            {"id": "b1", "title": "Dune", "favorites_count": "many", "release_date": "soon"}
        ]);

        let books = narrow_list(value, "book", RawBook::into_book).unwrap();

        assert_eq!(books[0].favorites_count(), 0);
        assert_eq!(books[0].release_date(), None);
    }

    #[test]
    fn basket_item_defaults_quantity_to_one() {
        let value = json!([
            {"id": "b1", "title": "Dune", "price": 1000, "quantity": 2},
            {"id": "b2", "title": "Emma", "price": 10}
        ]);

        let items = narrow_list(value, "basket", RawBook::into_basket_item).unwrap();

        assert_eq!(items[0].quantity(), 2);
        assert_eq!(items[1].quantity(), 1);
    }

    #[test]
    fn author_detail_fills_author_name() {
        let raw: RawAuthor = serde_json::from_value(json!({
            "id": 3,
            "name": "Frank Herbert",
            "info": "",
            "books": [{"id": "b1", "title": "Dune"}, {"id": "", "title": "Broken"}]
        })).unwrap();

        let detail = raw.into_detail().unwrap();

        assert_eq!(detail.author.info(), None);
        assert_eq!(detail.books.len(), 1);
        assert_eq!(detail.books[0].author_name(), "Frank Herbert");
    }

    #[test]
    fn error_message_joins_validation_entries() {
        let body = r#"{"detail":[{"msg":"field required"},{"msg":"value is not a valid integer"}]}"#;

        assert_eq!(error_message(body), Some("field required; value is not a valid integer".to_owned()));
    }

    #[test]
    fn profile_role_from_role_id() {
        let raw: RawProfile = serde_json::from_value(json!({
            "id": 1, "nickname": "root", "email": "root@shop.kz", "role_id": 1
        })).unwrap();

        assert_eq!(Profile::from(raw).role, Role::Admin);
    }
}
