use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Item 모듈에서 사용할 에러 열거
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// 필수 데이터가 입력 되지 않음
    #[error("Required argument missing: {0}")]
    RequireArgumentMissing(String),

    /// 허용 범위를 벗어난 값
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// 도서 아이디
///
/// 아이디는 백엔드에서 발급되며 문자열 혹은 숫자로 내려올 수 있다.
/// 클라이언트는 두 형태 모두 문자열로 정규화 하여 보관한다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId(String);

impl BookId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        BookId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Display for BookId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookId {
    fn from(value: &str) -> Self {
        BookId(value.to_owned())
    }
}

impl From<String> for BookId {
    fn from(value: String) -> Self {
        BookId(value)
    }
}

impl AsRef<str> for BookId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for BookId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BookId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => BookId(s),
            RawId::Signed(n) => BookId(n.to_string()),
            RawId::Unsigned(n) => BookId(n.to_string()),
        })
    }
}

/// 도서
///
/// 백엔드가 소유하는 데이터로 클라이언트는 각 화면마다 읽기 위주의 사본을 가진다.
/// `is_favorite`는 현재 세션을 기준으로 계산된 값이다.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    id: BookId,
    title: String,
    author_name: String,
    genre_name: String,
    description: String,
    price: f64,
    release_date: Option<NaiveDate>,
    img: Option<String>,
    is_favorite: bool,
    favorites_count: u32,
}

impl Book {
    pub fn builder() -> BookBuilder {
        BookBuilder::new()
    }

    pub fn id(&self) -> &BookId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    pub fn genre_name(&self) -> &str {
        &self.genre_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn release_date(&self) -> Option<NaiveDate> {
        self.release_date
    }

    pub fn img(&self) -> Option<&str> {
        self.img.as_deref()
    }

    pub fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    pub fn favorites_count(&self) -> u32 {
        self.favorites_count
    }

    /// 즐겨찾기 여부를 변경하고 즐겨찾기 수를 함께 보정한다.
    /// 이미 같은 상태라면 아무것도 하지 않는다.
    pub fn set_favorite(&mut self, favorite: bool) {
        if self.is_favorite == favorite {
            return;
        }
        self.is_favorite = favorite;
        if favorite {
            self.favorites_count = self.favorites_count.saturating_add(1);
        } else {
            self.favorites_count = self.favorites_count.saturating_sub(1);
        }
    }
}

#[derive(Debug, Default)]
pub struct BookBuilder {
    id: Option<BookId>,
    title: Option<String>,
    author_name: Option<String>,
    genre_name: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    release_date: Option<NaiveDate>,
    img: Option<String>,
    is_favorite: bool,
    favorites_count: u32,
}

impl BookBuilder {
    pub fn new() -> Self {
        BookBuilder::default()
    }

    pub fn id<I: Into<BookId>>(mut self, id: I) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author_name<S: Into<String>>(mut self, author_name: S) -> Self {
        self.author_name = Some(author_name.into());
        self
    }

    pub fn genre_name<S: Into<String>>(mut self, genre_name: S) -> Self {
        self.genre_name = Some(genre_name.into());
        self
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn release_date(mut self, release_date: NaiveDate) -> Self {
        self.release_date = Some(release_date);
        self
    }

    pub fn img<S: Into<String>>(mut self, img: S) -> Self {
        self.img = Some(img.into());
        self
    }

    pub fn is_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub fn favorites_count(mut self, favorites_count: u32) -> Self {
        self.favorites_count = favorites_count;
        self
    }

    /// 아이디와 제목이 없는 도서는 화면에 표시 할 수 없음으로 생성을 거부한다.
    pub fn build(self) -> Result<Book, ItemError> {
        let id = self.id
            .filter(|id| !id.is_blank())
            .ok_or_else(|| ItemError::RequireArgumentMissing("id".to_owned()))?;
        let title = self.title
            .filter(|title| !title.trim().is_empty())
            .ok_or_else(|| ItemError::RequireArgumentMissing("title".to_owned()))?;

        let price = self.price.unwrap_or(0.0);
        if !price.is_finite() || price < 0.0 {
            return Err(ItemError::InvalidValue(format!("price must be a non-negative number: {}", price)));
        }

        Ok(Book {
            id,
            title,
            author_name: self.author_name.unwrap_or_default(),
            genre_name: self.genre_name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            price,
            release_date: self.release_date,
            img: self.img.filter(|img| !img.trim().is_empty()),
            is_favorite: self.is_favorite,
            favorites_count: self.favorites_count,
        })
    }
}

/// 장바구니 라인
///
/// 수량은 항상 1 이상이며 0이 되는 순간 라인 자체가 삭제된다.
#[derive(Debug, Clone, PartialEq)]
pub struct BasketItem {
    book: Book,
    quantity: u32,
}

impl BasketItem {
    pub fn new(book: Book, quantity: u32) -> Result<Self, ItemError> {
        if quantity < 1 {
            return Err(ItemError::InvalidValue("basket quantity must be at least 1".to_owned()));
        }
        Ok(BasketItem { book, quantity })
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn id(&self) -> &BookId {
        self.book.id()
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn set_quantity(&mut self, quantity: u32) -> Result<(), ItemError> {
        if quantity < 1 {
            return Err(ItemError::InvalidValue("basket quantity must be at least 1".to_owned()));
        }
        self.quantity = quantity;
        Ok(())
    }

    pub fn line_total(&self) -> f64 {
        self.book.price() * f64::from(self.quantity)
    }
}

/// 장바구니 전체 금액을 계산한다.
///
/// # Example
/// ```
/// use book_shop_client::item::{total_price, BasketItem, Book};
///
/// let book = Book::builder().id("b1").title("Dune").price(1000.0).build().unwrap();
/// let items = vec![BasketItem::new(book, 3).unwrap()];
/// assert_eq!(total_price(&items), 3000.0);
/// ```
pub fn total_price(items: &[BasketItem]) -> f64 {
    items.iter().map(BasketItem::line_total).sum()
}

/// 장르
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genre {
    id: u64,
    name: String,
    img: Option<String>,
}

impl Genre {
    pub fn new<S: Into<String>>(id: u64, name: S, img: Option<String>) -> Result<Self, ItemError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ItemError::RequireArgumentMissing("name".to_owned()));
        }
        Ok(Genre { id, name, img: img.filter(|i| !i.trim().is_empty()) })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn img(&self) -> Option<&str> {
        self.img.as_deref()
    }
}

/// 저자
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    id: u64,
    name: String,
    info: Option<String>,
    img: Option<String>,
}

impl Author {
    pub fn new<S: Into<String>>(id: u64, name: S) -> Result<Self, ItemError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ItemError::RequireArgumentMissing("name".to_owned()));
        }
        Ok(Author { id, name, info: None, img: None })
    }

    pub fn with_info(mut self, info: Option<String>) -> Self {
        self.info = info.filter(|i| !i.trim().is_empty());
        self
    }

    pub fn with_img(mut self, img: Option<String>) -> Self {
        self.img = img.filter(|i| !i.trim().is_empty());
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn img(&self) -> Option<&str> {
        self.img.as_deref()
    }
}

/// 저자 상세 정보와 저자의 도서 목록
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorDetail {
    pub author: Author,
    pub books: Vec<Book>,
}

/// 사용자 권한
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    const ADMIN_ROLE_ID: u64 = 1;

    pub fn from_role_id(role_id: u64) -> Self {
        if role_id == Self::ADMIN_ROLE_ID {
            Role::Admin
        } else {
            Role::Customer
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "ADMIN"),
            Role::Customer => write!(f, "CUSTOMER"),
        }
    }
}

/// 로그인한 사용자의 프로필
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: u64,
    pub nickname: String,
    pub email: String,
    pub role: Role,
}
