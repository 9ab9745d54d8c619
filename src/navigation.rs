use crate::item::BookId;
use crate::session::{SessionEvent, SessionStore};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;
use url::form_urlencoded;

/// 화면 주소, 경로와 순서가 유지되는 쿼리 파라미터로 구성된다.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    path: String,
    query: Vec<(String, String)>,
}

impl Location {
    pub fn new<S: Into<String>>(path: S) -> Self {
        let path = path.into();
        let path = if path.is_empty() { "/".to_owned() } else { path };
        Location { path, query: Vec::new() }
    }

    /// `path?query` 형태의 문자열을 읽는다. `#` 뒤의 내용은 무시한다.
    ///
    /// # Example
    /// ```
    /// use book_shop_client::navigation::Location;
    ///
    /// let location = Location::parse("/shop?genre_name=Science%20Fiction&year=2001");
    /// assert_eq!(location.path(), "/shop");
    /// assert_eq!(location.param("genre_name"), Some("Science Fiction"));
    /// assert_eq!(location.to_string(), "/shop?genre_name=Science+Fiction&year=2001");
    /// ```
    pub fn parse(s: &str) -> Self {
        let s = s.split('#').next().unwrap_or_default();
        let (path, query) = match s.split_once('?') {
            Some((path, query)) => (path, query),
            None => (s, ""),
        };
        let query = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Location { query, ..Location::new(path) }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 값이 비어있으면 키를 제거하고, 있으면 기존 위치를 유지한 채 값을 바꾸거나 뒤에 추가한다.
    pub fn set_param(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.remove_param(key);
            return;
        }
        match self.query.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.query.push((key.to_owned(), value.to_owned())),
        }
        let mut seen = false;
        self.query.retain(|(k, _)| {
            if k != key {
                return true;
            }
            let keep = !seen;
            seen = true;
            keep
        });
    }

    pub fn remove_param(&mut self, key: &str) {
        self.query.retain(|(k, _)| k != key);
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

/// 화면 목록
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Shop,
    Genres,
    Authors,
    Author(u64),
    Book(BookId),
    Favorites,
    Basket,
    Profile,
    Login,
    Register,
    Admin,
    Info,
    NotFound,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Shop => "/".to_owned(),
            Route::Genres => "/genres".to_owned(),
            Route::Authors => "/authors".to_owned(),
            Route::Author(id) => format!("/author/{}", id),
            Route::Book(id) => {
                let id: String = form_urlencoded::byte_serialize(id.as_str().as_bytes()).collect();
                format!("/book/{}", id)
            }
            Route::Favorites => "/favorites".to_owned(),
            Route::Basket => "/basket".to_owned(),
            Route::Profile => "/profile".to_owned(),
            Route::Login => "/login".to_owned(),
            Route::Register => "/register".to_owned(),
            Route::Admin => "/admin".to_owned(),
            Route::Info => "/info".to_owned(),
            Route::NotFound => "/404".to_owned(),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.path())
    }

    /// 경로로 화면을 찾는다. `/shop`은 카탈로그 화면의 별칭이다.
    pub fn from_path(path: &str) -> Route {
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] | ["shop"] => Route::Shop,
            ["genres"] => Route::Genres,
            ["authors"] => Route::Authors,
            ["author", id] => id.parse().map(Route::Author).unwrap_or(Route::NotFound),
            ["book", id] => {
                let id: String = form_urlencoded::parse(format!("id={}", id).as_bytes())
                    .map(|(_, v)| v.into_owned())
                    .next()
                    .unwrap_or_default();
                Route::Book(BookId::new(id))
            }
            ["favorites"] => Route::Favorites,
            ["basket"] => Route::Basket,
            ["profile"] => Route::Profile,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["admin"] => Route::Admin,
            ["info"] => Route::Info,
            _ => Route::NotFound,
        }
    }

    /// 로그인이 필요한 화면인지
    pub fn requires_session(&self) -> bool {
        matches!(self, Route::Favorites | Route::Basket | Route::Profile | Route::Admin)
    }
}

/// 전역 검색창의 검색어를 현재 화면에 맞는 검색 주소로 바꾼다.
/// 검색어가 비어있거나 검색을 지원하지 않는 화면이면 `None`을 반환한다.
///
/// # Example
/// ```
/// use book_shop_client::navigation::{search_location, Route};
///
/// assert_eq!(search_location(&Route::Shop, "dune").unwrap().to_string(), "/shop?search=dune");
/// assert_eq!(search_location(&Route::Genres, "  "), None);
/// assert_eq!(search_location(&Route::Basket, "dune"), None);
/// ```
pub fn search_location(current: &Route, query: &str) -> Option<Location> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let path = match current {
        Route::Shop => "/shop",
        Route::Genres => "/genres",
        Route::Authors => "/authors",
        _ => return None,
    };
    Some(Location::new(path).with_query(vec![("search".to_owned(), query.to_owned())]))
}

/// 메모리에 유지되는 화면 이동 기록
///
/// `push`는 기록을 쌓고 `replace`는 현재 항목을 교체한다.
pub struct Navigator {
    entries: Mutex<Vec<Location>>,
}

impl Navigator {
    pub fn new(start: Location) -> Self {
        Navigator { entries: Mutex::new(vec![start]) }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Location>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Location {
        self.entries().last().cloned().unwrap_or_default()
    }

    pub fn current_route(&self) -> Route {
        Route::from_path(self.current().path())
    }

    pub fn push(&self, location: Location) {
        info!(to = %location, "Navigate");
        self.entries().push(location);
    }

    pub fn replace(&self, location: Location) {
        let mut entries = self.entries();
        match entries.last_mut() {
            Some(last) => *last = location,
            None => entries.push(location),
        }
    }

    /// 이전 화면으로 돌아간다. 첫 화면에서는 아무것도 하지 않는다.
    pub fn back(&self) -> Option<Location> {
        let mut entries = self.entries();
        if entries.len() <= 1 {
            return None;
        }
        entries.pop();
        entries.last().cloned()
    }

    pub fn history_len(&self) -> usize {
        self.entries().len()
    }

    pub fn redirect_to_login(&self) {
        if self.current_route() != Route::Login {
            self.push(Route::Login.location());
        }
    }

    /// 세션이 만료되면 로그인 화면으로 이동하도록 구독한다.
    pub fn follow_session(self: &Arc<Self>, session: &SessionStore) {
        let navigator = Arc::downgrade(self);
        session.subscribe(move |event| {
            if event == SessionEvent::Expired {
                if let Some(navigator) = navigator.upgrade() {
                    navigator.redirect_to_login();
                }
            }
        });
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Navigator::new(Route::Shop.location())
    }
}

/// 로그인이 필요한 동작 전에 호출한다. 세션이 없으면 로그인 화면으로 이동하고 `false`를 반환한다.
pub fn require_session(session: &SessionStore, navigator: &Navigator) -> bool {
    if session.is_authenticated() {
        return true;
    }
    navigator.redirect_to_login();
    false
}
