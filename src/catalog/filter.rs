use crate::navigation::Location;
use crate::provider::api::BookQuery;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const DEFAULT_SORT: &str = "date";

/// 전역 검색창이 사용하는 쿼리 파라미터
pub const SEARCH_KEY: &str = "search";

/// 카탈로그 필터 항목
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Title,
    AuthorName,
    GenreName,
    Year,
    SortBy,
}

impl FilterKey {
    pub const ALL: [FilterKey; 5] = [
        FilterKey::Title,
        FilterKey::AuthorName,
        FilterKey::GenreName,
        FilterKey::Year,
        FilterKey::SortBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKey::Title => "title",
            FilterKey::AuthorName => "author_name",
            FilterKey::GenreName => "genre_name",
            FilterKey::Year => "year",
            FilterKey::SortBy => "sort_by",
        }
    }
}

impl Display for FilterKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKey::ALL.into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown filter: {}", s))
    }
}

/// 카탈로그 필터 상태
///
/// URL 쿼리에서 읽고 다시 URL 쿼리로 쓰인다. 값이 없는 항목은 빈 문자열이고,
/// 정렬은 기본값 `date`를 가진다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub title: String,
    pub author_name: String,
    pub genre_name: String,
    pub year: String,
    pub sort_by: String,
}

impl Default for Filters {
    fn default() -> Self {
        Filters {
            title: String::new(),
            author_name: String::new(),
            genre_name: String::new(),
            year: String::new(),
            sort_by: DEFAULT_SORT.to_owned(),
        }
    }
}

impl Filters {
    pub fn get(&self, key: FilterKey) -> &str {
        match key {
            FilterKey::Title => &self.title,
            FilterKey::AuthorName => &self.author_name,
            FilterKey::GenreName => &self.genre_name,
            FilterKey::Year => &self.year,
            FilterKey::SortBy => &self.sort_by,
        }
    }

    /// 값을 바꾼다. 정렬 값이 비어있으면 기본값으로 돌아간다.
    pub fn set(&mut self, key: FilterKey, value: &str) {
        let value = value.to_owned();
        match key {
            FilterKey::Title => self.title = value,
            FilterKey::AuthorName => self.author_name = value,
            FilterKey::GenreName => self.genre_name = value,
            FilterKey::Year => self.year = value,
            FilterKey::SortBy if value.is_empty() => self.sort_by = DEFAULT_SORT.to_owned(),
            FilterKey::SortBy => self.sort_by = value,
        }
    }

    /// URL 쿼리를 필터로 변환한다.
    ///
    /// 지정되지 않은 항목은 기본값이 된다. `search`가 있으면 개별 필터보다 우선하여
    /// 제목 검색어가 되고 저자, 장르, 연도 필터는 비워진다.
    ///
    /// # Example
    /// ```
    /// use book_shop_client::catalog::filter::Filters;
    /// use book_shop_client::navigation::Location;
    ///
    /// let filters = Filters::from_location(&Location::parse("/shop?search=Dune&genre_name=Drama&year=1965"));
    /// assert_eq!(filters.title, "Dune");
    /// assert_eq!(filters.genre_name, "");
    /// assert_eq!(filters.year, "");
    /// assert_eq!(filters.sort_by, "date");
    /// ```
    pub fn from_location(location: &Location) -> Self {
        let mut filters = Filters::default();
        for key in FilterKey::ALL {
            if let Some(value) = location.param(key.as_str()) {
                filters.set(key, value);
            }
        }

        if let Some(search) = location.param(SEARCH_KEY).filter(|s| !s.is_empty()) {
            filters.title = search.to_owned();
            filters.author_name.clear();
            filters.genre_name.clear();
            filters.year.clear();
        }
        filters
    }

    /// 비어있지 않은 항목만 URL 쿼리로 변환한다. [`Filters::from_location`]의 역함수이다.
    ///
    /// # Example
    /// ```
    /// use book_shop_client::catalog::filter::Filters;
    /// use book_shop_client::navigation::Location;
    ///
    /// let mut filters = Filters::default();
    /// filters.genre_name = "Fiction".to_owned();
    ///
    /// let location = Location::new("/shop").with_query(filters.to_query());
    /// assert_eq!(location.to_string(), "/shop?genre_name=Fiction&sort_by=date");
    /// assert_eq!(Filters::from_location(&location), filters);
    /// ```
    pub fn to_query(&self) -> Vec<(String, String)> {
        FilterKey::ALL.into_iter()
            .filter(|key| !self.get(*key).is_empty())
            .map(|key| (key.as_str().to_owned(), self.get(key).to_owned()))
            .collect()
    }

    /// 카탈로그 조회 조건으로 변환한다.
    pub fn to_book_query(&self) -> BookQuery {
        FilterKey::ALL.into_iter()
            .fold(BookQuery::builder(), |builder, key| builder.param(key.as_str(), self.get(key)))
            .build()
    }

    /// 기본값과 다른 항목이 있는지
    pub fn is_active(&self) -> bool {
        self != &Filters::default()
    }
}

/// 사용자가 필터 하나를 수정했을 때 쓰일 URL을 만든다.
///
/// 수정된 항목만 URL에 쓰고 값이 비어있으면 키를 제거한다. 검색어로 들어온 화면이라면
/// `search`를 `title`로 옮겨 현재 보이는 필터 상태가 유지되도록 한다.
pub fn apply_edit(current: &Location, key: FilterKey, value: &str) -> Location {
    let mut location = current.clone();
    if let Some(search) = location.param(SEARCH_KEY).map(str::to_owned) {
        location.remove_param(SEARCH_KEY);
        for cleared in [FilterKey::AuthorName, FilterKey::GenreName, FilterKey::Year] {
            location.remove_param(cleared.as_str());
        }
        location.set_param(FilterKey::Title.as_str(), &search);
    }
    location.set_param(key.as_str(), value);
    location
}
