use crate::item::{Author, AuthorDetail, Genre};
use crate::catalog::filter::{self, FilterKey};
use crate::navigation::{Location, Route};
use crate::provider::api::ShopApi;
use crate::view::{ListingView, ViewState};
use std::sync::Arc;

pub trait Named {
    fn name(&self) -> &str;
}

impl Named for Genre {
    fn name(&self) -> &str {
        Genre::name(self)
    }
}

impl Named for Author {
    fn name(&self) -> &str {
        Author::name(self)
    }
}

/// 이름순으로 정렬하고 검색어가 있으면 이름에 검색어가 포함된 것만 남긴다. 대소문자는 구분하지 않는다.
pub fn sort_and_filter<T: Named>(items: Vec<T>, search: Option<&str>) -> Vec<T> {
    let search = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
    let mut items: Vec<T> = match search {
        Some(search) => items.into_iter()
            .filter(|item| item.name().to_lowercase().contains(&search))
            .collect(),
        None => items,
    };
    items.sort_by_cached_key(|item| item.name().to_lowercase());
    items
}

fn search_param(location: &Location) -> Option<&str> {
    location.param(filter::SEARCH_KEY)
}

/// 장르 목록 화면
pub struct GenresView {
    api: Arc<dyn ShopApi>,
    view: ListingView<Genre>,
}

impl GenresView {
    pub fn new(api: Arc<dyn ShopApi>) -> Self {
        GenresView { api, view: ListingView::new("genres") }
    }

    pub fn load(&self, location: &Location) -> ViewState<Genre> {
        let search = search_param(location);
        self.view.load(|| self.api.list_genres().map(|genres| sort_and_filter(genres, search)))
    }

    pub fn state(&self) -> ViewState<Genre> {
        self.view.state()
    }

    /// 장르를 고르면 다른 조건 없이 해당 장르로 걸러진 카탈로그로 이동한다.
    ///
    /// # Example
    /// ```
    /// use book_shop_client::catalog::reference::GenresView;
    /// use book_shop_client::item::Genre;
    ///
    /// let genre = Genre::new(1, "Science Fiction", None).unwrap();
    /// assert_eq!(GenresView::shop_location(&genre).to_string(), "/?genre_name=Science+Fiction");
    /// ```
    pub fn shop_location(genre: &Genre) -> Location {
        filter::apply_edit(&Route::Shop.location(), FilterKey::GenreName, genre.name())
    }
}

/// 저자 목록 화면
pub struct AuthorsView {
    api: Arc<dyn ShopApi>,
    view: ListingView<Author>,
}

impl AuthorsView {
    pub fn new(api: Arc<dyn ShopApi>) -> Self {
        AuthorsView { api, view: ListingView::new("authors") }
    }

    pub fn load(&self, location: &Location) -> ViewState<Author> {
        let search = search_param(location);
        self.view.load(|| self.api.list_authors().map(|authors| sort_and_filter(authors, search)))
    }

    pub fn state(&self) -> ViewState<Author> {
        self.view.state()
    }
}

/// 저자 상세 화면, 저자 정보와 저자의 책 목록을 함께 보여준다.
pub struct AuthorDetailView {
    api: Arc<dyn ShopApi>,
    view: ListingView<AuthorDetail>,
}

impl AuthorDetailView {
    pub fn new(api: Arc<dyn ShopApi>) -> Self {
        AuthorDetailView { api, view: ListingView::new("author") }
    }

    pub fn load(&self, id: u64) -> ViewState<AuthorDetail> {
        self.view.load(|| self.api.get_author(id).map(|detail| vec![detail]))
    }

    pub fn detail(&self) -> Option<AuthorDetail> {
        self.view.items().into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::api::ApiError;
    use crate::testing::{book, FakeApi};

    fn genres() -> Vec<Genre> {
        ["fantasy", "Drama", "Science Fiction"].iter()
            .enumerate()
            .map(|(i, name)| Genre::new(i as u64 + 1, *name, None).unwrap())
            .collect()
    }

    fn names<T: Named>(items: &[T]) -> Vec<&str> {
        items.iter().map(|item| item.name()).collect()
    }

    #[test]
    fn genres_are_sorted_by_name() {
        let api = Arc::new(FakeApi::new());
        api.set_genres(genres());
        let view = GenresView::new(api);

        let state = view.load(&Location::parse("/genres"));

        assert_eq!(names(state.items()), vec!["Drama", "fantasy", "Science Fiction"]);
    }

    #[test]
    fn search_filters_names_case_insensitively() {
        let api = Arc::new(FakeApi::new());
        api.set_genres(genres());
        let view = GenresView::new(api);

        let state = view.load(&Location::parse("/genres?search=FICT"));
        assert_eq!(names(state.items()), vec!["Science Fiction"]);

        let state = view.load(&Location::parse("/genres?search=poetry"));
        assert_eq!(state, ViewState::Empty);
    }

    #[test]
    fn selected_genre_opens_filtered_catalog() {
        let genre = Genre::new(2, "Drama", None).unwrap();

        let location = GenresView::shop_location(&genre);

        assert_eq!(Route::from_path(location.path()), Route::Shop);
        assert_eq!(filter::Filters::from_location(&location).genre_name, "Drama");
        assert_eq!(location.query().len(), 1);
    }

    #[test]
    fn author_detail_includes_books() {
        let api = Arc::new(FakeApi::new());
        api.set_authors(vec![Author::new(3, "Author").unwrap()]);
        api.set_books(vec![book("b1", "Dune", 1000.0)]);
        let view = AuthorDetailView::new(api.clone());

        view.load(3);

        let detail = view.detail().unwrap();
        assert_eq!(detail.author.name(), "Author");
        assert_eq!(detail.books.len(), 1);
        assert_eq!(api.calls(), vec!["get_author:3"]);
    }

    #[test]
    fn missing_author_is_an_error_state() {
        let api = Arc::new(FakeApi::new());
        api.fail_next("list_authors", ApiError::from_status(500, "Internal Server Error".into()));
        let authors = AuthorsView::new(api.clone());
        let detail = AuthorDetailView::new(api);

        assert_eq!(authors.load(&Location::parse("/authors")).error(), Some("Internal Server Error"));
        assert!(detail.load(42).error().is_some());
        assert!(detail.detail().is_none());
    }
}
