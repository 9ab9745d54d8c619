use crate::catalog::filter::{self, FilterKey, Filters};
use crate::catalog::{self, CatalogError};
use crate::item::{Book, BookId};
use crate::navigation::{self, Location, Navigator};
use crate::provider::api::ShopApi;
use crate::session::SessionStore;
use crate::view::{ListingView, Ticket, ViewState};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// 마지막으로 조회를 시작한 조건, 필터와 세션 토큰이 모두 같으면 다시 조회하지 않는다.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchKey {
    filters: Filters,
    token: Option<String>,
}

/// 카탈로그 화면 컨트롤러
///
/// 현재 주소의 쿼리가 필터 상태의 원본이다. 필터 수정은 주소를 교체(replace)하고,
/// 주소에서 읽은 필터가 바뀔 때마다 정확히 한 번 조회한다. 연속된 조회는 시작 순서로
/// 정렬되어 늦게 도착한 이전 응답이 최신 결과를 덮어쓰지 않는다.
pub struct CatalogController {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    view: ListingView<Book>,
    last: Mutex<Option<FetchKey>>,
}

impl CatalogController {
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        CatalogController {
            api,
            session,
            navigator,
            view: ListingView::new("catalog"),
            last: Mutex::new(None),
        }
    }

    pub fn filters(&self) -> Filters {
        Filters::from_location(&self.navigator.current())
    }

    pub fn state(&self) -> ViewState<Book> {
        self.view.state()
    }

    pub fn has_active_filters(&self) -> bool {
        self.filters().is_active()
    }

    /// 주소가 바뀌었을 때 호출한다. 필터나 세션이 이전 조회와 다를 때만 조회한다.
    pub fn on_navigation(&self) -> ViewState<Book> {
        if let Some((ticket, filters)) = self.begin_if_changed() {
            self.fetch(ticket, &filters);
        }
        self.view.state()
    }

    /// 조건이 같더라도 다시 조회한다.
    pub fn refresh(&self) -> ViewState<Book> {
        if let Some((ticket, filters)) = self.begin(true) {
            self.fetch(ticket, &filters);
        }
        self.view.state()
    }

    /// 필터 하나를 수정한다. 기록이 쌓이지 않도록 현재 주소를 교체한 뒤 조회한다.
    pub fn set_filter(&self, key: FilterKey, value: &str) -> ViewState<Book> {
        let location = filter::apply_edit(&self.navigator.current(), key, value);
        debug!(%key, value, to = %location, "Filter edited");
        self.navigator.replace(location);
        self.on_navigation()
    }

    /// 모든 필터를 지운다.
    pub fn reset_filters(&self) -> ViewState<Book> {
        let current = self.navigator.current();
        self.navigator.replace(Location::new(current.path()));
        self.on_navigation()
    }

    pub fn toggle_favorite(&self, id: &BookId) -> Result<bool, CatalogError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(CatalogError::LoginRequired);
        }
        catalog::toggle_favorite(self.api.as_ref(), &self.view, id)
    }

    /// 장바구니에 한 권을 담는다. 로그인 상태가 아니라면 API를 호출하지 않고 로그인 화면으로 이동한다.
    pub fn add_to_cart(&self, id: &BookId) -> Result<(), CatalogError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(CatalogError::LoginRequired);
        }
        self.api.add_basket_item(id, 1)?;
        info!(book = %id, "Added to basket");
        Ok(())
    }

    /// 조회 조건이 바뀌었다면 순번을 발급한다.
    pub(crate) fn begin_if_changed(&self) -> Option<(Ticket, Filters)> {
        self.begin(false)
    }

    pub(crate) fn fetch(&self, ticket: Ticket, filters: &Filters) -> bool {
        let result = self.api.list_books(&filters.to_book_query());
        self.view.finish(ticket, result)
    }

    // 조건 비교와 순번 발급은 같은 잠금 안에서 이루어져야 순번이 조건 변경 순서를 따른다.
    fn begin(&self, force: bool) -> Option<(Ticket, Filters)> {
        let filters = self.filters();
        let key = FetchKey { filters: filters.clone(), token: self.session.token() };

        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if !force && last.as_ref() == Some(&key) {
            return None;
        }
        *last = Some(key);
        Some((self.view.begin(), filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Route;
    use crate::provider::api::ApiError;
    use crate::session::storage::MemoryStorage;
    use crate::session::Session;
    use crate::testing::{book, FakeApi};

    struct Fixture {
        api: Arc<FakeApi>,
        session: Arc<SessionStore>,
        navigator: Arc<Navigator>,
        controller: CatalogController,
    }

    fn fixture(logged_in: bool) -> Fixture {
        let api = Arc::new(FakeApi::new());
        let storage = if logged_in {
            MemoryStorage::with_session(Session::new("abc"))
        } else {
            MemoryStorage::new()
        };
        let session = Arc::new(SessionStore::open(Box::new(storage)));
        let navigator = Arc::new(Navigator::default());
        let controller = CatalogController::new(api.clone(), session.clone(), navigator.clone());
        Fixture { api, session, navigator, controller }
    }

    #[test]
    fn fetches_once_per_filter_change() {
        let f = fixture(false);
        f.api.set_books(vec![book("b1", "Dune", 1000.0)]);

        f.controller.on_navigation();
        f.controller.on_navigation();
        f.controller.set_filter(FilterKey::GenreName, "Fiction");
        f.controller.set_filter(FilterKey::GenreName, "Fiction");

        assert_eq!(f.api.calls(), vec![
            "list_books:sort_by=date",
            "list_books:genre_name=Fiction&sort_by=date",
        ]);
        assert_eq!(f.navigator.current().to_string(), "/?genre_name=Fiction");
        assert_eq!(f.navigator.history_len(), 1);
    }

    #[test]
    fn empty_result_shows_no_results_with_reset() {
        let f = fixture(false);

        let state = f.controller.set_filter(FilterKey::GenreName, "Fiction");

        assert_eq!(state, ViewState::Empty);
        assert!(f.controller.has_active_filters());

        f.controller.reset_filters();
        assert!(!f.controller.has_active_filters());
        assert_eq!(f.navigator.current().to_string(), "/");
    }

    #[test]
    fn late_response_of_older_filters_is_discarded() {
        let f = fixture(false);
        f.navigator.replace(Location::parse("/?title=A"));
        let (a, filters_a) = f.controller.begin_if_changed().unwrap();
        f.navigator.replace(Location::parse("/?title=B"));
        let (b, filters_b) = f.controller.begin_if_changed().unwrap();

        f.api.set_books(vec![book("b", "B", 1.0)]);
        assert!(f.controller.fetch(b, &filters_b));
        f.api.set_books(vec![book("a", "A", 1.0)]);
        assert!(!f.controller.fetch(a, &filters_a));

        let titles: Vec<String> = f.controller.state().items().iter().map(|b| b.title().to_owned()).collect();
        assert_eq!(titles, vec!["B"]);
    }

    #[test]
    fn login_change_triggers_refetch() {
        let f = fixture(false);
        f.controller.on_navigation();

        f.session.set(Session::new("abc")).unwrap();
        f.controller.on_navigation();

        assert_eq!(f.api.calls_to("list_books"), 2);
    }

    #[test]
    fn anonymous_add_to_cart_redirects_without_call() {
        let f = fixture(false);

        let result = f.controller.add_to_cart(&BookId::from("b1"));

        assert!(matches!(result, Err(CatalogError::LoginRequired)));
        assert_eq!(f.navigator.current_route(), Route::Login);
        assert_eq!(f.api.calls_to("add_basket_item"), 0);
    }

    #[test]
    fn add_to_cart_adds_single_copy() {
        let f = fixture(true);

        f.controller.add_to_cart(&BookId::from("b1")).unwrap();

        assert_eq!(f.api.calls(), vec!["add_basket_item:b1:1"]);
    }

    #[test]
    fn fetch_error_is_shown_and_results_cleared() {
        let f = fixture(false);
        f.api.set_books(vec![book("b1", "Dune", 1000.0)]);
        f.controller.on_navigation();
        f.api.fail_next("list_books", ApiError::Timeout("10s".into()));

        let state = f.controller.refresh();

        assert_eq!(state, ViewState::Failed("10s".to_owned()));
    }

    #[test]
    fn search_location_is_reflected_in_fetch() {
        let f = fixture(false);
        f.navigator.push(Location::parse("/shop?search=Dune&genre_name=Drama"));

        f.controller.on_navigation();

        assert_eq!(f.api.calls(), vec!["list_books:title=Dune&sort_by=date"]);
    }
}
