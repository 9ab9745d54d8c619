use crate::catalog::{self, CatalogError};
use crate::item::{Book, BookId};
use crate::navigation::{self, Navigator};
use crate::provider::api::ShopApi;
use crate::session::SessionStore;
use crate::view::{ListingView, ViewState};
use std::sync::Arc;
use tracing::info;

/// 책 상세 화면
pub struct BookDetailView {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    view: ListingView<Book>,
}

impl BookDetailView {
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        BookDetailView { api, session, navigator, view: ListingView::new("book") }
    }

    pub fn load(&self, id: &BookId) -> ViewState<Book> {
        self.view.load(|| self.api.get_book(id).map(|book| vec![book]))
    }

    pub fn book(&self) -> Option<Book> {
        self.view.items().into_iter().next()
    }

    pub fn toggle_favorite(&self) -> Result<bool, CatalogError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(CatalogError::LoginRequired);
        }
        let book = self.book().ok_or(CatalogError::NotLoaded)?;
        catalog::toggle_favorite(self.api.as_ref(), &self.view, book.id())
    }

    pub fn add_to_basket(&self, quantity: u32) -> Result<(), CatalogError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(CatalogError::LoginRequired);
        }
        let book = self.book().ok_or(CatalogError::NotLoaded)?;
        self.api.add_basket_item(book.id(), quantity.max(1))?;
        info!(book = %book.id(), quantity, "Added to basket");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Route;
    use crate::session::storage::MemoryStorage;
    use crate::session::Session;
    use crate::testing::{book, FakeApi};

    fn view(api: Arc<FakeApi>, logged_in: bool) -> (BookDetailView, Arc<Navigator>) {
        let storage = if logged_in {
            MemoryStorage::with_session(Session::new("abc"))
        } else {
            MemoryStorage::new()
        };
        let session = Arc::new(SessionStore::open(Box::new(storage)));
        let navigator = Arc::new(Navigator::default());
        (BookDetailView::new(api, session, navigator.clone()), navigator)
    }

    #[test]
    fn loads_single_book_and_toggles_favorite() {
        let api = Arc::new(FakeApi::new());
        api.set_books(vec![book("b1", "Dune", 1000.0)]);
        let (view, _) = view(api.clone(), true);

        view.load(&BookId::from("b1"));
        assert_eq!(view.book().unwrap().title(), "Dune");

        assert!(view.toggle_favorite().unwrap());
        assert!(view.book().unwrap().is_favorite());
    }

    #[test]
    fn missing_book_is_an_error_state() {
        let api = Arc::new(FakeApi::new());
        let (view, _) = view(api, true);

        let state = view.load(&BookId::from("nope"));

        assert_eq!(state.error(), Some("Book not found"));
        assert!(matches!(view.toggle_favorite(), Err(CatalogError::NotLoaded)));
    }

    #[test]
    fn anonymous_user_is_sent_to_login() {
        let api = Arc::new(FakeApi::new());
        api.set_books(vec![book("b1", "Dune", 1000.0)]);
        let (view, navigator) = view(api.clone(), false);
        view.load(&BookId::from("b1"));

        assert!(matches!(view.add_to_basket(1), Err(CatalogError::LoginRequired)));
        assert_eq!(navigator.current_route(), Route::Login);
        assert_eq!(api.calls(), vec!["get_book:b1"]);
    }
}
