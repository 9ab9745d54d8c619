use crate::catalog::CatalogError;
use crate::item::{Book, BookId};
use crate::navigation::{self, Navigator};
use crate::optimistic::{self, NotFound};
use crate::provider::api::ShopApi;
use crate::session::SessionStore;
use crate::view::{ListingView, ViewState};
use std::sync::Arc;
use tracing::info;

/// 즐겨찾기 화면
pub struct FavoritesView {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    view: ListingView<Book>,
}

impl FavoritesView {
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        FavoritesView { api, session, navigator, view: ListingView::new("favorites") }
    }

    /// 로그인 상태가 아니라면 조회하지 않고 로그인 화면으로 이동한다.
    pub fn load(&self) -> ViewState<Book> {
        if !navigation::require_session(&self.session, &self.navigator) {
            self.view.reset();
            return self.view.state();
        }
        self.view.load(|| self.api.list_favorites())
    }

    pub fn state(&self) -> ViewState<Book> {
        self.view.state()
    }

    /// 목록에서 먼저 지우고 요청한다. 실패하면 원래 자리에 되돌리고, 서버에 이미 없다면(404) 지운 상태를 유지한다.
    pub fn remove(&self, id: &BookId) -> Result<(), CatalogError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(CatalogError::LoginRequired);
        }
        let entry = self.view.entry(|book: &Book| book.id() == id);
        optimistic::mutate(
            &entry,
            |entry| {
                entry.remove();
            },
            || self.api.remove_favorite(id),
            NotFound::Accept,
        )?;
        info!(book = %id, "Removed from favorites");
        Ok(())
    }
}
