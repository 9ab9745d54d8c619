pub mod controller;
pub mod detail;
pub mod favorites;
pub mod filter;
pub mod info;
pub mod reference;

use crate::item::{Book, BookId};
use crate::optimistic::{self, Applied, NotFound};
use crate::provider::api::{ApiError, ShopApi};
use crate::view::ListingView;
use thiserror::Error;
use tracing::info;

pub use controller::CatalogController;
pub use filter::{FilterKey, Filters};

#[derive(Error, Debug)]
pub enum CatalogError {
    /// 로그인 화면으로 이동 되었다.
    #[error("Login required")]
    LoginRequired,

    #[error("Book {0} is not in the current listing")]
    UnknownBook(BookId),

    #[error("Nothing is loaded yet")]
    NotLoaded,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// 목록에 있는 책의 즐겨찾기 상태를 뒤집는다.
///
/// 화면을 먼저 바꾸고 실패하면 되돌린다. 이미 즐겨찾기에 없는 책을 해제하는 경우(404)는 성공으로 본다.
/// 변경 후의 즐겨찾기 여부를 반환한다.
pub(crate) fn toggle_favorite(api: &dyn ShopApi, view: &ListingView<Book>, id: &BookId) -> Result<bool, CatalogError> {
    let entry = view.entry(|book: &Book| book.id() == id);
    let current = entry.get()
        .map(|book| book.is_favorite())
        .ok_or_else(|| CatalogError::UnknownBook(id.clone()))?;
    let target = !current;

    let (call, not_found): (Box<dyn FnOnce() -> Result<(), ApiError> + '_>, _) = if target {
        (Box::new(|| api.add_favorite(id)), NotFound::Rollback)
    } else {
        (Box::new(|| api.remove_favorite(id)), NotFound::Accept)
    };
    let applied = optimistic::mutate(
        &entry,
        |entry| {
            entry.modify(|book| book.set_favorite(target));
        },
        call,
        not_found,
    )?;

    if applied == Applied::AlreadyGone {
        info!(book = %id, "Favorite was already removed");
    } else {
        info!(book = %id, favorite = target, "Favorite updated");
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{book, FakeApi};

    fn loaded(books: Vec<Book>) -> ListingView<Book> {
        let view = ListingView::new("books");
        view.load(|| Ok(books));
        view
    }

    #[test]
    fn toggle_round_trips_favorite_state() {
        let api = FakeApi::new();
        let view = loaded(vec![book("b1", "Dune", 1000.0)]);
        let id = BookId::from("b1");

        assert_eq!(toggle_favorite(&api, &view, &id).unwrap(), true);
        assert_eq!(view.items()[0].favorites_count(), 1);
        assert_eq!(toggle_favorite(&api, &view, &id).unwrap(), false);

        assert!(!view.items()[0].is_favorite());
        assert_eq!(view.items()[0].favorites_count(), 0);
        assert_eq!(api.calls(), vec!["add_favorite:b1", "remove_favorite:b1"]);
    }

    #[test]
    fn failed_toggle_rolls_back() {
        let api = FakeApi::new();
        api.fail_next("add_favorite", ApiError::from_status(500, "boom".into()));
        let view = loaded(vec![book("b1", "Dune", 1000.0)]);

        let result = toggle_favorite(&api, &view, &BookId::from("b1"));

        assert!(matches!(result, Err(CatalogError::Api(ApiError::Server { .. }))));
        assert!(!view.items()[0].is_favorite());
    }

    #[test]
    fn unknown_book_is_rejected_without_call() {
        let api = FakeApi::new();
        let view = loaded(vec![book("b1", "Dune", 1000.0)]);

        let result = toggle_favorite(&api, &view, &BookId::from("b2"));

        assert!(matches!(result, Err(CatalogError::UnknownBook(_))));
        assert!(api.calls().is_empty());
    }
}
