use crate::catalog::CatalogError;
use crate::item::{Book, BookId};
use crate::navigation::{self, Navigator};
use crate::provider::api::{ApiError, ShopApi};
use crate::session::SessionStore;
use crate::view::{ListingView, ViewState};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread;
use tracing::info;

/// 첫 화면의 도서 묶음
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Featured,
    NewReleases,
    Popular,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Featured, Section::NewReleases, Section::Popular];

    pub fn title(&self) -> &'static str {
        match self {
            Section::Featured => "Featured Books",
            Section::NewReleases => "New Releases",
            Section::Popular => "Popular Books",
        }
    }

    fn fetch(&self, api: &dyn ShopApi) -> Result<Vec<Book>, ApiError> {
        match self {
            Section::Featured => api.list_featured(),
            Section::NewReleases => api.list_new_releases(),
            Section::Popular => api.list_popular(),
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shelf {
    pub section: Section,
    pub books: Vec<Book>,
}

/// 첫 화면
///
/// 세 묶음을 동시에 조회하고 로딩과 에러 상태를 함께 쓴다. 하나라도 실패하면 화면 전체가 실패한다.
/// 비어있는 묶음은 보여주지 않으며, 모두 비어있다면 `Empty` 상태가 된다.
pub struct InfoView {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    view: ListingView<Shelf>,
}

impl InfoView {
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        InfoView { api, session, navigator, view: ListingView::new("info") }
    }

    pub fn load(&self) -> ViewState<Shelf> {
        let ticket = self.view.begin();
        let api = self.api.as_ref();
        let results: Vec<(Section, Result<Vec<Book>, ApiError>)> = thread::scope(|scope| {
            let handles: Vec<_> = Section::ALL.iter()
                .map(|&section| (section, scope.spawn(move || section.fetch(api))))
                .collect();
            handles.into_iter()
                .map(|(section, handle)| {
                    let result = handle.join()
                        .unwrap_or_else(|_| Err(ApiError::Transport(format!("{} request aborted", section))));
                    (section, result)
                })
                .collect()
        });

        let shelves = results.into_iter()
            .map(|(section, result)| result.map(|books| Shelf { section, books }))
            .filter(|shelf| shelf.as_ref().map_or(true, |shelf| !shelf.books.is_empty()))
            .collect::<Result<Vec<_>, _>>();
        self.view.finish(ticket, shelves);
        self.view.state()
    }

    pub fn state(&self) -> ViewState<Shelf> {
        self.view.state()
    }

    pub fn shelf(&self, section: Section) -> Vec<Book> {
        self.view.items().into_iter()
            .find(|shelf| shelf.section == section)
            .map(|shelf| shelf.books)
            .unwrap_or_default()
    }

    /// 즐겨찾기에 추가하고 첫 화면을 다시 조회한다. 로그인 상태가 아니라면 로그인 화면으로 이동한다.
    /// 실패하면 목록은 그대로 둔다.
    pub fn add_to_favorites(&self, id: &BookId) -> Result<(), CatalogError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(CatalogError::LoginRequired);
        }
        self.api.add_favorite(id)?;
        info!(book = %id, "Added to favorites");
        self.load();
        Ok(())
    }
}
