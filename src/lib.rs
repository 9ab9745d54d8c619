use crate::admin::AdminPanel;
use crate::basket::BasketSynchronizer;
use crate::catalog::detail::BookDetailView;
use crate::catalog::favorites::FavoritesView;
use crate::catalog::info::InfoView;
use crate::catalog::reference::{AuthorDetailView, AuthorsView, GenresView};
use crate::catalog::CatalogController;
use crate::configs::AppConfig;
use crate::navigation::{Navigator, Route};
use crate::provider::api::{ApiError, Credentials, Registration, ShopApi, Token};
use crate::provider::image::{ImageKind, ImageSource};
use crate::item::Profile;
use crate::session::profile::ProfileView;
use crate::session::storage::FileStorage;
use crate::session::{SessionError, SessionStore};
use std::sync::Arc;

pub mod admin;
pub mod basket;
pub mod catalog;
pub mod configs;
pub mod item;
pub mod navigation;
pub mod optimistic;
pub mod provider;
pub mod session;
pub mod view;

#[cfg(test)]
mod testing;

/// 스토어 클라이언트
///
/// API 클라이언트, 세션, 화면 이동 기록을 공유하며 각 화면의 컨트롤러를 만든다.
/// 세션이 만료되면 로그인 화면으로 이동한다.
pub struct Shop {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    base_url: String,
}

/// 설정으로 스토어 클라이언트를 만든다. 세션은 설정된 파일에 저장된다.
pub fn create_shop(config: &AppConfig) -> Result<Shop, ApiError> {
    let storage = FileStorage::new(config.storage().session_file().clone());
    let session = Arc::new(SessionStore::open(Box::new(storage)));
    let client = provider::api::http::new_client(config.api(), session.clone())?;

    Ok(Shop::with_api(Arc::new(client), session, config.api().base_url()))
}

impl Shop {
    pub fn with_api<S: Into<String>>(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, base_url: S) -> Self {
        let navigator = Arc::new(Navigator::default());
        navigator.follow_session(&session);
        Shop { api, session, navigator, base_url: base_url.into() }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    pub fn image(&self, img: Option<&str>, kind: ImageKind) -> ImageSource {
        ImageSource::new(&self.base_url, img, kind)
    }

    /// 로그인에 성공하면 카탈로그 화면으로 이동한다.
    pub fn login(&self, credentials: &Credentials) -> Result<Token, SessionError> {
        let token = session::login(self.api.as_ref(), &self.session, credentials)?;
        self.navigator.push(Route::Shop.location());
        Ok(token)
    }

    pub fn logout(&self) -> Result<(), SessionError> {
        session::logout(&self.session)?;
        self.navigator.push(Route::Login.location());
        Ok(())
    }

    /// 가입에 성공하면 로그인 화면으로 이동한다.
    pub fn register(&self, registration: &Registration) -> Result<Profile, SessionError> {
        let profile = session::register(self.api.as_ref(), registration)?;
        self.navigator.push(Route::Login.location());
        Ok(profile)
    }

    pub fn catalog(&self) -> CatalogController {
        CatalogController::new(self.api.clone(), self.session.clone(), self.navigator.clone())
    }

    pub fn info(&self) -> InfoView {
        InfoView::new(self.api.clone(), self.session.clone(), self.navigator.clone())
    }

    pub fn book(&self) -> BookDetailView {
        BookDetailView::new(self.api.clone(), self.session.clone(), self.navigator.clone())
    }

    pub fn genres(&self) -> GenresView {
        GenresView::new(self.api.clone())
    }

    pub fn authors(&self) -> AuthorsView {
        AuthorsView::new(self.api.clone())
    }

    pub fn author(&self) -> AuthorDetailView {
        AuthorDetailView::new(self.api.clone())
    }

    pub fn favorites(&self) -> FavoritesView {
        FavoritesView::new(self.api.clone(), self.session.clone(), self.navigator.clone())
    }

    pub fn basket(&self) -> BasketSynchronizer {
        BasketSynchronizer::new(self.api.clone(), self.session.clone(), self.navigator.clone())
    }

    pub fn profile(&self) -> ProfileView {
        ProfileView::new(self.api.clone(), self.session.clone(), self.navigator.clone())
    }

    pub fn admin(&self) -> AdminPanel {
        AdminPanel::new(self.api.clone(), self.session.clone(), self.navigator.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::storage::MemoryStorage;
    use crate::testing::FakeApi;

    fn shop() -> (Shop, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::new());
        let session = Arc::new(SessionStore::open(Box::new(MemoryStorage::new())));
        (Shop::with_api(api.clone(), session, "http://localhost:8000"), api)
    }

    #[test]
    fn login_and_logout_move_between_views() {
        let (shop, _) = shop();

        shop.login(&Credentials::new("a@b.c", "secret")).unwrap();
        assert_eq!(shop.navigator().current_route(), Route::Shop);
        assert!(shop.session().is_authenticated());

        shop.logout().unwrap();
        assert_eq!(shop.navigator().current_route(), Route::Login);
        assert!(!shop.session().is_authenticated());
    }

    #[test]
    fn rejected_token_sends_user_to_login() {
        let (shop, _) = shop();
        shop.login(&Credentials::new("a@b.c", "secret")).unwrap();

        let _ = shop.session().observe::<()>(Err(ApiError::from_status(401, "Token expired".into())));

        assert_eq!(shop.navigator().current_route(), Route::Login);
    }

    #[test]
    fn images_resolve_against_api_base() {
        let (shop, _) = shop();

        let image = shop.image(Some("dune.jpg"), ImageKind::Book);

        assert_eq!(image.url(), "http://localhost:8000/static/images/books/dune.jpg");
    }
}
