use crate::item::Profile;
use crate::navigation::{self, Navigator};
use crate::provider::api::ShopApi;
use crate::session::SessionStore;
use crate::view::{ListingView, ViewState};
use std::sync::Arc;
use tracing::warn;

/// 프로필 화면
///
/// 조회에 성공하면 세션의 닉네임과 권한도 함께 갱신한다.
pub struct ProfileView {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    view: ListingView<Profile>,
}

impl ProfileView {
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        ProfileView { api, session, navigator, view: ListingView::new("profile") }
    }

    pub fn load(&self) -> ViewState<Profile> {
        if !navigation::require_session(&self.session, &self.navigator) {
            self.view.reset();
            return self.view.state();
        }

        let state = self.view.load(|| self.api.profile().map(|profile| vec![profile]));
        if let Some(profile) = state.items().first() {
            if let Err(err) = self.session.update_identity(profile) {
                warn!(error = %err, "Failed to store profile in session");
            }
        }
        state
    }

    pub fn profile(&self) -> Option<Profile> {
        self.view.items().into_iter().next()
    }
}
