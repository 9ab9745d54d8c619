pub mod profile;
pub mod storage;

use crate::item::{Profile, Role};
use crate::provider::api::{ApiError, Credentials, Registration, ShopApi, Token};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use storage::{SessionStorage, StorageError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SessionError {
    /// 클라이언트에서 검증한 입력 오류
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// 인증 토큰과 토큰에서 파생된 사용자 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl Session {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Session { token: token.into(), nickname: None, role: None }
    }
}

/// 세션 상태 변경 알림
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    LoggedOut,
    /// 401, 403 응답으로 인해 강제로 종료됨
    Expired,
}

type Listener = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// 세션 저장소
///
/// 모든 인증 호출이 읽는 단일 토큰을 보관한다. 쓰기는 로그인, 로그아웃, 세션 만료 때만 일어난다.
/// 구독자는 폴링 없이 로그아웃/만료에 반응 할 수 있다.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    current: RwLock<Option<Session>>,
    listeners: Mutex<Vec<Listener>>,
}

impl SessionStore {
    /// 저장소에서 이전 세션을 읽어온다. 읽을 수 없는 세션은 버리고 비로그인 상태로 시작한다.
    pub fn open(storage: Box<dyn SessionStorage>) -> Self {
        let current = match storage.load() {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "Discarding unreadable session");
                None
            }
        };

        SessionStore {
            storage,
            current: RwLock::new(current),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn nickname(&self) -> Option<String> {
        self.read().as_ref().and_then(|s| s.nickname.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.read().as_ref()
            .and_then(|s| s.role)
            .is_some_and(|role| role == Role::Admin)
    }

    /// 세션을 저장하고 [`SessionEvent::LoggedIn`]을 알린다.
    pub fn set(&self, session: Session) -> Result<(), StorageError> {
        self.storage.save(&session)?;
        self.replace(Some(session));
        self.notify(SessionEvent::LoggedIn);
        Ok(())
    }

    /// 현재 세션의 사용자 정보를 갱신한다. 로그인 상태가 아니라면 아무것도 하지 않는다.
    pub fn update_identity(&self, profile: &Profile) -> Result<(), StorageError> {
        let Some(mut session) = self.get() else {
            return Ok(());
        };
        session.nickname = Some(profile.nickname.clone());
        session.role = Some(profile.role);
        self.storage.save(&session)?;
        self.replace(Some(session));
        Ok(())
    }

    /// 세션을 삭제하고 [`SessionEvent::LoggedOut`]을 알린다.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.clear()?;
        self.replace(None);
        self.notify(SessionEvent::LoggedOut);
        Ok(())
    }

    /// 서버가 토큰을 거부한 경우 세션을 강제로 종료한다.
    /// 저장소 삭제에 실패하더라도 메모리상의 세션은 반드시 삭제된다.
    pub fn expire(&self) {
        if !self.is_authenticated() {
            return;
        }
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "Failed to clear expired session from storage");
        }
        self.replace(None);
        info!("Session expired");
        self.notify(SessionEvent::Expired);
    }

    /// 세션 변경을 구독한다.
    ///
    /// 콜백 안에서 다시 `subscribe`를 호출해서는 안된다.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(SessionEvent) + Send + Sync + 'static,
    {
        self.listeners().push(Box::new(listener));
    }

    /// 모든 API 응답에 적용되는 전역 정책, 401/403 응답은 세션을 만료시킨다.
    pub fn observe<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(err) = &result {
            if err.is_unauthorized() {
                warn!(error = %err, "Server rejected the session token");
                self.expire();
            }
        }
        result
    }

    fn replace(&self, session: Option<Session>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn notify(&self, event: SessionEvent) {
        for listener in self.listeners().iter() {
            listener(event);
        }
    }
}

/// 로그인 후 토큰을 저장한다.
///
/// 프로필 조회에 실패해도 로그인은 성공으로 처리하며 사용자 정보만 비워둔다.
pub fn login(api: &dyn ShopApi, store: &SessionStore, credentials: &Credentials) -> Result<Token, SessionError> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(SessionError::InvalidInput("email and password are required".to_owned()));
    }

    let token = api.login(credentials)?;
    store.set(Session {
        token: token.access_token.clone(),
        nickname: token.nickname.clone(),
        role: None,
    })?;
    info!(email = %credentials.email, "Logged in");

    match api.profile() {
        Ok(profile) => store.update_identity(&profile)?,
        Err(err) => warn!(error = %err, "Logged in without profile information"),
    }

    Ok(token)
}

pub fn logout(store: &SessionStore) -> Result<(), SessionError> {
    store.clear()?;
    info!("Logged out");
    Ok(())
}

pub fn register(api: &dyn ShopApi, registration: &Registration) -> Result<Profile, SessionError> {
    if registration.nickname.trim().is_empty()
        || registration.email.trim().is_empty()
        || registration.password.is_empty() {
        return Err(SessionError::InvalidInput("nickname, email and password are required".to_owned()));
    }
    if !registration.email.contains('@') {
        return Err(SessionError::InvalidInput(format!("invalid email: {}", registration.email)));
    }

    let profile = api.register(registration)?;
    info!(nickname = %profile.nickname, "Registered");
    Ok(profile)
}
