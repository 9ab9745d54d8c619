use crate::optimistic::Snapshot;
use crate::provider::api::ApiError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// 목록 화면의 상태
///
/// `Idle -> Loading -> (Loaded | Empty | Failed)` 순서로 전이된다.
/// 결과가 비어있는 경우는 에러가 아니라 별도의 `Empty` 상태이다.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Idle,
    Loading,
    Loaded(Vec<T>),
    Empty,
    Failed(String),
}

impl<T> ViewState<T> {
    pub fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            ViewState::Empty
        } else {
            ViewState::Loaded(items)
        }
    }

    pub fn items(&self) -> &[T] {
        match self {
            ViewState::Loaded(items) => items,
            _ => &[],
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ViewState::Empty)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ViewState::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> ViewState<U> {
        match self {
            ViewState::Idle => ViewState::Idle,
            ViewState::Loading => ViewState::Loading,
            ViewState::Loaded(items) => ViewState::Loaded(items.iter().map(f).collect()),
            ViewState::Empty => ViewState::Empty,
            ViewState::Failed(message) => ViewState::Failed(message.clone()),
        }
    }
}

/// 조회 요청 순번, 가장 마지막에 발급된 순번의 응답만 화면에 반영된다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.0
    }
}

struct Inner<T> {
    issued: u64,
    state: ViewState<T>,
}

/// 목록 화면 하나의 상태 보관소
///
/// 응답 도착 순서와 상관없이 요청 순번으로 마지막 요청의 결과만 반영한다.
pub struct ListingView<T> {
    name: &'static str,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> ListingView<T> {
    pub fn new(name: &'static str) -> Self {
        ListingView {
            name,
            inner: Mutex::new(Inner { issued: 0, state: ViewState::Idle }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ViewState<T> {
        self.lock().state.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.lock().state.items().to_vec()
    }

    /// 새 요청 순번을 발급하고 로딩 상태로 전환한다.
    pub fn begin(&self) -> Ticket {
        let mut inner = self.lock();
        inner.issued += 1;
        inner.state = ViewState::Loading;
        debug!(view = self.name, seq = inner.issued, "Loading");
        Ticket(inner.issued)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.lock().issued == ticket.0
    }

    /// 응답을 반영한다. 더 최근에 발급된 순번이 있다면 무시하고 `false`를 반환한다.
    /// 실패시 이전 결과는 비워진다.
    pub fn finish(&self, ticket: Ticket, result: Result<Vec<T>, ApiError>) -> bool {
        let mut inner = self.lock();
        if inner.issued != ticket.0 {
            debug!(view = self.name, seq = ticket.0, latest = inner.issued, "Discarding stale response");
            return false;
        }

        inner.state = match result {
            Ok(items) => {
                info!(view = self.name, count = items.len(), "Loaded");
                ViewState::from_items(items)
            }
            Err(err) => {
                error!(view = self.name, error = %err, "Failed to load");
                ViewState::Failed(err.message().to_owned())
            }
        };
        true
    }

    /// 조회를 시작하고 결과를 반영한 뒤 현재 상태를 반환한다.
    pub fn load<F>(&self, fetch: F) -> ViewState<T>
    where
        F: FnOnce() -> Result<Vec<T>, ApiError>,
    {
        let ticket = self.begin();
        self.finish(ticket, fetch());
        self.state()
    }

    /// 로드된 목록을 직접 수정한다. 목록이 로드된 상태(`Loaded`, `Empty`)가 아니라면 아무것도 하지 않는다.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Vec<T>),
    {
        let mut inner = self.lock();
        let mut items = match &mut inner.state {
            ViewState::Loaded(items) => std::mem::take(items),
            ViewState::Empty => Vec::new(),
            _ => return false,
        };
        f(&mut items);
        inner.state = ViewState::from_items(items);
        true
    }

    /// 인증이 필요한 화면에서 세션이 없을 때, 요청 없이 초기 상태로 되돌린다.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.issued += 1;
        inner.state = ViewState::Idle;
    }
}

impl<T: Clone> ListingView<T> {
    /// `matches`에 해당하는 항목 하나를 가리킨다. 낙관적 변경과 되돌리기가 그 항목에만 적용된다.
    pub fn entry<P>(&self, matches: P) -> Entry<'_, T, P>
    where
        P: Fn(&T) -> bool,
    {
        Entry { view: self, matches }
    }
}

/// 목록 안의 항목 하나
///
/// 다른 항목이 동시에 바뀌더라도 되돌리기는 이 항목에만 영향을 준다.
/// 변경 전에 있던 항목이라면 같은 자리에 다시 넣고, 없던 항목이라면 지운다.
pub struct Entry<'a, T, P> {
    view: &'a ListingView<T>,
    matches: P,
}

impl<T: Clone, P: Fn(&T) -> bool> Entry<'_, T, P> {
    pub fn get(&self) -> Option<T> {
        self.view.lock().state.items().iter().find(|item| (self.matches)(*item)).cloned()
    }

    pub fn modify<F: FnMut(&mut T)>(&self, mut f: F) -> bool {
        self.view.update(|items| items.iter_mut().filter(|item| (self.matches)(&**item)).for_each(&mut f))
    }

    pub fn remove(&self) -> bool {
        self.view.update(|items| items.retain(|item| !(self.matches)(item)))
    }
}

impl<T: Clone, P: Fn(&T) -> bool> Snapshot for Entry<'_, T, P> {
    type State = Option<(usize, T)>;

    fn snapshot(&self) -> Self::State {
        let inner = self.view.lock();
        let items = inner.state.items();
        items.iter()
            .position(|item| (self.matches)(item))
            .map(|at| (at, items[at].clone()))
    }

    fn restore(&self, state: Self::State) {
        self.view.update(|items| {
            let current = items.iter().position(|item| (self.matches)(item));
            match (state, current) {
                (Some((_, item)), Some(at)) => items[at] = item,
                (Some((at, item)), None) => items.insert(at.min(items.len()), item),
                (None, Some(at)) => {
                    items.remove(at);
                }
                (None, None) => {}
            }
        });
    }
}
