use crate::item::{self, BasketItem, BookId};
use crate::navigation::{self, Navigator};
use crate::optimistic::{self, NotFound};
use crate::provider::api::{ApiError, PurchaseReceipt, ShopApi};
use crate::session::SessionStore;
use crate::view::{ListingView, ViewState};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum BasketError {
    #[error("Login required")]
    LoginRequired,

    /// 수량은 1 이상이어야 한다. 0으로 만들려면 삭제를 사용한다.
    #[error("Quantity must be at least 1: {0}")]
    BelowMinimum(u32),

    #[error("Update for {0} is already in progress")]
    InFlight(BookId),

    #[error("Book {0} is not in the basket")]
    UnknownItem(BookId),

    #[error("Basket is empty")]
    Empty,

    #[error("Purchase is already in progress")]
    PurchaseInFlight,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// 책 하나에 대한 진행 중 표시, 범위를 벗어나면 성공 실패와 상관없이 해제된다.
struct ItemGuard<'a> {
    in_flight: &'a Mutex<HashSet<BookId>>,
    id: BookId,
}

impl<'a> ItemGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<BookId>>, id: &BookId) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(id.clone()) {
            return None;
        }
        Some(ItemGuard { in_flight, id: id.clone() })
    }
}

impl Drop for ItemGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

struct PurchaseGuard<'a>(&'a AtomicBool);

impl Drop for PurchaseGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 장바구니 화면과 서버 장바구니의 동기화
///
/// 수량 변경은 화면에 먼저 반영한 뒤 서버에서 해당 책을 삭제하고 새 수량으로 다시 담는다.
/// 서버에 부분 수정 API가 없기 때문이며 두 요청 사이에 실패하면 서버에서는 책이 빠진 상태로 남을 수 있다.
/// 같은 책에 대한 변경은 동시에 하나만 진행되고, 진행 중에 들어온 변경은 대기하지 않고 거절된다.
pub struct BasketSynchronizer {
    api: Arc<dyn ShopApi>,
    session: Arc<SessionStore>,
    navigator: Arc<Navigator>,
    view: ListingView<BasketItem>,
    in_flight: Mutex<HashSet<BookId>>,
    purchasing: AtomicBool,
}

impl BasketSynchronizer {
    pub fn new(api: Arc<dyn ShopApi>, session: Arc<SessionStore>, navigator: Arc<Navigator>) -> Self {
        BasketSynchronizer {
            api,
            session,
            navigator,
            view: ListingView::new("basket"),
            in_flight: Mutex::new(HashSet::new()),
            purchasing: AtomicBool::new(false),
        }
    }

    /// 로그인 상태가 아니라면 조회하지 않고 로그인 화면으로 이동한다.
    pub fn load(&self) -> ViewState<BasketItem> {
        if !navigation::require_session(&self.session, &self.navigator) {
            self.view.reset();
            return self.view.state();
        }
        self.view.load(|| self.api.get_basket())
    }

    pub fn state(&self) -> ViewState<BasketItem> {
        self.view.state()
    }

    pub fn items(&self) -> Vec<BasketItem> {
        self.view.items()
    }

    pub fn quantity(&self, id: &BookId) -> Option<u32> {
        self.items().iter()
            .find(|item| item.id() == id)
            .map(BasketItem::quantity)
    }

    pub fn total_price(&self) -> f64 {
        item::total_price(&self.items())
    }

    pub fn is_updating(&self, id: &BookId) -> bool {
        self.in_flight.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// 감소 버튼 활성화 여부, 수량이 1이거나 변경 중이면 비활성화된다.
    pub fn can_decrement(&self, id: &BookId) -> bool {
        self.quantity(id).is_some_and(|q| q > 1) && !self.is_updating(id)
    }

    pub fn can_purchase(&self) -> bool {
        !self.items().is_empty() && !self.purchasing.load(Ordering::Acquire)
    }

    pub fn increment(&self, id: &BookId) -> Result<u32, BasketError> {
        let current = self.quantity(id).ok_or_else(|| BasketError::UnknownItem(id.clone()))?;
        self.update_quantity(id, current.saturating_add(1))
    }

    pub fn decrement(&self, id: &BookId) -> Result<u32, BasketError> {
        let current = self.quantity(id).ok_or_else(|| BasketError::UnknownItem(id.clone()))?;
        self.update_quantity(id, current.saturating_sub(1))
    }

    /// 수량을 바꾼다.
    ///
    /// 1 미만이거나 같은 책의 변경이 진행 중이면 요청 없이 거절한다.
    /// 서버 반영에 실패하면 해당 책의 수량만 변경 전으로 되돌린다. 삭제 단계의 404는 무시한다.
    pub fn update_quantity(&self, id: &BookId, quantity: u32) -> Result<u32, BasketError> {
        if quantity < 1 {
            return Err(BasketError::BelowMinimum(quantity));
        }
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(BasketError::LoginRequired);
        }
        let _guard = ItemGuard::acquire(&self.in_flight, id)
            .ok_or_else(|| BasketError::InFlight(id.clone()))?;
        if self.quantity(id).is_none() {
            return Err(BasketError::UnknownItem(id.clone()));
        }

        let reconcile = || {
            match self.api.remove_basket_item(id) {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {
                    warn!(book = %id, "Basket line missing on server, adding it again");
                }
                Err(err) => return Err(err),
            }
            self.api.add_basket_item(id, quantity)
        };

        let line = self.view.entry(|item: &BasketItem| item.id() == id);
        optimistic::mutate(
            &line,
            |line| {
                line.modify(|item| {
                    if let Err(err) = item.set_quantity(quantity) {
                        warn!(book = %id, error = %err, "Quantity rejected");
                    }
                });
            },
            reconcile,
            NotFound::Rollback,
        )?;
        info!(book = %id, quantity, "Basket quantity updated");
        Ok(quantity)
    }

    /// 책을 장바구니에서 뺀다. 화면에서 먼저 지우고 실패하면 원래 자리에 되돌린다. 서버에 이미 없다면(404) 성공으로 본다.
    pub fn remove(&self, id: &BookId) -> Result<(), BasketError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(BasketError::LoginRequired);
        }
        let _guard = ItemGuard::acquire(&self.in_flight, id)
            .ok_or_else(|| BasketError::InFlight(id.clone()))?;

        let line = self.view.entry(|item: &BasketItem| item.id() == id);
        optimistic::mutate(
            &line,
            |line| {
                line.remove();
            },
            || self.api.remove_basket_item(id),
            NotFound::Accept,
        )?;
        info!(book = %id, "Removed from basket");
        Ok(())
    }

    /// 장바구니 전체를 구매한다.
    ///
    /// 비어있거나 구매가 진행 중이면 거절한다. 성공하면 장바구니를 비우고, 실패하면 그대로 둔다.
    pub fn purchase(&self) -> Result<PurchaseReceipt, BasketError> {
        if !navigation::require_session(&self.session, &self.navigator) {
            return Err(BasketError::LoginRequired);
        }
        if self.items().is_empty() {
            return Err(BasketError::Empty);
        }
        if self.purchasing.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(BasketError::PurchaseInFlight);
        }
        let _guard = PurchaseGuard(&self.purchasing);

        let total = self.total_price();
        let receipt = self.api.purchase()?;
        self.view.update(Vec::clear);
        info!(total, "Purchase completed");
        Ok(receipt)
    }
}
