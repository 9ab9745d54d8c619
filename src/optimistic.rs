use crate::provider::api::ApiError;
use tracing::{debug, warn};

/// 낙관적 변경의 대상, 변경 전 상태를 저장하고 복원 할 수 있어야 한다.
pub trait Snapshot {
    type State;

    fn snapshot(&self) -> Self::State;

    fn restore(&self, state: Self::State);
}

/// 서버가 404를 응답했을 때의 처리 방법
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    /// 다른 실패와 동일하게 되돌린다.
    Rollback,
    /// 삭제처럼 멱등한 요청에서는 이미 반영된 것으로 보고 로컬 변경을 유지한다.
    Accept,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied<R> {
    Confirmed(R),
    AlreadyGone,
}

/// 로컬 상태를 먼저 바꾸고 서버 요청을 보낸다.
///
/// 요청이 실패하면 변경 전 상태로 되돌리고 에러를 그대로 반환한다.
/// `not_found`가 [`NotFound::Accept`]라면 404는 실패로 보지 않는다.
pub fn mutate<S, A, C, R>(target: &S, apply: A, call: C, not_found: NotFound) -> Result<Applied<R>, ApiError>
where
    S: Snapshot + ?Sized,
    A: FnOnce(&S),
    C: FnOnce() -> Result<R, ApiError>,
{
    let snapshot = target.snapshot();
    apply(target);

    match call() {
        Ok(response) => Ok(Applied::Confirmed(response)),
        Err(err) if err.is_not_found() && not_found == NotFound::Accept => {
            debug!(error = %err, "Target already gone on server, keeping local change");
            Ok(Applied::AlreadyGone)
        }
        Err(err) => {
            warn!(error = %err, "Rolling back optimistic change");
            target.restore(snapshot);
            Err(err)
        }
    }
}
