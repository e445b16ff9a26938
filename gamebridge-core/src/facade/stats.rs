//! `facade.stats()`: player stats and leaderboards.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use gamebridge_native::{ApiCallId, LeaderboardDisplayType, LeaderboardSortMethod};
use tokio::sync::oneshot;

use crate::error::BindingError;
use crate::event::DomainEvent;
use crate::facade::Facade;

/// Result of an asynchronous native call, completed by a later pump.
///
/// Resolves to `None` if the call failed or the facade shut down first.
#[must_use = "a pending call does nothing unless awaited"]
pub struct PendingCall<T> {
    call_id: Option<ApiCallId>,
    rx: Option<oneshot::Receiver<DomainEvent>>,
    extract: fn(DomainEvent) -> Option<T>,
}

impl<T> PendingCall<T> {
    pub fn call_id(&self) -> Option<ApiCallId> {
        self.call_id
    }
}

impl<T> Future for PendingCall<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.rx = None;
                Poll::Ready(result.ok().and_then(this.extract))
            }
        }
    }
}

pub struct Stats<'a> {
    facade: &'a Facade,
}

impl<'a> Stats<'a> {
    pub(crate) fn new(facade: &'a Facade) -> Self {
        Self { facade }
    }

    /// Current value of an integer stat; `None` for unknown stats.
    pub fn get_int(&self, name: &str) -> Result<Option<i32>, BindingError> {
        self.facade
            .call(|native, raw| native.get_stat_i32(raw, name))
    }

    pub fn set_int(&self, name: &str, value: i32) -> Result<bool, BindingError> {
        self.facade
            .call(|native, raw| native.set_stat_i32(raw, name, value))
    }

    /// Upload changed stats. Completion arrives as a `StatsStored` event.
    pub fn store(&self) -> Result<bool, BindingError> {
        self.facade.call(|native, raw| native.store_stats(raw))
    }

    pub fn reset_all(&self, achievements_too: bool) -> Result<bool, BindingError> {
        self.facade
            .call(|native, raw| native.reset_all_stats(raw, achievements_too))
    }

    /// Look up (creating if needed) a leaderboard. Resolves to its id once a
    /// pump delivers the native result.
    pub fn find_or_create_leaderboard(
        &self,
        name: &str,
        sort: LeaderboardSortMethod,
        display: LeaderboardDisplayType,
    ) -> Result<PendingCall<u64>, BindingError> {
        self.facade.handle()?;
        if name.is_empty() {
            return Err(BindingError::InvalidArgument("leaderboard name is empty".to_string()));
        }
        let call_id = self
            .facade
            .call(|native, raw| native.find_or_create_leaderboard(raw, name, sort, display))?;
        let rx = call_id.map(|id| self.facade.bridge().expect_call(id));
        Ok(PendingCall {
            call_id,
            rx,
            extract: |event| match event {
                DomainEvent::LeaderboardFound { leaderboard, .. } => leaderboard,
                _ => None,
            },
        })
    }
}
