//! 供應商連線共用池。
//!
//! 第一次 [`SessionPool::acquire`] 建立連線，之後的取得只增加參考計數；
//! 最後一個 [`SessionHandle::close`] 時才呼叫 [`Connector::disconnect`] 並丟棄連線。
//! 池本身以 `Arc` 注入各個 client，不使用行程層級的全域變數。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{error::Result, logging};

/// 建立與結束供應商連線
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Send + Sync + 'static;

    /// 用於日誌與錯誤訊息的名稱
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<Self::Session>;

    /// 最後一個參考釋放時呼叫，失敗只記錄不向外傳遞
    async fn disconnect(&self, _session: &Self::Session) -> Result<()> {
        Ok(())
    }
}

struct PoolState<S> {
    session: Option<Arc<S>>,
    refs: usize,
}

pub struct SessionPool<C: Connector> {
    connector: C,
    state: Mutex<PoolState<C::Session>>,
}

impl<C: Connector> SessionPool<C> {
    pub fn new(connector: C) -> Arc<Self> {
        Arc::new(SessionPool {
            connector,
            state: Mutex::new(PoolState {
                session: None,
                refs: 0,
            }),
        })
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// 取得共用連線，必要時建立
    ///
    /// 建立失敗時計數不變。
    pub async fn acquire(self: &Arc<Self>) -> Result<SessionHandle<C>> {
        let mut state = self.state.lock().await;
        let session = match &state.session {
            Some(session) => Arc::clone(session),
            None => {
                let session = Arc::new(self.connector.connect().await?);
                logging::info_file_async(format!("{} session connected", self.connector.name()));
                state.session = Some(Arc::clone(&session));
                session
            }
        };
        state.refs += 1;

        Ok(SessionHandle {
            pool: Arc::clone(self),
            session: Some(session),
        })
    }

    pub async fn ref_count(&self) -> usize {
        self.state.lock().await.refs
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    async fn release(&self) {
        let last = {
            let mut state = self.state.lock().await;
            state.refs = state.refs.saturating_sub(1);
            if state.refs == 0 {
                state.session.take()
            } else {
                None
            }
        };

        if let Some(session) = last {
            if let Err(why) = self.connector.disconnect(&session).await {
                logging::warn_file_async(format!(
                    "Failed to disconnect {} session because {:?}",
                    self.connector.name(),
                    why
                ));
            }
            logging::info_file_async(format!("{} session released", self.connector.name()));
        }
    }

    /// `Drop` 無法 await，不呼叫 disconnect，只減少計數
    ///
    /// 鎖被佔用時改由目前的 tokio runtime 稍後處理；沒有 runtime 時參考會遺留。
    fn release_without_disconnect(self: &Arc<Self>) {
        match self.state.try_lock() {
            Ok(mut state) => self.forget_reference(&mut state),
            Err(_) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let pool = Arc::clone(self);
                    runtime.spawn(async move {
                        let mut state = pool.state.lock().await;
                        pool.forget_reference(&mut state);
                    });
                }
                Err(_) => {
                    logging::error_file_async(format!(
                        "{} session handle dropped outside a runtime while the pool was locked",
                        self.connector.name()
                    ));
                }
            },
        }
    }

    fn forget_reference(&self, state: &mut PoolState<C::Session>) {
        state.refs = state.refs.saturating_sub(1);
        if state.refs == 0 && state.session.take().is_some() {
            logging::warn_file_async(format!(
                "{} session dropped without close(), skipped disconnect",
                self.connector.name()
            ));
        }
    }
}

/// 共用連線的一個參考，使用完畢請呼叫 [`SessionHandle::close`]
pub struct SessionHandle<C: Connector> {
    pool: Arc<SessionPool<C>>,
    session: Option<Arc<C::Session>>,
}

impl<C: Connector> SessionHandle<C> {
    pub fn session(&self) -> Option<&C::Session> {
        self.session.as_deref()
    }

    /// 釋放參考；若為最後一個參考則結束連線
    pub async fn close(mut self) -> Result<()> {
        if self.session.take().is_some() {
            self.pool.release().await;
        }

        Ok(())
    }
}

impl<C: Connector> Drop for SessionHandle<C> {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            self.pool.release_without_disconnect();
        }
    }
}
