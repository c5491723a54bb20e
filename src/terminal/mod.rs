use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::Router;
use tokio::{
    sync::{Mutex, RwLock},
    time::Instant,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{config::TerminalConfig, scan::session::StartCanceller, state::AppState};

pub mod controller;
pub mod dto;
pub mod handlers;

use controller::Controller;

pub fn router() -> Router<AppState> {
    handlers::me_routes()
}

/// One logged-in browser tab. Every request for it runs under `controller`.
pub struct TerminalHandle {
    pub controller: Mutex<Controller>,
    /// Usable while a camera start holds the controller lock.
    pub canceller: StartCanceller,
}

impl TerminalHandle {
    pub fn new(controller: Controller) -> Self {
        let canceller = controller.canceller();
        Self {
            controller: Mutex::new(controller),
            canceller,
        }
    }
}

struct Entry {
    handle: Arc<TerminalHandle>,
    last_seen: Instant,
}

/// Live terminals by bearer token.
///
/// Terminals idle for longer than `idle_timeout` are dropped, and opening one
/// past `max_open` closes the least recently used.
#[derive(Clone)]
pub struct Terminals {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
    config: TerminalConfig,
}

impl Terminals {
    pub fn new(config: TerminalConfig) -> Self {
        Self {
            inner: Arc::default(),
            config,
        }
    }

    pub async fn insert(&self, handle: TerminalHandle) -> Uuid {
        let now = Instant::now();
        let token = Uuid::new_v4();

        let mut map = self.inner.write().await;
        let mut evicted = expire(&mut map, now, self.config.idle_timeout);
        while map.len() >= self.config.max_open.max(1) {
            let Some(oldest) = map.iter().min_by_key(|(_, e)| e.last_seen).map(|(t, _)| *t) else {
                break;
            };
            if let Some(entry) = map.remove(&oldest) {
                debug!(token = %oldest, "terminal limit reached; closing least recent");
                evicted.push((oldest, entry.handle));
            }
        }
        map.insert(
            token,
            Entry {
                handle: Arc::new(handle),
                last_seen: now,
            },
        );
        drop(map);

        close(evicted);
        token
    }

    /// Looks up a terminal and marks it as seen.
    pub async fn get(&self, token: &Uuid) -> Option<Arc<TerminalHandle>> {
        let now = Instant::now();
        let mut map = self.inner.write().await;
        let entry = map.get_mut(token)?;
        if now.duration_since(entry.last_seen) > self.config.idle_timeout {
            let entry = map.remove(token)?;
            drop(map);
            close(vec![(*token, entry.handle)]);
            return None;
        }
        entry.last_seen = now;
        Some(entry.handle.clone())
    }

    pub async fn remove(&self, token: &Uuid) -> Option<Arc<TerminalHandle>> {
        self.inner.write().await.remove(token).map(|e| e.handle)
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Closes every terminal past its idle timeout. Returns how many went.
    pub async fn sweep(&self) -> usize {
        let evicted = expire(&mut *self.inner.write().await, Instant::now(), self.config.idle_timeout);
        let n = evicted.len();
        close(evicted);
        n
    }

    /// Sweeps idle terminals in the background for the life of the process.
    pub fn spawn_sweeper(&self) {
        let terminals = self.clone();
        let period = self.config.idle_timeout.min(Duration::from_secs(60));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                let n = terminals.sweep().await;
                if n > 0 {
                    info!(closed = n, "idle terminals closed");
                }
            }
        });
    }
}

fn expire(
    map: &mut HashMap<Uuid, Entry>,
    now: Instant,
    idle_timeout: Duration,
) -> Vec<(Uuid, Arc<TerminalHandle>)> {
    let stale: Vec<Uuid> = map
        .iter()
        .filter(|(_, e)| now.duration_since(e.last_seen) > idle_timeout)
        .map(|(t, _)| *t)
        .collect();
    stale
        .into_iter()
        .filter_map(|t| map.remove(&t).map(|e| (t, e.handle)))
        .collect()
}

/// Logs evicted terminals out so their cameras are released.
fn close(evicted: Vec<(Uuid, Arc<TerminalHandle>)>) {
    for (token, handle) in evicted {
        tokio::spawn(async move {
            handle.canceller.cancel();
            handle.controller.lock().await.logout().await;
            info!(%token, "terminal evicted");
        });
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    fn terminals(idle_ms: u64, max_open: usize) -> Terminals {
        Terminals::new(TerminalConfig {
            idle_timeout: Duration::from_millis(idle_ms),
            max_open,
        })
    }

    fn handle() -> TerminalHandle {
        TerminalHandle::new(AppState::fake().controller())
    }

    #[tokio::test]
    async fn logins_past_the_cap_close_the_least_recent() {
        let t = terminals(3_600_000, 3);
        let mut tokens = Vec::new();
        for _ in 0..50 {
            tokens.push(t.insert(handle()).await);
        }
        assert_eq!(t.count().await, 3);
        assert!(t.get(&tokens[0]).await.is_none());
        assert!(t.get(&tokens[46]).await.is_none());
        for token in &tokens[47..] {
            assert!(t.get(token).await.is_some());
        }
    }

    #[tokio::test]
    async fn recently_used_terminal_survives_the_cap() {
        let t = terminals(3_600_000, 2);
        let a = t.insert(handle()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = t.insert(handle()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(t.get(&a).await.is_some());

        t.insert(handle()).await;
        assert!(t.get(&a).await.is_some());
        assert!(t.get(&b).await.is_none());
    }

    #[tokio::test]
    async fn idle_terminal_expires() {
        let t = terminals(30, 16);
        let token = t.insert(handle()).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(t.get(&token).await.is_none());
        assert_eq!(t.count().await, 0);
    }

    #[tokio::test]
    async fn sweep_closes_idle_terminals_and_logs_them_out() {
        let t = terminals(30, 16);
        let mut controller = AppState::fake().controller();
        controller.login("demo@demo.be", "demo").await.unwrap();
        let token = t.insert(TerminalHandle::new(controller)).await;
        let held = t.get(&token).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(t.sweep().await, 1);
        assert_eq!(t.count().await, 0);

        let mut logged_out = false;
        for _ in 0..50 {
            if held.controller.lock().await.user().is_none() {
                logged_out = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(logged_out);
    }
}
