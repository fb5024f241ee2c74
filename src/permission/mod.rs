// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission gate
//!
//! A gate resolves camera access once per screen visit: it checks the
//! current state and, when access is not granted yet, asks the host exactly
//! once. The answer is remembered for the life of the gate; a denial keeps
//! the screen blocked until a new gate is created.

pub mod portal;

pub use portal::PortalPermission;

use crate::errors::{AppError, AppResult};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Camera access state reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// The user has not been asked yet
    NotDetermined,
}

/// Host side of camera permission
pub trait PermissionProvider: Send + Sync {
    /// Current state, without prompting
    fn check(&self) -> impl Future<Output = AppResult<PermissionState>> + Send;

    /// Prompt the user; resolves when they answer
    fn request(&self) -> impl Future<Output = AppResult<PermissionState>> + Send;
}

/// Once-per-visit permission resolution
pub struct PermissionGate<P> {
    provider: P,
    resolved: OnceCell<PermissionState>,
}

impl<P: PermissionProvider> PermissionGate<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            resolved: OnceCell::new(),
        }
    }

    /// Resolve to `Granted` or `Denied`
    ///
    /// Concurrent callers share the same resolution; the prompt is shown at
    /// most once for the life of the gate.
    pub async fn resolve(&self) -> PermissionState {
        *self
            .resolved
            .get_or_init(|| async {
                let current = match self.provider.check().await {
                    Ok(state) => state,
                    Err(e) => {
                        warn!(error = %e, "Permission check failed, asking instead");
                        PermissionState::NotDetermined
                    }
                };
                if current == PermissionState::Granted {
                    info!("Camera permission already granted");
                    return PermissionState::Granted;
                }

                info!(?current, "Requesting camera permission");
                match self.provider.request().await {
                    Ok(PermissionState::Granted) => PermissionState::Granted,
                    Ok(other) => {
                        info!(answer = ?other, "Camera permission not granted");
                        PermissionState::Denied
                    }
                    Err(e) => {
                        warn!(error = %e, "Permission request failed");
                        PermissionState::Denied
                    }
                }
            })
            .await
    }

    /// `Ok` when camera access is granted, `PermissionDenied` otherwise
    pub async fn ensure(&self) -> AppResult<()> {
        match self.resolve().await {
            PermissionState::Granted => Ok(()),
            _ => Err(AppError::PermissionDenied),
        }
    }

    /// Whether the gate has resolved to granted
    pub fn has_permission(&self) -> bool {
        self.resolved.get() == Some(&PermissionState::Granted)
    }

    /// The resolved state, or `None` while unresolved
    pub fn state(&self) -> Option<PermissionState> {
        self.resolved.get().copied()
    }
}

/// Fixed answers, for hosts without a permission system
#[derive(Debug, Clone)]
pub struct StaticPermission {
    current: PermissionState,
    answer: PermissionState,
    requests: Arc<AtomicUsize>,
}

impl StaticPermission {
    /// Reports `current` on check and `answer` when asked
    pub fn new(current: PermissionState, answer: PermissionState) -> Self {
        Self {
            current,
            answer,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionState::Granted, PermissionState::Granted)
    }

    /// How many times the user was asked
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for StaticPermission {
    async fn check(&self) -> AppResult<PermissionState> {
        Ok(self.current)
    }

    async fn request(&self) -> AppResult<PermissionState> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_granted_never_prompts() {
        let provider = StaticPermission::granted();
        let gate = PermissionGate::new(provider.clone());
        assert!(!gate.has_permission());
        gate.ensure().await.unwrap();
        assert!(gate.has_permission());
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_prompts_once_on_grant() {
        let provider =
            StaticPermission::new(PermissionState::NotDetermined, PermissionState::Granted);
        let gate = PermissionGate::new(provider.clone());
        assert_eq!(gate.resolve().await, PermissionState::Granted);
        assert_eq!(gate.resolve().await, PermissionState::Granted);
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_denial_is_sticky_without_retry() {
        let provider =
            StaticPermission::new(PermissionState::NotDetermined, PermissionState::Denied);
        let gate = PermissionGate::new(provider.clone());
        assert_eq!(gate.state(), None);
        assert_eq!(gate.ensure().await, Err(AppError::PermissionDenied));
        assert_eq!(gate.state(), Some(PermissionState::Denied));
        assert_eq!(gate.ensure().await, Err(AppError::PermissionDenied));
        assert!(!gate.has_permission());
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_dismissed_prompt_counts_as_denied() {
        let provider = StaticPermission::new(
            PermissionState::NotDetermined,
            PermissionState::NotDetermined,
        );
        let gate = PermissionGate::new(provider);
        assert_eq!(gate.resolve().await, PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_prompt() {
        let provider =
            StaticPermission::new(PermissionState::Denied, PermissionState::Granted);
        let gate = Arc::new(PermissionGate::new(provider.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.resolve().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), PermissionState::Granted);
        }
        assert_eq!(provider.request_count(), 1);
    }
}
