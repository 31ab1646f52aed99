//! Capture permission checks.
//!
//! Platforms gate camera and photo-library access behind a user prompt.
//! The pipeline assumes access was granted before `configure`; callers use
//! [`check_authorization`] with a platform [`AuthorizationProvider`] first.

use serde::{Deserialize, Serialize};

/// Resource requiring user consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationKind {
    Camera,
    PhotoLibrary,
}

/// Current consent state for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Authorized,
    /// The user has not been asked yet.
    NotDetermined,
    Denied,
    /// Blocked by policy; the user cannot grant it.
    Restricted,
}

/// Completion handler receiving whether access is granted.
pub type AuthorizationCompletion = Box<dyn FnOnce(bool) + Send>;

/// Platform permission service.
pub trait AuthorizationProvider {
    /// Returns the current status without prompting.
    fn status(&self, kind: AuthorizationKind) -> AuthorizationStatus;

    /// Prompts the user; `completion` may run on any thread.
    fn request_access(&self, kind: AuthorizationKind, completion: AuthorizationCompletion);
}

/// Resolves whether `kind` may be used, prompting only when undetermined.
pub fn check_authorization(
    provider: &dyn AuthorizationProvider,
    kind: AuthorizationKind,
    completion: AuthorizationCompletion,
) {
    match provider.status(kind) {
        AuthorizationStatus::Authorized => completion(true),
        AuthorizationStatus::NotDetermined => {
            tracing::info!(?kind, "Requesting access");
            provider.request_access(kind, completion);
        }
        AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
            tracing::warn!(?kind, "Access not granted");
            completion(false)
        }
    }
}

/// Provider with a fixed status and a fixed answer to prompts.
#[derive(Debug, Clone, Copy)]
pub struct StaticAuthorization {
    status: AuthorizationStatus,
    grant_on_request: bool,
}

impl StaticAuthorization {
    pub fn new(status: AuthorizationStatus, grant_on_request: bool) -> Self {
        Self {
            status,
            grant_on_request,
        }
    }

    /// Always authorized.
    pub fn granted() -> Self {
        Self::new(AuthorizationStatus::Authorized, true)
    }
}

impl AuthorizationProvider for StaticAuthorization {
    fn status(&self, _kind: AuthorizationKind) -> AuthorizationStatus {
        self.status
    }

    fn request_access(&self, _kind: AuthorizationKind, completion: AuthorizationCompletion) {
        completion(self.grant_on_request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingPrompt {
        prompts: AtomicUsize,
        answer: bool,
    }

    impl AuthorizationProvider for CountingPrompt {
        fn status(&self, _kind: AuthorizationKind) -> AuthorizationStatus {
            AuthorizationStatus::NotDetermined
        }

        fn request_access(&self, _kind: AuthorizationKind, completion: AuthorizationCompletion) {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            completion(self.answer)
        }
    }

    fn resolve(provider: &dyn AuthorizationProvider) -> bool {
        let granted = Arc::new(AtomicBool::new(false));
        let out = Arc::clone(&granted);
        check_authorization(
            provider,
            AuthorizationKind::Camera,
            Box::new(move |ok| out.store(ok, Ordering::SeqCst)),
        );
        granted.load(Ordering::SeqCst)
    }

    #[test]
    fn test_authorized_without_prompt() {
        assert!(resolve(&StaticAuthorization::granted()));
    }

    #[test]
    fn test_denied_and_restricted_refuse() {
        let denied = StaticAuthorization::new(AuthorizationStatus::Denied, true);
        let restricted = StaticAuthorization::new(AuthorizationStatus::Restricted, true);
        assert!(!resolve(&denied));
        assert!(!resolve(&restricted));
    }

    #[test]
    fn test_undetermined_prompts_once() {
        let provider = CountingPrompt {
            prompts: AtomicUsize::new(0),
            answer: true,
        };
        assert!(resolve(&provider));
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 1);

        let refused = CountingPrompt {
            prompts: AtomicUsize::new(0),
            answer: false,
        };
        assert!(!resolve(&refused));
    }
}
