//! Task-local transaction marker.
//!
//! Store mutators run their unit of work inside [`scope`]. Code that must never be
//! entered from within a transaction (the reclamation sweep) checks [`is_active`]
//! and fails fast.

use std::future::Future;

tokio::task_local! {
    static TRANSACTION_ACTIVE: ();
}

/// Run `future` with the transaction marker set for the current task
pub async fn scope<F>(future: F) -> F::Output
where
    F: Future,
{
    TRANSACTION_ACTIVE.scope((), future).await
}

/// Whether the current task is inside a [`scope`]
pub fn is_active() -> bool {
    TRANSACTION_ACTIVE.try_with(|_| ()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_marker_visible_only_inside_scope() {
        assert!(!is_active());
        let inside = scope(async { is_active() }).await;
        assert!(inside);
        assert!(!is_active());
    }

    #[tokio::test]
    async fn test_marker_does_not_leak_into_spawned_tasks() {
        let spawned = scope(async { tokio::spawn(async { is_active() }).await.unwrap() }).await;
        assert!(!spawned);
    }
}
