//! Publish-driven invalidation scenarios.

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use edgepurge_coordinator::{CurrentStatus, DebouncePolicy, RetryOutcome, SubmitOutcome};
    use edgepurge_core::Clock;

    use crate::{Harness, paths_of};

    #[tokio::test]
    async fn test_should_invalidate_home_and_post_on_publish() {
        let h = Harness::start().await;
        h.accept_invalidations().await;
        let coordinator = h.coordinator();

        let outcome = coordinator
            .on_content_change("draft", "publish", "42")
            .await
            .unwrap();
        assert!(matches!(outcome, Some(SubmitOutcome::Submitted(_))));

        let sent = h.sent_invalidations().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(paths_of(&sent[0]), vec!["/", "/hello-world/*"]);

        let status = coordinator.get_status().unwrap();
        assert_eq!(status.current_status, CurrentStatus::Idle);
        assert_eq!(status.last_success.unwrap().timestamp, h.clock.now());
    }

    #[tokio::test]
    async fn test_should_defer_second_publish_and_retry_with_union() {
        let h = Harness::start().await;
        h.accept_invalidations().await;
        let coordinator = h
            .coordinator()
            .with_path_resolver(std::sync::Arc::new(
                edgepurge_coordinator::StaticPathResolver::new()
                    .with("42", &["/hello-world/"])
                    .with("43", &["/second-post/"]),
            ));
        let start = h.clock.now();

        coordinator
            .on_content_change("draft", "publish", "42")
            .await
            .unwrap();
        h.clock.advance(TimeDelta::seconds(10));

        let outcome = coordinator
            .on_content_change("draft", "publish", "43")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Some(SubmitOutcome::Deferred {
                next_retry: start + TimeDelta::seconds(70),
                pending_items: 2,
            })
        );
        assert_eq!(h.sent_invalidations().await.len(), 1);

        let status = coordinator.get_status().unwrap();
        assert_eq!(status.current_status, CurrentStatus::Scheduled);

        h.clock.advance(TimeDelta::seconds(60));
        let retried = coordinator.tick().await.unwrap();
        assert!(matches!(retried, Some(RetryOutcome::Submitted(_))));

        let sent = h.sent_invalidations().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(paths_of(&sent[1]), vec!["/", "/second-post/*"]);
        assert_eq!(
            coordinator.get_status().unwrap().current_status,
            CurrentStatus::Idle
        );
    }

    #[tokio::test]
    async fn test_should_send_ten_paths_and_collapse_eleven() {
        let h = Harness::start().await;
        h.accept_invalidations().await;
        let coordinator = h.coordinator_with(DebouncePolicy::builder().deferral_enabled(false).build());

        let ten: Vec<String> = (0..10).map(|i| format!("/p{i}")).collect();
        coordinator.invalidate_paths(&ten, false).await.unwrap();

        let mut eleven = ten.clone();
        eleven.push("/p10".to_owned());
        coordinator.invalidate_paths(&eleven, false).await.unwrap();

        let sent = h.sent_invalidations().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(paths_of(&sent[0]), ten);
        assert_eq!(paths_of(&sent[1]), vec!["/*"]);
    }

    #[tokio::test]
    async fn test_should_treat_urls_and_paths_alike() {
        let h = Harness::start().await;
        h.accept_invalidations().await;
        let coordinator = h.coordinator();

        coordinator
            .invalidate_paths(
                &[
                    "https://blog.example.org/a/b?utm=1".to_owned(),
                    "/a/b".to_owned(),
                    "//cdn.example.org/c".to_owned(),
                    "mailto:editor@example.org".to_owned(),
                ],
                false,
            )
            .await
            .unwrap();

        let sent = h.sent_invalidations().await;
        assert_eq!(paths_of(&sent[0]), vec!["/a/b", "/c"]);
    }

    #[tokio::test]
    async fn test_should_ignore_unpublished_changes() {
        let h = Harness::start().await;
        let coordinator = h.coordinator();
        assert_eq!(
            coordinator
                .on_content_change("draft", "private", "42")
                .await
                .unwrap(),
            None
        );
        assert!(h.sent_invalidations().await.is_empty());
    }
}
