//! Coordinator state surviving a process restart.

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use edgepurge_coordinator::{CurrentStatus, RetryOutcome, SubmitOutcome};

    use crate::{Harness, paths_of};

    #[tokio::test]
    async fn test_should_resume_pending_retry_after_restart() {
        let h = Harness::start().await;
        h.accept_invalidations().await;

        {
            let first = h.coordinator();
            first
                .invalidate_paths(&["/a".to_owned()], false)
                .await
                .unwrap();
            let deferred = first
                .invalidate_paths(&["/b".to_owned()], false)
                .await
                .unwrap();
            assert!(matches!(deferred, SubmitOutcome::Deferred { .. }));
        }

        let restarted = h.coordinator();
        assert_eq!(
            restarted.get_status().unwrap().current_status,
            CurrentStatus::Scheduled
        );
        assert_eq!(restarted.tick().await.unwrap(), None);

        h.clock.advance(TimeDelta::seconds(60));
        let outcome = restarted.tick().await.unwrap();
        assert!(matches!(outcome, Some(RetryOutcome::Submitted(_))));

        let sent = h.sent_invalidations().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(paths_of(&sent[1]), vec!["/b"]);
    }

    #[tokio::test]
    async fn test_should_send_pending_batch_after_long_downtime() {
        let h = Harness::start().await;
        h.accept_invalidations().await;

        {
            let first = h.coordinator();
            first
                .invalidate_paths(&["/a".to_owned()], false)
                .await
                .unwrap();
            h.clock.advance(TimeDelta::seconds(10));
            first
                .invalidate_paths(&["/b".to_owned()], false)
                .await
                .unwrap();
        }

        h.clock.advance(TimeDelta::minutes(15));
        let restarted = h.coordinator();
        let outcome = restarted.tick().await.unwrap();
        assert!(matches!(outcome, Some(RetryOutcome::Submitted(_))));

        let sent = h.sent_invalidations().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(paths_of(&sent[1]), vec!["/b"]);
        assert_eq!(
            restarted.get_status().unwrap().current_status,
            CurrentStatus::Idle
        );
    }

    #[tokio::test]
    async fn test_should_report_pending_batch_that_lapsed() {
        let h = Harness::start().await;
        h.accept_invalidations().await;
        let coordinator = h.coordinator();

        coordinator
            .invalidate_paths(&["/a".to_owned()], false)
            .await
            .unwrap();
        coordinator
            .invalidate_paths(&["/b".to_owned()], false)
            .await
            .unwrap();

        h.clock.advance(TimeDelta::days(2));
        let outcome = coordinator.tick().await.unwrap();
        assert!(matches!(outcome, Some(RetryOutcome::Expired { .. })));
        assert_eq!(coordinator.pending().unwrap(), None);

        let status = coordinator.get_status().unwrap();
        assert_eq!(status.current_status, CurrentStatus::Error);
        assert!(status.last_error.unwrap().message.contains("expired"));
        assert_eq!(h.sent_invalidations().await.len(), 1);
    }
}
