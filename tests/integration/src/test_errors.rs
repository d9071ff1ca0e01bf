//! Control-plane failures and how they surface.

#[cfg(test)]
mod tests {
    use edgepurge_client::ApiErrorKind;
    use edgepurge_coordinator::CurrentStatus;

    use crate::Harness;

    fn error_body(code: &str, message: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<ErrorResponse xmlns="http://cloudfront.amazonaws.com/doc/2020-05-31/">
  <Error><Type>Sender</Type><Code>{code}</Code><Message>{message}</Message></Error>
  <RequestId>b3e0b2a4-0000-0000-0000-000000000000</RequestId>
</ErrorResponse>"#
        )
    }

    #[tokio::test]
    async fn test_should_classify_control_plane_errors() {
        let cases = [
            (
                404,
                "NoSuchDistribution",
                "The specified distribution does not exist.",
                ApiErrorKind::DistributionNotFound,
            ),
            (
                403,
                "InvalidClientTokenId",
                "The security token included in the request is invalid.",
                ApiErrorKind::InvalidCredentials,
            ),
            (
                403,
                "SignatureDoesNotMatch",
                "The request signature we calculated does not match.",
                ApiErrorKind::InvalidCredentials,
            ),
            (
                400,
                "TooManyInvalidationsInProgress",
                "Too many invalidations in progress.",
                ApiErrorKind::RateLimited,
            ),
            (
                400,
                "InvalidArgument",
                "Your request contains one or more invalid invalidation paths.",
                ApiErrorKind::Generic,
            ),
        ];

        for (status, code, message, expected) in cases {
            let h = Harness::start().await;
            h.reject_invalidations(status, &error_body(code, message)).await;
            let coordinator = h.coordinator();

            let err = coordinator
                .invalidate_paths(&["/a".to_owned()], false)
                .await
                .unwrap_err();
            assert_eq!(err.api_kind(), Some(expected), "code: {code}");

            let status = coordinator.get_status().unwrap();
            assert_eq!(status.current_status, CurrentStatus::Error);
            assert!(status.last_error.unwrap().message.contains(message));
        }
    }

    #[tokio::test]
    async fn test_should_report_unparseable_error_bodies() {
        let h = Harness::start().await;
        h.reject_invalidations(503, "<html>Service Unavailable").await;
        let coordinator = h.coordinator();

        let err = coordinator
            .invalidate_paths(&["/a".to_owned()], false)
            .await
            .unwrap_err();
        assert_eq!(err.api_kind(), Some(ApiErrorKind::Generic));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_should_clear_error_after_next_success() {
        let h = Harness::start().await;
        h.reject_invalidations(400, &error_body("Throttling", "Rate exceeded"))
            .await;
        let coordinator = h.coordinator();
        coordinator
            .invalidate_paths(&["/a".to_owned()], false)
            .await
            .unwrap_err();

        h.server.reset().await;
        h.accept_invalidations().await;
        coordinator.invalidate_all().await.unwrap();

        let status = coordinator.get_status().unwrap();
        assert_eq!(status.current_status, CurrentStatus::Idle);
        assert_eq!(status.last_error, None);
        assert!(status.last_success.is_some());
    }
}
