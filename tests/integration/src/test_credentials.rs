//! Credential precedence as seen on the wire.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use edgepurge_auth::{CredentialResolver, InstanceMetadataClient};
    use edgepurge_client::ClientError;
    use edgepurge_core::{
        DistributionConfig, DistributionId, InstanceMetadataMode, InvalidationBatch,
        InvalidationPath, LayeredConfigSource,
    };
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::{DISTRIBUTION_ID, Harness};

    async fn metadata_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/latest/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("tok"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("web-role"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/latest/meta-data/iam/security-credentials/web-role"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"Code":"Success","AccessKeyId":"ASIAROLE","SecretAccessKey":"rs","Token":"session-token","Expiration":"2099-01-01T00:00:00Z"}"#,
            ))
            .mount(&server)
            .await;
        server
    }

    fn batch() -> InvalidationBatch {
        let mut batch = InvalidationBatch::default();
        batch.insert(InvalidationPath::new("/").unwrap());
        batch
    }

    fn distribution() -> DistributionId {
        DistributionId::new(DISTRIBUTION_ID).unwrap()
    }

    async fn last_authorization(h: &Harness) -> (String, Option<String>) {
        let requests = h.server.received_requests().await.unwrap();
        let last = requests.last().unwrap();
        let header = |name: &str| {
            last.headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        (
            header("authorization").unwrap_or_default(),
            header("x-amz-security-token"),
        )
    }

    fn resolver(metadata: &MockServer, settings: LayeredConfigSource) -> CredentialResolver {
        let client = InstanceMetadataClient::new(metadata.uri(), Duration::from_secs(1)).unwrap();
        CredentialResolver::new()
            .with_instance_metadata(client, InstanceMetadataMode::Enabled)
            .with_settings(Arc::new(settings))
    }

    #[tokio::test]
    async fn test_should_sign_with_static_keys_before_persisted_and_metadata() {
        let h = Harness::start().await;
        h.accept_invalidations().await;
        let metadata = metadata_server().await;
        let settings = LayeredConfigSource {
            static_config: DistributionConfig {
                access_key_id: Some("AKIDSTATIC".to_owned()),
                secret_access_key: Some("ss".to_owned()),
                ..DistributionConfig::default()
            },
            managed_identity: false,
            persisted: Some(DistributionConfig {
                access_key_id: Some("AKIDPERSISTED".to_owned()),
                secret_access_key: Some("ps".to_owned()),
                ..DistributionConfig::default()
            }),
        };

        h.client_with(Arc::new(resolver(&metadata, settings)))
            .create_invalidation(&distribution(), &batch())
            .await
            .unwrap();

        let (authorization, token) = last_authorization(&h).await;
        assert!(authorization.contains("Credential=AKIDSTATIC/20240501/us-east-1/cloudfront/aws4_request"));
        assert_eq!(token, None);
        assert!(metadata.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_sign_with_persisted_keys_when_no_static_keys() {
        let h = Harness::start().await;
        h.accept_invalidations().await;
        let metadata = metadata_server().await;
        let settings = LayeredConfigSource {
            persisted: Some(DistributionConfig {
                access_key_id: Some("AKIDPERSISTED".to_owned()),
                secret_access_key: Some("ps".to_owned()),
                ..DistributionConfig::default()
            }),
            ..LayeredConfigSource::default()
        };

        h.client_with(Arc::new(resolver(&metadata, settings)))
            .create_invalidation(&distribution(), &batch())
            .await
            .unwrap();

        let (authorization, _) = last_authorization(&h).await;
        assert!(authorization.contains("Credential=AKIDPERSISTED/"));
    }

    #[tokio::test]
    async fn test_should_fall_back_to_instance_role_under_managed_identity() {
        let h = Harness::start().await;
        h.accept_invalidations().await;
        let metadata = metadata_server().await;
        let settings = LayeredConfigSource {
            managed_identity: true,
            persisted: Some(DistributionConfig {
                access_key_id: Some("AKIDPERSISTED".to_owned()),
                secret_access_key: Some("ps".to_owned()),
                ..DistributionConfig::default()
            }),
            ..LayeredConfigSource::default()
        };

        h.client_with(Arc::new(resolver(&metadata, settings)))
            .create_invalidation(&distribution(), &batch())
            .await
            .unwrap();

        let (authorization, token) = last_authorization(&h).await;
        assert!(authorization.contains("Credential=ASIAROLE/"));
        assert!(authorization.contains("x-amz-security-token"));
        assert_eq!(token.as_deref(), Some("session-token"));
    }

    #[tokio::test]
    async fn test_should_fail_without_any_credentials() {
        let h = Harness::start().await;
        let client = h.client_with(Arc::new(CredentialResolver::new()));

        let err = client
            .create_invalidation(&distribution(), &batch())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Credentials));
        assert!(h.server.received_requests().await.unwrap().is_empty());
    }
}
