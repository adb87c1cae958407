//! Session-level orchestration over [`UploadCoordinator`].

use estateid_auth::AuthSession;
use estateid_core::{ClientConfig, SessionId, UploadFile};
use futures::StreamExt;
use futures::stream;
use tracing::{info, warn};

use crate::api::ReceiptAck;
use crate::coordinator::UploadCoordinator;
use crate::error::{FileFailure, UploadError, UploadResult};

/// One observable step of a session upload.
///
/// Steps of one file keep their order. Files are appended as they finish, so
/// steps of different files are grouped per file in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend issued a pre-signed URL for a file.
    TargetIssued {
        /// Object name of the file.
        object_name: String,
    },
    /// Object storage accepted the bytes of a file.
    Transferred {
        /// Object name of the file.
        object_name: String,
        /// Number of bytes sent.
        size: usize,
    },
    /// A file stopped at its URL request or its transfer.
    FileFailed {
        /// Object name of the file.
        object_name: String,
        /// Rendered phase error.
        reason: String,
    },
    /// The backend acknowledged session completion.
    CompletionReported,
}

/// A file that reached object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Object name of the file.
    pub object_name: String,
    /// Number of bytes transferred.
    pub size: usize,
}

/// Outcome of a fully completed session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// The session that was completed.
    pub session_id: SessionId,
    /// Files in completion order.
    pub uploaded: Vec<UploadedFile>,
    /// Backend acknowledgement of the completion report.
    pub receipt: ReceiptAck,
    /// Trace of the session, completion report last.
    pub events: Vec<SessionEvent>,
}

/// What one file's A and B phases produced.
struct FileOutcome {
    file: UploadFile,
    events: Vec<SessionEvent>,
    result: UploadResult<()>,
}

/// Uploads every file of a session, then reports completion once.
///
/// Files run concurrently as futures polled by the calling task. Completion is
/// reported only when every file's URL request and transfer succeeded;
/// otherwise [`UploadError::IncompleteSession`] lists the failures and the
/// backend is never told the session is complete.
#[derive(Debug, Clone)]
pub struct SessionUploader {
    coordinator: UploadCoordinator,
    concurrency: usize,
}

impl SessionUploader {
    /// Wrap `coordinator`, keeping at most `concurrency` files in flight.
    #[must_use]
    pub fn new(coordinator: UploadCoordinator, concurrency: usize) -> Self {
        Self {
            coordinator,
            concurrency: concurrency.max(1),
        }
    }

    /// Build an uploader from client configuration.
    pub fn from_config(config: &ClientConfig) -> UploadResult<Self> {
        Ok(Self::new(
            UploadCoordinator::from_config(config)?,
            config.upload_concurrency,
        ))
    }

    /// The underlying coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &UploadCoordinator {
        &self.coordinator
    }

    /// Upload `files` under `session_id` and report completion.
    ///
    /// # Errors
    ///
    /// - [`UploadError::EmptySession`] when `files` is empty; nothing is sent.
    /// - [`UploadError::CredentialUnavailable`] (or another identity error)
    ///   when the session lacks signing credentials or a usable identity;
    ///   nothing is sent.
    /// - [`UploadError::IncompleteSession`] when any file failed.
    /// - [`UploadError::CompletionReportFailed`] when every file succeeded but
    ///   the completion report did not.
    pub async fn upload(
        &self,
        session: &AuthSession,
        session_id: &SessionId,
        files: Vec<UploadFile>,
    ) -> UploadResult<SessionReport> {
        if files.is_empty() {
            return Err(UploadError::EmptySession);
        }
        session.credentials().await?;
        session.subject().await?;

        let total = files.len();
        info!(
            session_id = %session_id,
            files = total,
            concurrency = self.concurrency,
            "Starting session upload"
        );

        let mut outcomes = stream::iter(files)
            .map(|file| self.upload_file(session, session_id, file))
            .buffer_unordered(self.concurrency);

        let mut events = Vec::with_capacity(2 * total + 1);
        let mut uploaded = Vec::with_capacity(total);
        let mut failed = Vec::new();

        while let Some(outcome) = outcomes.next().await {
            events.extend(outcome.events);
            let file = outcome.file;
            match outcome.result {
                Ok(()) => uploaded.push(UploadedFile {
                    size: file.len(),
                    object_name: file.name,
                }),
                Err(error) => failed.push(FileFailure {
                    object_name: file.name,
                    error,
                }),
            }
        }

        if !failed.is_empty() {
            warn!(
                session_id = %session_id,
                failed = failed.len(),
                total,
                "Session incomplete, completion not reported"
            );
            return Err(UploadError::IncompleteSession {
                session_id: session_id.clone(),
                total,
                failed,
                events,
            });
        }

        let receipt = self.coordinator.report_completion(session, session_id).await?;
        events.push(SessionEvent::CompletionReported);

        Ok(SessionReport {
            session_id: session_id.clone(),
            uploaded,
            receipt,
            events,
        })
    }

    async fn upload_file(
        &self,
        session: &AuthSession,
        session_id: &SessionId,
        file: UploadFile,
    ) -> FileOutcome {
        let mut events = Vec::with_capacity(2);
        let result = async {
            let target = self
                .coordinator
                .request_upload_target(session, session_id, &file.name)
                .await?;
            events.push(SessionEvent::TargetIssued {
                object_name: file.name.clone(),
            });

            self.coordinator.transfer_bytes(&target, &file).await?;
            events.push(SessionEvent::Transferred {
                object_name: file.name.clone(),
                size: file.len(),
            });
            Ok::<(), UploadError>(())
        }
        .await;

        if let Err(error) = &result {
            events.push(SessionEvent::FileFailed {
                object_name: file.name.clone(),
                reason: error.to_string(),
            });
        }

        FileOutcome {
            file,
            events,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use estateid_auth::{AuthError, CredentialProvider, Credentials, IdentityToken};
    use mockito::Matcher;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::test_support::{TEST_ID_TOKEN, TEST_SUBJECT, coordinator_for, signed_in_session};

    async fn mock_object(
        server: &mut mockito::ServerGuard,
        name: &str,
        put_status: usize,
    ) -> (mockito::Mock, mockito::Mock) {
        let put_path = format!("/storage/{name}");
        let signed_url = format!("{}{put_path}", server.url());
        let target = server
            .mock("POST", "/upload_url")
            .match_body(Matcher::PartialJson(json!({
                "session_id": "s1",
                "object_name": name,
            })))
            .with_status(200)
            .with_body(json!({ "signed_url": signed_url }).to_string())
            .expect(1)
            .create_async()
            .await;
        let put = server
            .mock("PUT", put_path.as_str())
            .with_status(put_status)
            .expect(1)
            .create_async()
            .await;
        (target, put)
    }

    fn file(name: &str) -> UploadFile {
        UploadFile::new(name, "image/png", name.as_bytes().repeat(8))
    }

    #[tokio::test]
    async fn test_should_reject_empty_session_without_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let uploader = SessionUploader::new(coordinator_for(&server), 4);
        let result = uploader
            .upload(&signed_in_session(), &SessionId::new("s1").unwrap(), Vec::new())
            .await;

        assert!(matches!(result, Err(UploadError::EmptySession)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_should_reject_signed_out_session_without_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let uploader = SessionUploader::new(coordinator_for(&server), 4);
        let result = uploader
            .upload(
                &AuthSession::signed_out(),
                &SessionId::new("s1").unwrap(),
                vec![file("a.png")],
            )
            .await;

        assert!(matches!(result, Err(UploadError::CredentialUnavailable)));
        mock.assert_async().await;
    }

    struct TokenOnlyProvider;

    #[async_trait]
    impl CredentialProvider for TokenOnlyProvider {
        async fn credentials(&self) -> Result<Credentials, AuthError> {
            Err(AuthError::CredentialUnavailable)
        }

        async fn identity_token(&self) -> Result<IdentityToken, AuthError> {
            Ok(IdentityToken::new(TEST_ID_TOKEN))
        }
    }

    #[tokio::test]
    async fn test_should_reject_session_without_signing_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let uploader = SessionUploader::new(coordinator_for(&server), 4);
        let result = uploader
            .upload(
                &AuthSession::new(TokenOnlyProvider),
                &SessionId::new("s1").unwrap(),
                vec![file("a.png"), file("b.png")],
            )
            .await;

        assert!(matches!(result, Err(UploadError::CredentialUnavailable)));
        mock.assert_async().await;
    }

    /// Read one HTTP request from `stream`, returning its path.
    async fn read_request_path(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed mid-request");
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).into_owned();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                return head.split_whitespace().nth(1).unwrap().to_owned();
            }
        }
    }

    /// Storage stand-in that holds every PUT until `expected` are in flight,
    /// then answers them newest first. Returns the arrival order.
    async fn answer_in_reverse(listener: TcpListener, expected: usize) -> Vec<String> {
        let mut held = Vec::with_capacity(expected);
        for _ in 0..expected {
            let (mut stream, _) = listener.accept().await.unwrap();
            let path = read_request_path(&mut stream).await;
            held.push((path, stream));
        }

        let arrival = held.iter().map(|(path, _)| path.clone()).collect();
        while let Some((_, mut stream)) = held.pop() {
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        arrival
    }

    #[tokio::test]
    async fn test_should_keep_transfers_in_flight_together() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let storage_url = format!("http://{}", listener.local_addr().unwrap());
        let storage = tokio::spawn(answer_in_reverse(listener, 2));

        let mut server = mockito::Server::new_async().await;
        let mut targets = Vec::new();
        for name in ["a.png", "b.png"] {
            let signed_url = format!("{storage_url}/storage/{name}");
            let target = server
                .mock("POST", "/upload_url")
                .match_body(Matcher::PartialJson(json!({ "object_name": name })))
                .with_status(200)
                .with_body(json!({ "signed_url": signed_url }).to_string())
                .expect(1)
                .create_async()
                .await;
            targets.push(target);
        }
        let receipt = server
            .mock("POST", "/receipt_request")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let uploader = SessionUploader::new(coordinator_for(&server), 2);
        let report = tokio::time::timeout(
            Duration::from_secs(10),
            uploader.upload(
                &signed_in_session(),
                &SessionId::new("s1").unwrap(),
                vec![file("a.png"), file("b.png")],
            ),
        )
        .await
        .expect("transfers did not overlap")
        .unwrap();

        let arrival = storage.await.unwrap();
        let completed: Vec<_> = report
            .uploaded
            .iter()
            .map(|f| format!("/storage/{}", f.object_name))
            .collect();
        let mut reversed = arrival;
        reversed.reverse();
        assert_eq!(completed, reversed);
        assert_eq!(report.events.last(), Some(&SessionEvent::CompletionReported));
        for target in targets {
            target.assert_async().await;
        }
        receipt.assert_async().await;
    }

    #[tokio::test]
    async fn test_should_report_completion_once_after_all_transfers() {
        let mut server = mockito::Server::new_async().await;
        let a = mock_object(&mut server, "a.png", 200).await;
        let b = mock_object(&mut server, "b.png", 200).await;
        let c = mock_object(&mut server, "c.png", 200).await;
        let receipt = server
            .mock("POST", "/receipt_request")
            .match_body(Matcher::Json(json!({
                "session_id": "s1",
                "user_id": TEST_SUBJECT,
            })))
            .with_status(200)
            .with_body(r#"{"response":{"MessageId":"m-1"}}"#)
            .expect(1)
            .create_async()
            .await;

        let uploader = SessionUploader::new(coordinator_for(&server), 2);
        let report = uploader
            .upload(
                &signed_in_session(),
                &SessionId::new("s1").unwrap(),
                vec![file("a.png"), file("b.png"), file("c.png")],
            )
            .await
            .unwrap();

        assert_eq!(report.session_id.as_str(), "s1");
        assert_eq!(report.uploaded.len(), 3);
        assert!(report.uploaded.iter().all(|f| f.size == f.object_name.len() * 8));
        assert_eq!(report.events.len(), 7);
        assert_eq!(report.events.last(), Some(&SessionEvent::CompletionReported));
        for pair in report.events[..6].chunks(2) {
            match pair {
                [
                    SessionEvent::TargetIssued { object_name: issued },
                    SessionEvent::Transferred { object_name: sent, .. },
                ] => assert_eq!(issued, sent),
                other => panic!("expected target then transfer, got {other:?}"),
            }
        }
        assert_eq!(report.receipt.0["response"]["MessageId"], "m-1");

        for (target, put) in [a, b, c] {
            target.assert_async().await;
            put.assert_async().await;
        }
        receipt.assert_async().await;
    }

    #[tokio::test]
    async fn test_should_not_report_completion_when_a_transfer_fails() {
        let mut server = mockito::Server::new_async().await;
        let a = mock_object(&mut server, "a.png", 200).await;
        let b = mock_object(&mut server, "b.png", 403).await;
        let c = mock_object(&mut server, "c.png", 200).await;
        let receipt = server
            .mock("POST", "/receipt_request")
            .expect(0)
            .create_async()
            .await;

        let uploader = SessionUploader::new(coordinator_for(&server), 4);
        let result = uploader
            .upload(
                &signed_in_session(),
                &SessionId::new("s1").unwrap(),
                vec![file("a.png"), file("b.png"), file("c.png")],
            )
            .await;

        match result {
            Err(UploadError::IncompleteSession {
                session_id,
                total,
                failed,
                events,
            }) => {
                assert_eq!(session_id.as_str(), "s1");
                assert_eq!(total, 3);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].object_name, "b.png");
                assert!(matches!(failed[0].error, UploadError::TransferFailed { .. }));

                assert!(!events.contains(&SessionEvent::CompletionReported));
                assert!(events.contains(&SessionEvent::TargetIssued {
                    object_name: "b.png".to_owned(),
                }));
                assert!(events.iter().any(|e| matches!(
                    e,
                    SessionEvent::FileFailed { object_name, .. } if object_name == "b.png"
                )));
                let transferred: Vec<_> = events
                    .iter()
                    .filter_map(|e| match e {
                        SessionEvent::Transferred { object_name, .. } => Some(object_name.as_str()),
                        _ => None,
                    })
                    .collect();
                assert_eq!(transferred.len(), 2);
                assert!(!transferred.contains(&"b.png"));
            }
            other => panic!("expected incomplete session, got {other:?}"),
        }

        for (target, put) in [a, b, c] {
            target.assert_async().await;
            put.assert_async().await;
        }
        receipt.assert_async().await;
    }

    #[tokio::test]
    async fn test_should_not_report_completion_when_a_target_request_fails() {
        let mut server = mockito::Server::new_async().await;
        let _a = mock_object(&mut server, "a.png", 200).await;
        let rejected = server
            .mock("POST", "/upload_url")
            .match_body(Matcher::PartialJson(json!({ "object_name": "b.png" })))
            .with_status(500)
            .create_async()
            .await;
        let receipt = server
            .mock("POST", "/receipt_request")
            .expect(0)
            .create_async()
            .await;

        let uploader = SessionUploader::new(coordinator_for(&server), 1);
        let result = uploader
            .upload(
                &signed_in_session(),
                &SessionId::new("s1").unwrap(),
                vec![file("a.png"), file("b.png")],
            )
            .await;

        assert!(matches!(
            result,
            Err(UploadError::IncompleteSession { ref failed, .. })
                if matches!(failed[0].error, UploadError::UploadTargetRequestFailed { .. })
        ));
        rejected.assert_async().await;
        receipt.assert_async().await;
    }

    #[tokio::test]
    async fn test_should_surface_completion_failure_after_transfers() {
        let mut server = mockito::Server::new_async().await;
        let _a = mock_object(&mut server, "a.png", 200).await;
        let _receipt = server
            .mock("POST", "/receipt_request")
            .with_status(503)
            .create_async()
            .await;

        let uploader = SessionUploader::new(coordinator_for(&server), 4);
        let result = uploader
            .upload(
                &signed_in_session(),
                &SessionId::new("s1").unwrap(),
                vec![file("a.png")],
            )
            .await;

        assert!(matches!(
            result,
            Err(UploadError::CompletionReportFailed { .. })
        ));
    }

    #[test]
    fn test_should_clamp_zero_concurrency() {
        let endpoint = "api.example.com".parse().unwrap();
        let uploader = SessionUploader::new(
            UploadCoordinator::with_client(reqwest::Client::new(), endpoint),
            0,
        );
        assert_eq!(uploader.concurrency, 1);
    }
}
