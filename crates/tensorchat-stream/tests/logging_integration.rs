#![allow(clippy::unwrap_used, clippy::expect_used)]

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tensorchat_core::{StreamRequest, TensorConfig};
use tensorchat_stream::{create_streaming_manager, TensorchatConfig};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

async fn mock_stream() -> MockServer {
    let server = MockServer::start().await;
    let body = [
        r#"data: {"type":"tensor_chunk","index":0,"chunk":"hi"}"#,
        r#"data: {"type":"tensor_complete","index":0}"#,
        r#"data: {"type":"complete","totalTensors":1}"#,
    ]
    .map(|f| format!("{f}\n\n"))
    .concat();
    Mock::given(method("POST"))
        .and(path("/streamProcess"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;
    server
}

/// Runs one collect call plus a teardown and returns the engine's log output.
async fn run_logged(verbose: bool) -> String {
    let server = mock_stream().await;
    let captured = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("tensorchat_stream=trace"))
        .with_writer(captured.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let manager = create_streaming_manager(
        TensorchatConfig::new("tc-key")
            .with_base_url(server.uri())
            .with_verbose(verbose),
    )
    .unwrap();
    let request = StreamRequest::new("ctx", "model").tensor(TensorConfig::new("one"));
    let output = manager.process_single(&request).await.unwrap();
    assert_eq!(output.tensors.len(), 1);
    manager.destroy();

    captured.text()
}

// ---------------------------------------------------------------------------
// 1. The verbose flag gates every engine log line
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quiet_client_emits_no_logs() {
    let logs = run_logged(false).await;
    assert!(logs.is_empty(), "unexpected output: {logs}");
}

#[tokio::test]
async fn verbose_client_logs_lifecycle() {
    let logs = run_logged(true).await;
    for line in [
        "opening stream",
        "stream session opened",
        "stream session closed",
        "process_single finished",
        "streaming manager destroy",
    ] {
        assert!(logs.contains(line), "missing '{line}' in: {logs}");
    }
}
