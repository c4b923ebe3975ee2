use chatload_core::Config;
use mock_service::{MockConfig, MockServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_env_filter("chatload=debug,chatload_core=debug,mock_service=debug")
            .with_test_writer()
            .init();
    });
}

/// Starts a mock service and builds a fast config pointed at it.
#[allow(unused)]
pub async fn setup(
    mock: MockConfig,
    users: usize,
    batch_size: usize,
    messages: usize,
) -> (MockServer, Config) {
    init();
    let server = MockServer::spawn(mock).await.unwrap();
    let config = Config {
        target_base_url: server.base_url(),
        ws_url: server.ws_url(),
        total_users: users,
        batch_size,
        messages_per_user: messages,
        message_interval: Duration::from_millis(10),
        heartbeat_interval: Duration::from_millis(50),
        session_hold: Duration::from_millis(200),
        ack_timeout: Duration::from_millis(500),
        typing_cycles: 1,
        typing_unit: Duration::from_millis(10),
        drain_poll_interval: Duration::from_millis(20),
        connect_timeout: Duration::from_secs(2),
        registration_timeout: Duration::from_secs(5),
        report_path: report_path("default"),
        ..Default::default()
    };
    (server, config)
}

/// A local port that accepts connections and then never says a word.
#[allow(unused)]
pub async fn silent_listener() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = vec![];
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

#[allow(unused)]
pub fn report_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "chatload-{name}-{}-report.json",
        std::process::id()
    ))
}
