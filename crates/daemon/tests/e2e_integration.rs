//! End-to-end integration tests for filemover.
//!
//! These tests verify complete flows work correctly:
//! - File sessions over TCP (list paging, reads, errors)
//! - Interactive selection sessions over TCP
//! - Local selection sessions with the default sink

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use daemon::config::Config;
use daemon::files::RemoteFileService;
use daemon::selection::{Phase, RootSink, SelectionSession, SendDispatcher};
use daemon::server::SessionServer;
use daemon::transport::FrameStream;
use protocol::messages::{Close, FileRequest, Hello, Input, ListAt, ReadAt};
use protocol::{ErrorCode, InputEvent, Message, OpenIntent, SessionKind};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Create a served root with three candidate files and some noise.
fn create_test_root() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a"), "alpha").unwrap();
    fs::write(temp_dir.path().join("b"), "bravo").unwrap();
    fs::write(temp_dir.path().join("c"), "charlie").unwrap();
    fs::write(temp_dir.path().join("notes.md"), "not offered").unwrap();
    fs::create_dir(temp_dir.path().join("empty")).unwrap();
    temp_dir
}

fn test_config(root: &TempDir) -> Config {
    let mut config = Config::default();
    config.files.root = root.path().to_path_buf();
    config.files.candidates = "c, a,b,missing".to_string();
    config.server.listen_addr = "127.0.0.1:0".to_string();
    config
}

async fn start_server(config: &Config) -> (SocketAddr, CancellationToken) {
    let root = config.resolved_root().unwrap();
    let server = SessionServer::bind(
        &config.server.listen_addr,
        Arc::new(RemoteFileService::new(&root)),
        config.candidate_files(),
        SendDispatcher::new(RootSink::new(&root)),
        config.server.max_sessions,
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let token = CancellationToken::new();
    tokio::spawn(server.run(token.clone()));
    (addr, token)
}

async fn connect(addr: SocketAddr, kind: SessionKind) -> FrameStream<TcpStream> {
    let mut frames = FrameStream::new(TcpStream::connect(addr).await.unwrap());
    frames
        .send(Message::Hello(Hello { kind, client: None }))
        .await
        .unwrap();
    frames
}

async fn request(frames: &mut FrameStream<TcpStream>, message: Message) -> Message {
    let sequence = frames.send(message).await.unwrap();
    let envelope = tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("timed out waiting for response")
        .unwrap()
        .expect("connection closed");
    assert_eq!(envelope.sequence, sequence);
    envelope.payload
}

async fn next_view(frames: &mut FrameStream<TcpStream>) -> String {
    let envelope = tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .expect("timed out waiting for view")
        .unwrap()
        .expect("connection closed");
    match envelope.payload {
        Message::View(view) => view.text,
        other => panic!("expected View, got {:?}", other),
    }
}

// =============================================================================
// File Session Tests
// =============================================================================

#[tokio::test]
async fn test_list_paging_over_tcp() {
    let root = create_test_root();
    let (addr, token) = start_server(&test_config(&root)).await;
    let mut frames = connect(addr, SessionKind::Files).await;

    let cursor = match request(&mut frames, Message::FileRequest(FileRequest::list("/"))).await {
        Message::CursorOpened(opened) => {
            assert_eq!(opened.len, 5);
            opened.cursor
        }
        other => panic!("expected CursorOpened, got {:?}", other),
    };

    let mut names = Vec::new();
    let mut offset = 0;
    loop {
        let page = match request(
            &mut frames,
            Message::ListAt(ListAt {
                cursor,
                offset,
                count: 2,
            }),
        )
        .await
        {
            Message::ListPage(page) => page,
            other => panic!("expected ListPage, got {:?}", other),
        };
        offset += page.entries.len() as u64;
        names.extend(page.entries.into_iter().map(|e| e.name));
        if page.end_of_list {
            break;
        }
    }
    assert_eq!(names, vec!["a", "b", "c", "empty", "notes.md"]);

    assert!(matches!(
        request(&mut frames, Message::Close(Close { id: cursor })).await,
        Message::Closed(c) if c.id == cursor
    ));
    token.cancel();
}

#[tokio::test]
async fn test_empty_directory_over_tcp() {
    let root = create_test_root();
    let (addr, token) = start_server(&test_config(&root)).await;
    let mut frames = connect(addr, SessionKind::Files).await;

    let cursor = match request(&mut frames, Message::FileRequest(FileRequest::list("empty"))).await
    {
        Message::CursorOpened(opened) => {
            assert_eq!(opened.len, 0);
            opened.cursor
        }
        other => panic!("expected CursorOpened, got {:?}", other),
    };

    let page = request(
        &mut frames,
        Message::ListAt(ListAt {
            cursor,
            offset: 0,
            count: 10,
        }),
    )
    .await;
    assert!(matches!(page, Message::ListPage(p) if p.entries.is_empty() && p.end_of_list));
    token.cancel();
}

#[tokio::test]
async fn test_read_file_over_tcp() {
    let root = create_test_root();
    let (addr, token) = start_server(&test_config(&root)).await;
    let mut frames = connect(addr, SessionKind::Files).await;

    let handle = match request(
        &mut frames,
        Message::FileRequest(FileRequest::read("/c", OpenIntent::read_only())),
    )
    .await
    {
        Message::HandleOpened(opened) => opened.handle,
        other => panic!("expected HandleOpened, got {:?}", other),
    };

    match request(
        &mut frames,
        Message::ReadAt(ReadAt {
            handle,
            offset: 0,
            len: 1024,
        }),
    )
    .await
    {
        Message::FileData(data) => {
            assert_eq!(data.data, b"charlie");
            assert!(data.eof);
        }
        other => panic!("expected FileData, got {:?}", other),
    }
    token.cancel();
}

#[tokio::test]
async fn test_errors_over_tcp() {
    let root = create_test_root();
    let (addr, token) = start_server(&test_config(&root)).await;
    let mut frames = connect(addr, SessionKind::Files).await;

    let unsupported = FileRequest {
        method: "Setstat".to_string(),
        path: "a".to_string(),
        open: OpenIntent::default(),
    };
    match request(&mut frames, Message::FileRequest(unsupported)).await {
        Message::Error(e) => {
            assert_eq!(e.code, ErrorCode::Unsupported);
            assert_eq!(e.message, "unsupported operation: Setstat");
        }
        other => panic!("expected Error, got {:?}", other),
    }

    match request(&mut frames, Message::FileRequest(FileRequest::list("a"))).await {
        Message::Error(e) => assert_eq!(e.code, ErrorCode::NotADirectory),
        other => panic!("expected Error, got {:?}", other),
    }

    match request(&mut frames, Message::FileRequest(FileRequest::stat("nope"))).await {
        Message::Error(e) => assert_eq!(e.code, ErrorCode::NotFound),
        other => panic!("expected Error, got {:?}", other),
    }

    // The session survives errors.
    assert!(matches!(
        request(&mut frames, Message::FileRequest(FileRequest::stat("/"))).await,
        Message::CursorOpened(_)
    ));
    token.cancel();
}

// =============================================================================
// Interactive Session Tests
// =============================================================================

#[tokio::test]
async fn test_select_and_send_over_tcp() {
    let root = create_test_root();
    let (addr, token) = start_server(&test_config(&root)).await;
    let mut frames = connect(addr, SessionKind::Interactive).await;

    assert_eq!(
        next_view(&mut frames).await,
        "These are your options\n> [ ] a\n  [ ] b\n  [ ] c\n\nPress q to quit.\nPress r to receive selected files.\n"
    );

    for event in [
        InputEvent::ToggleSelect,
        InputEvent::MoveDown,
        InputEvent::MoveDown,
        InputEvent::ToggleSelect,
    ] {
        frames.send(Message::Input(Input { event })).await.unwrap();
        next_view(&mut frames).await;
    }

    frames
        .send(Message::Input(Input {
            event: InputEvent::SendTrigger,
        }))
        .await
        .unwrap();
    assert_eq!(next_view(&mut frames).await, "Sending files...");
    assert_eq!(next_view(&mut frames).await, "Files sent\nPress q to quit.\n");

    frames
        .send(Message::Input(Input {
            event: InputEvent::Quit,
        }))
        .await
        .unwrap();
    let end = tokio::time::timeout(Duration::from_secs(5), frames.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(end.is_none());
    token.cancel();
}

#[tokio::test]
async fn test_send_with_nothing_selected_stays_browsing() {
    let root = create_test_root();
    let (addr, token) = start_server(&test_config(&root)).await;
    let mut frames = connect(addr, SessionKind::Interactive).await;
    let initial = next_view(&mut frames).await;

    frames
        .send(Message::Input(Input {
            event: InputEvent::SendTrigger,
        }))
        .await
        .unwrap();
    assert_eq!(next_view(&mut frames).await, initial);
    token.cancel();
}

// =============================================================================
// Local Session Tests
// =============================================================================

#[tokio::test]
async fn test_local_session_reports_missing_file() {
    let root = create_test_root();
    let config = test_config(&root);
    let dispatcher = SendDispatcher::new(RootSink::new(root.path()));
    let (session, input) =
        SelectionSession::open(&config.candidate_files(), root.path(), dispatcher).unwrap();
    assert_eq!(session.state().choices(), &["a", "b", "c"]);

    let (views_tx, mut views) = mpsc::channel(16);
    let task = tokio::spawn(session.run(views_tx));
    views.recv().await.unwrap();

    // Select "b", then remove it before sending.
    input.send(InputEvent::MoveDown.into()).await.unwrap();
    input.send(InputEvent::ToggleSelect.into()).await.unwrap();
    views.recv().await.unwrap();
    views.recv().await.unwrap();
    fs::remove_file(root.path().join("b")).unwrap();

    input.send(InputEvent::SendTrigger.into()).await.unwrap();
    assert_eq!(views.recv().await.unwrap(), "Sending files...");
    assert_eq!(views.recv().await.unwrap(), "Files sent\nPress q to quit.\n");

    input.send(InputEvent::Quit.into()).await.unwrap();
    let state = task.await.unwrap();
    assert_eq!(state.phase(), Phase::Sent);

    let report = state.report().unwrap();
    assert!(report.sent.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "b");
}
