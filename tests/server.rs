//! The HTTP boundary, driven over a loopback socket.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use solos::registrar::{Loggers, TracingLoggers};
use solos::{Context, Endpoint, Error, Hook, HookError, Module, RouteTemplate, Router, Segment, Server, StatusCode, Verb};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

fn literal(text: &str) -> Segment {
    Segment::Literal(text.to_owned())
}

fn endpoint(segments: Vec<Segment>, verb: Verb, module: Module) -> Endpoint {
    let loggers: Arc<dyn Loggers> = Arc::new(TracingLoggers);
    Endpoint::bind(RouteTemplate::new(segments), Some(verb), PathBuf::from("get.js"), Arc::new(module), &loggers)
}

struct Running {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    server: JoinHandle<Result<(), Error>>,
}

async fn start(router: Router) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(Server::from_listener(listener).serve_with_shutdown(router, async {
        let _ = stopped.await;
    }));
    Running { addr, stop, server }
}

/// Sends one HTTP/1.1 request and returns the status code and body.
async fn send(addr: SocketAddr, method: &str, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let head = format!("{method} {path} HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\ncontent-length: 0\r\n\r\n");
    stream.write_all(head.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    let status = raw.split(' ').nth(1).unwrap().parse().unwrap();
    let body = raw.split_once("\r\n\r\n").map(|(_, body)| body.to_owned()).unwrap_or_default();
    (status, body)
}

fn router(after_ran: Arc<AtomicBool>) -> Router {
    let echo = Module::new().respond(Hook::future(|mut ctx: Context| async move {
        let id = ctx.request().param("bId").unwrap_or_default().to_owned();
        ctx.send(id);
        Ok(ctx)
    }));
    let forbidden = Module::new()
        .validate(Hook::future(|_ctx| async { Err(HookError::with_status(StatusCode::FORBIDDEN, "not yours")) }))
        .respond(Hook::future(|mut ctx: Context| async move {
            ctx.send("unreachable");
            Ok(ctx)
        }));
    let slow_after = Module::new()
        .respond(Hook::future(|mut ctx: Context| async move {
            ctx.send("sent");
            Ok(ctx)
        }))
        .after(Hook::future(move |ctx| {
            let after_ran = Arc::clone(&after_ran);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                after_ran.store(true, Ordering::SeqCst);
                Ok(ctx)
            }
        }));

    Router::from_endpoints([
        endpoint(vec![literal("a")], Verb::Get, Module::new()),
        endpoint(
            vec![literal("b"), Segment::Param { name: "bId".to_owned(), token: ":bId".to_owned() }],
            Verb::Get,
            echo,
        ),
        endpoint(vec![literal("c")], Verb::Get, forbidden),
        endpoint(vec![literal("slow")], Verb::Get, slow_after),
    ])
    .unwrap()
}

#[tokio::test]
async fn answers_from_respond_or_projects_the_failure() {
    let running = start(router(Arc::new(AtomicBool::new(false)))).await;

    assert_eq!(send(running.addr, "GET", "/b/7").await, (200, "7".to_owned()));
    assert_eq!(send(running.addr, "GET", "/a").await.0, 405);
    assert_eq!(send(running.addr, "GET", "/c").await, (403, "not yours".to_owned()));

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_paths_and_verbs_are_rejected() {
    let running = start(router(Arc::new(AtomicBool::new(false)))).await;

    assert_eq!(send(running.addr, "POST", "/b/7").await.0, 405);
    assert_eq!(send(running.addr, "DELETE", "/a").await.0, 405);
    assert_eq!(send(running.addr, "GET", "/zz").await.0, 404);

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_waits_for_running_after_hooks() {
    let after_ran = Arc::new(AtomicBool::new(false));
    let running = start(router(Arc::clone(&after_ran))).await;

    assert_eq!(send(running.addr, "GET", "/slow").await, (200, "sent".to_owned()));

    running.stop.send(()).unwrap();
    running.server.await.unwrap().unwrap();
    assert!(after_ran.load(Ordering::SeqCst));
}
