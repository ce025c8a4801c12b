//! Interceptor chain composition: ordering, short-circuiting and merging.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert2::{check, let_assert};
use bytes::Bytes;
use weft::middleware::SetHeader;
use weft::{
    BoxFuture, Chain, Client, Doer, Error, Interceptor, Method, Next, Reply, Request, Response,
    Result, ServiceTransport,
};

type Log = Arc<Mutex<Vec<String>>>;

fn entries(log: &Log) -> Vec<String> {
    log.lock().expect("log").clone()
}

/// Records entry and exit around `next`.
struct Recorder {
    name: &'static str,
    log: Log,
}

impl Recorder {
    fn shared(name: &'static str, log: &Log) -> Arc<dyn Interceptor> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
        })
    }
}

impl Interceptor for Recorder {
    fn intercept<'a>(
        &'a self,
        client: &'a Client,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        Box::pin(async move {
            self.log.lock().expect("log").push(format!("{}:in", self.name));
            let result = next.run(client, request).await;
            self.log.lock().expect("log").push(format!("{}:out", self.name));
            result
        })
    }
}

/// Refuses every call without delegating.
struct Deny;

impl Interceptor for Deny {
    fn intercept<'a>(
        &'a self,
        _client: &'a Client,
        _request: Request,
        _next: Next<'a>,
    ) -> BoxFuture<'a, Result<Reply>> {
        Box::pin(async { Err(Error::invalid_request("denied")) })
    }
}

/// Terminal that logs and answers 200 with the request headers.
struct Terminal {
    log: Log,
    calls: AtomicUsize,
}

impl Terminal {
    fn new(log: &Log) -> Self {
        Self {
            log: Arc::clone(log),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Doer for Terminal {
    fn call<'a>(&'a self, _client: &'a Client, request: Request) -> BoxFuture<'a, Result<Reply>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().expect("log").push("terminal".to_owned());
        let head = request.head();
        let headers = head.headers.clone();
        Box::pin(async move { Ok(Reply::new(head, Response::new(200, headers, Bytes::new()))) })
    }
}

fn request() -> Request {
    Request::parse(Method::Get, "http://localhost/items").expect("valid")
}

#[tokio::test]
async fn empty_chain_calls_terminal_directly() {
    let log = Log::default();
    let client = Client::new();
    let terminal = Terminal::new(&log);
    let chain = Chain::new(Vec::new());

    let reply = chain.run(&client, request(), &terminal).await.expect("reply");

    check!(chain.is_empty());
    check!(reply.status() == 200);
    check!(entries(&log) == ["terminal"]);
}

#[tokio::test]
async fn single_interceptor_wraps_terminal() {
    let log = Log::default();
    let client = Client::new();
    let terminal = Terminal::new(&log);
    let chain = Chain::new(vec![Recorder::shared("a", &log)]);

    chain.run(&client, request(), &terminal).await.expect("reply");

    check!(chain.len() == 1);
    check!(entries(&log) == ["a:in", "terminal", "a:out"]);
}

#[tokio::test]
async fn interceptors_nest_in_onion_order() {
    let log = Log::default();
    let client = Client::new();
    let terminal = Terminal::new(&log);
    let chain = Chain::new(vec![
        Recorder::shared("a", &log),
        Recorder::shared("b", &log),
        Recorder::shared("c", &log),
    ]);

    chain.run(&client, request(), &terminal).await.expect("reply");

    check!(
        entries(&log) == ["a:in", "b:in", "c:in", "terminal", "c:out", "b:out", "a:out"]
    );
}

#[tokio::test]
async fn composing_twice_behaves_the_same() {
    let client = Client::new();
    let mut runs = Vec::new();
    for _ in 0..2 {
        let log = Log::default();
        let terminal = Terminal::new(&log);
        let client_level = [Recorder::shared("client", &log)];
        let call_level = [Recorder::shared("call", &log)];
        let chain = Chain::merge(&client_level, &call_level);
        chain.run(&client, request(), &terminal).await.expect("reply");
        runs.push(entries(&log));
    }

    let_assert!([first, second] = runs.as_slice());
    check!(first == second);
    check!(first == &["client:in", "call:in", "terminal", "call:out", "client:out"]);
}

#[tokio::test]
async fn short_circuit_skips_the_rest() {
    let log = Log::default();
    let client = Client::new();
    let terminal = Terminal::new(&log);
    let chain = Chain::new(vec![
        Recorder::shared("a", &log),
        Arc::new(Deny),
        Recorder::shared("b", &log),
    ]);

    let result = chain.run(&client, request(), &terminal).await;

    let_assert!(Err(Error::InvalidRequest(message)) = result);
    check!(message == "denied");
    check!(terminal.calls.load(Ordering::SeqCst) == 0);
    check!(entries(&log) == ["a:in", "a:out"]);
}

#[tokio::test]
async fn composed_chain_is_a_doer() {
    let log = Log::default();
    let client = Client::new();
    let inner = Chain::new(vec![Recorder::shared("inner", &log)]).with_terminal(Terminal::new(&log));
    let outer = Chain::new(vec![Recorder::shared("outer", &log)]);

    outer.run(&client, request(), &inner).await.expect("reply");

    check!(inner.chain().len() == 1);
    check!(
        entries(&log) == ["outer:in", "inner:in", "terminal", "inner:out", "outer:out"]
    );
}

/// Answers 200, echoing the request headers back.
fn echo_transport() -> ServiceTransport {
    ServiceTransport::new(tower::service_fn(|request: Request| async move {
        Ok::<_, Error>(Response::new(200, request.headers().clone(), Bytes::new()))
    }))
}

fn echo_client() -> Client {
    Client::builder().transport(echo_transport()).build()
}

#[tokio::test]
async fn client_and_call_interceptors_reach_the_wire() {
    let client = Client::builder()
        .transport(echo_transport())
        .interceptor(SetHeader::new("x-a", "client").expect("valid"))
        .build();

    let reply = client
        .get("http://localhost/echo")
        .with(SetHeader::new("x-b", "call").expect("valid"))
        .await
        .expect("reply");

    check!(reply.header("x-a") == Some("client"));
    check!(reply.header("x-b") == Some("call"));
    check!(reply.request().url.as_str() == "http://localhost/echo");
}

#[tokio::test]
async fn call_level_headers_reach_the_echo_terminal() {
    let client = echo_client();
    check!(client.interceptors().is_empty());

    let reply = client
        .get("http://localhost/echo")
        .with(SetHeader::new("X", "1").expect("valid"))
        .with(SetHeader::new("Y", "2").expect("valid"))
        .await
        .expect("reply");

    check!(reply.status() == 200);
    check!(reply.header("x") == Some("1"));
    check!(reply.header("y") == Some("2"));
}

#[tokio::test]
async fn call_interceptors_run_inside_client_ones() {
    let log = Log::default();
    let client = {
        let mut client = echo_client();
        client.set_interceptors(vec![Recorder::shared("client", &log)]);
        client
    };

    client
        .get("http://localhost/")
        .with_shared(Recorder::shared("call", &log))
        .await
        .expect("reply");

    check!(entries(&log) == ["client:in", "call:in", "call:out", "client:out"]);
}

#[tokio::test]
async fn later_interceptor_sees_earlier_rewrite() {
    let client = echo_client();

    let reply = client
        .get("http://localhost/")
        .with(SetHeader::new("x-value", "first").expect("valid"))
        .with(SetHeader::new("x-value", "second").expect("valid"))
        .await
        .expect("reply");

    check!(reply.header("x-value") == Some("second"));
}

#[tokio::test]
async fn malformed_target_never_enters_the_chain() {
    let log = Log::default();
    let mut client = echo_client();
    client.push_interceptor(Recorder {
        name: "client",
        log: Arc::clone(&log),
    });

    let result = client.get("not a url").await;

    check!(result.is_err());
    check!(entries(&log).is_empty());
}

