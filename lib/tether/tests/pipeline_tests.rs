//! Pipeline behaviour tests against an in-memory transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use assert2::{check, let_assert};
use serde::Deserialize;
use tether::middleware::{BoxedService, Layer};
use tether::{
    BaseClient, BearerToken, Body, Eligibility, Error, Method, PartContents, PipelineConfig,
    Request, RequestOptions, Response, ResponseType, Result, Transport, UPLOAD_TIMEOUTS, Unwrapped,
};
use tower::Service;

type Reply = Arc<dyn Fn(&Request) -> Result<Response> + Send + Sync>;

/// Records every request it receives and answers with `reply`.
#[derive(Clone)]
struct Recorder {
    requests: Arc<Mutex<Vec<Request>>>,
    reply: Reply,
}

impl Recorder {
    fn replying(reply: impl Fn(&Request) -> Result<Response> + Send + Sync + 'static) -> Self {
        Self {
            requests: Arc::default(),
            reply: Arc::new(reply),
        }
    }

    fn json(body: &'static str) -> Self {
        Self::replying(move |_| Ok(Response::new(200, HashMap::new(), body)))
    }

    fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for Recorder {
    async fn send(&self, request: Request) -> Result<Response> {
        let reply = (self.reply)(&request);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        reply
    }
}

fn config(response_type: ResponseType) -> PipelineConfig {
    PipelineConfig::builder()
        .response_type(response_type)
        .base_url(url::Url::parse("https://api.example.com/v1/").expect("base url"))
        .build()
}

/// Counts how many times the stack is assembled.
#[derive(Clone)]
struct CountingLayer(Arc<AtomicUsize>);

impl Layer<BoxedService> for CountingLayer {
    type Service = BoxedService;

    fn layer(&self, inner: BoxedService) -> Self::Service {
        self.0.fetch_add(1, Ordering::SeqCst);
        inner
    }
}

/// Tags requests with `X-Custom`.
#[derive(Clone)]
struct TagLayer;

#[derive(Clone)]
struct Tag<S>(S);

impl<S> Layer<S> for TagLayer {
    type Service = Tag<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Tag(inner)
    }
}

impl<S> Service<Request> for Tag<S>
where
    S: Service<Request, Response = Response, Error = Error>,
{
    type Response = Response;
    type Error = Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.0.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        request.set_header("X-Custom", "1");
        self.0.call(request)
    }
}

#[tokio::test]
async fn token_is_applied_once_per_request() {
    let recorder = Recorder::json("{}");
    let applied = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&applied);

    let client = BaseClient::builder(recorder.clone())
        .config(config(ResponseType::Object))
        .access_token(move |mut request: Request, options: &RequestOptions| -> Result<Request> {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(options.query_params(), [("lang".to_string(), "en".to_string())]);
            request
                .url_mut()
                .query_pairs_mut()
                .append_pair("access_token", "abc");
            Ok(request)
        })
        .build();

    for _ in 0..3 {
        client.get("menu", &[("lang", "en")]).await.expect("get");
    }

    check!(applied.load(Ordering::SeqCst) == 3);
    for request in recorder.requests() {
        check!(request.url().as_str() == "https://api.example.com/v1/menu?lang=en&access_token=abc");
    }
}

#[tokio::test]
async fn token_replacement_and_clearing() {
    let recorder = Recorder::json("{}");
    let client = BaseClient::new(recorder.clone(), config(ResponseType::Raw));

    client.get("a", &()).await.expect("no token");
    client.set_access_token(BearerToken::new("one"));
    client.get("b", &()).await.expect("first token");
    client.set_access_token(BearerToken::new("two"));
    client.get("c", &()).await.expect("second token");
    client.clear_access_token();
    client.get("d", &()).await.expect("cleared");

    let headers: Vec<_> = recorder
        .requests()
        .iter()
        .map(|request| request.header("Authorization").map(str::to_string))
        .collect();
    check!(
        headers
            == [
                None,
                Some("Bearer one".to_string()),
                Some("Bearer two".to_string()),
                None
            ]
    );
    check!(client.access_token().is_none());
}

#[tokio::test]
async fn token_error_is_propagated() {
    let recorder = Recorder::json("{}");
    let client = BaseClient::builder(recorder.clone())
        .config(config(ResponseType::Raw))
        .access_token(|_request: Request, _options: &RequestOptions| -> Result<Request> {
            Err(Error::configuration("token expired"))
        })
        .build();

    let err = client.get("menu", &()).await.expect_err("token error");
    check!(err.is_configuration());
    check!(recorder.requests().is_empty());
}

#[tokio::test]
async fn raw_returns_transport_response_unchanged() {
    let original = Response::new(
        201,
        HashMap::from([("X-Trace".to_string(), "t-1".to_string())]),
        "\u{fffe}not json",
    );
    let expected = original.clone();
    let recorder = Recorder::replying(move |_| Ok(original.clone()));

    // unset response type, raw requested by the caller
    let client = BaseClient::new(recorder.clone(), PipelineConfig::default());
    let unwrapped = client
        .request("https://api.example.com/x", Method::Get, RequestOptions::new(), true)
        .await
        .expect("raw");
    check!(unwrapped.into_raw() == Some(expected.clone()));

    // configured raw
    let client = BaseClient::new(recorder, config(ResponseType::Raw));
    let unwrapped = client.get("x", &()).await.expect("raw");
    check!(unwrapped == Unwrapped::Raw(expected));
}

#[tokio::test]
async fn unset_response_type_is_configuration_error() {
    let recorder = Recorder::json(r#"{"ok":true}"#);
    let client = BaseClient::new(recorder.clone(), PipelineConfig::default());

    let err = client
        .request("https://api.example.com/x", Method::Get, RequestOptions::new(), false)
        .await
        .expect_err("no response type");
    check!(err.is_configuration());
    check!(recorder.requests().len() == 1);
}

#[tokio::test]
async fn unwraps_into_configured_shape() {
    let body = r#"{"zeta":1,"alpha":{"n":2}}"#;

    let collection = BaseClient::new(Recorder::json(body), config(ResponseType::Collection))
        .get("x", &())
        .await
        .expect("collection");
    let_assert!(Unwrapped::Collection(collection) = collection);
    check!(collection.keys().collect::<Vec<_>>() == ["zeta", "alpha"]);

    let mapping = BaseClient::new(Recorder::json(body), config(ResponseType::Array))
        .get("x", &())
        .await
        .expect("array");
    let_assert!(Some(mapping) = mapping.as_mapping());
    check!(mapping["alpha"]["n"] == 2);

    let text = BaseClient::new(Recorder::json(body), config(ResponseType::String))
        .get("x", &())
        .await
        .expect("string");
    check!(text.as_text() == Some(body));
}

#[tokio::test]
async fn request_json_deserializes_caller_type() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Menu {
        buttons: Vec<String>,
    }

    let client = BaseClient::new(
        Recorder::json(r#"{"buttons":["a","b"]}"#),
        PipelineConfig::default(),
    );
    let menu: Menu = client
        .request_json("https://api.example.com/menu", Method::Get, RequestOptions::new())
        .await
        .expect("menu");
    check!(menu.buttons == ["a", "b"]);

    let err = client
        .request_json::<Vec<u8>>("https://api.example.com/menu", Method::Get, RequestOptions::new())
        .await
        .expect_err("shape mismatch");
    let_assert!(Error::JsonDeserialization { .. } = err);
}

#[tokio::test]
async fn ineligible_response_fails_with_message() {
    let recorder = Recorder::json(r#"{"errcode":40001,"errmsg":"bad request"}"#);
    let client = BaseClient::builder(recorder.clone())
        .config(config(ResponseType::Object))
        .eligibility(|response: &Response, _request: &Request| {
            let body: serde_json::Value = response.json().unwrap_or_default();
            match body["errmsg"].as_str() {
                Some(message) if body["errcode"] != 0 => Eligibility::rejected(message),
                _ => Eligibility::Eligible,
            }
        })
        .build();

    let err = client.post("menu/create", &[("name", "x")]).await.expect_err("rejected");
    check!(err.is_ineligible());
    check!(err.to_string() == "bad request");
    let_assert!(Some(response) = err.ineligible_response());
    check!(response.status() == 200);
    let_assert!(Some(request) = err.ineligible_request());
    check!(request.method() == Method::Post);
}

#[tokio::test]
async fn eligible_response_passes_through() {
    let original = Response::new(200, HashMap::new(), r#"{"errcode":0}"#);
    let expected = original.clone();
    let client = BaseClient::builder(Recorder::replying(move |_| Ok(original.clone())))
        .config(config(ResponseType::Raw))
        .eligibility(|_response: &Response, _request: &Request| Eligibility::Eligible)
        .build();

    let unwrapped = client.get("x", &()).await.expect("eligible");
    check!(unwrapped.into_raw() == Some(expected));
}

#[tokio::test]
async fn rejection_without_message_uses_default() {
    let client = BaseClient::builder(Recorder::json("{}"))
        .config(config(ResponseType::Raw))
        .eligibility(|_response: &Response, _request: &Request| Eligibility::Ineligible(None))
        .build();

    let err = client.get("x", &()).await.expect_err("rejected");
    check!(err.to_string() == "Unsuccessful request");
}

#[tokio::test]
async fn transport_error_is_propagated_without_eligibility_check() {
    let checked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&checked);
    let client = BaseClient::builder(Recorder::replying(|_| Err(Error::Timeout)))
        .config(config(ResponseType::Object))
        .eligibility(move |_response: &Response, _request: &Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            Eligibility::Eligible
        })
        .build();

    let err = client.get("x", &()).await.expect_err("timeout");
    check!(err.is_timeout());
    check!(checked.load(Ordering::SeqCst) == 0);
}

#[tokio::test]
async fn stack_order_and_idempotent_build() {
    let builds = Arc::new(AtomicUsize::new(0));
    let client = BaseClient::builder(Recorder::json("{}"))
        .config(config(ResponseType::Object))
        .logger(|_line: &str| {})
        .eligibility(|_response: &Response, _request: &Request| Eligibility::Eligible)
        .middleware("count", CountingLayer(Arc::clone(&builds)))
        .middleware("log", TagLayer)
        .build();

    let expected = ["access_token", "log", "eligibility", "count"];
    for _ in 0..5 {
        client.get("x", &()).await.expect("get");
        check!(client.middleware_names() == expected);
    }
    check!(builds.load(Ordering::SeqCst) == 1);
}

#[tokio::test]
async fn optional_middlewares_are_absent_without_capabilities() {
    let client = BaseClient::new(Recorder::json("{}"), config(ResponseType::Object));
    check!(client.middleware_names() == ["access_token"]);
}

#[tokio::test]
async fn custom_middleware_runs_and_reset_rebuilds() {
    let builds = Arc::new(AtomicUsize::new(0));
    let recorder = Recorder::json("{}");
    let mut client = BaseClient::builder(recorder.clone())
        .config(config(ResponseType::Raw))
        .middleware("count", CountingLayer(Arc::clone(&builds)))
        .build();

    client.get("x", &()).await.expect("first");
    check!(builds.load(Ordering::SeqCst) == 1);

    check!(client.push_middleware("tag", TagLayer));
    client.get("x", &()).await.expect("second");
    check!(builds.load(Ordering::SeqCst) == 2);
    check!(client.middleware_names() == ["access_token", "count", "tag"]);

    client.reset_middleware();
    client.get("x", &()).await.expect("third");
    check!(builds.load(Ordering::SeqCst) == 3);

    let tags: Vec<_> = recorder
        .requests()
        .iter()
        .map(|request| request.header("X-Custom").is_some())
        .collect();
    check!(tags == [false, true, true]);
}

#[tokio::test]
async fn concurrent_first_calls_build_one_stack() {
    let builds = Arc::new(AtomicUsize::new(0));
    let client = Arc::new(
        BaseClient::builder(Recorder::json("{}"))
            .config(config(ResponseType::Object))
            .middleware("count", CountingLayer(Arc::clone(&builds)))
            .build(),
    );

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get("x", &()).await.map(|_| ()) })
        })
        .collect();
    for handle in handles {
        handle.await.expect("join").expect("get");
    }

    check!(builds.load(Ordering::SeqCst) == 1);
}

#[tokio::test]
async fn readiness_enforcing_middleware_is_polled_before_calls() {
    let recorder = Recorder::json("{}");
    let client = Arc::new(
        BaseClient::builder(recorder.clone())
            .config(config(ResponseType::Object))
            .logger(|_line: &str| {})
            .eligibility(|_response: &Response, _request: &Request| Eligibility::Eligible)
            .middleware("limit", tower::limit::ConcurrencyLimitLayer::new(1))
            .build(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get("x", &()).await.map(|_| ()) })
        })
        .collect();
    for handle in handles {
        handle.await.expect("join").expect("get");
    }

    check!(recorder.requests().len() == 8);
    check!(client.middleware_names() == ["access_token", "log", "eligibility", "limit"]);
}

#[tokio::test]
async fn log_sink_observes_without_changing_outcome() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = Arc::clone(&lines);
    let client = BaseClient::builder(Recorder::replying(|request| {
        if request.url().path().ends_with("fail") {
            Err(Error::connection("refused"))
        } else {
            Ok(Response::new(200, HashMap::new(), "{}"))
        }
    }))
    .config(
        PipelineConfig::builder()
            .response_type(ResponseType::Object)
            .log_template("{method} {path} {code} {error}")
            .base_url(url::Url::parse("https://api.example.com/").expect("base"))
            .build(),
    )
    .logger(move |line: &str| {
        sink_lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    })
    .build();

    client.get("ok", &()).await.expect("ok");
    let err = client.get("fail", &()).await.expect_err("fail");
    check!(err.is_connection());

    let lines = lines.lock().unwrap_or_else(PoisonError::into_inner).clone();
    check!(lines.len() == 2);
    check!(lines[0] == "GET /ok 200 ");
    check!(lines[1].starts_with("GET /fail - "));
    check!(lines[1].contains("refused"));
}

#[tokio::test]
async fn log_records_rejected_response() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = Arc::clone(&lines);
    let client = BaseClient::builder(Recorder::json(r#"{"errcode":40001}"#))
        .config(
            PipelineConfig::builder()
                .response_type(ResponseType::Object)
                .log_template("{code} [{res_body}] {error}")
                .base_url(url::Url::parse("https://api.example.com/").expect("base"))
                .build(),
        )
        .logger(move |line: &str| {
            sink_lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(line.to_string());
        })
        .eligibility(|_response: &Response, _request: &Request| {
            Eligibility::rejected("bad request")
        })
        .build();

    let err = client.get("menu", &()).await.expect_err("rejected");
    check!(err.is_ineligible());
    check!(
        *lines.lock().unwrap_or_else(PoisonError::into_inner)
            == [r#"200 [{"errcode":40001}] bad request"#]
    );
}

#[tokio::test]
async fn verb_helpers_shape_requests() {
    let recorder = Recorder::json("{}");
    let client = BaseClient::new(recorder.clone(), config(ResponseType::Object));
    let payload = serde_json::json!({"name": "x"});

    client.get("items", &[("page", "2")]).await.expect("get");
    client.post("items", &[("name", "x")]).await.expect("post");
    client.post_json("items", &payload).await.expect("post json");
    client
        .post_json_with_query("items", &payload, &[("lang", "en")])
        .await
        .expect("post json with query");
    client.put("items/1", &payload).await.expect("put");
    client.delete("items/1", &payload).await.expect("delete");

    let requests = recorder.requests();
    let summary: Vec<_> = requests
        .iter()
        .map(|request| (request.method(), request.url().as_str().to_string()))
        .collect();
    check!(
        summary
            == [
                (Method::Get, "https://api.example.com/v1/items?page=2".to_string()),
                (Method::Post, "https://api.example.com/v1/items".to_string()),
                (Method::Post, "https://api.example.com/v1/items".to_string()),
                (Method::Post, "https://api.example.com/v1/items?lang=en".to_string()),
                (Method::Put, "https://api.example.com/v1/items/1".to_string()),
                (Method::Delete, "https://api.example.com/v1/items/1".to_string()),
            ]
    );

    check!(requests[0].body().is_empty());
    check!(requests[1].body().as_form() == Some(&[("name".to_string(), "x".to_string())][..]));
    for request in &requests[2..] {
        check!(request.body().as_json() == Some(&payload));
        check!(request.timeouts().is_none());
    }
}

#[tokio::test]
async fn upload_builds_two_parts_and_closes_streams() {
    let file = tempfile::Builder::new()
        .suffix(".txt")
        .tempfile()
        .expect("temp file");
    std::fs::write(file.path(), "hello").expect("write");

    let recorder = Recorder::json(r#"{"media_id":"m1"}"#);
    let client = BaseClient::new(recorder.clone(), config(ResponseType::Object));

    let uploaded = client
        .upload("media/upload", [("doc", file.path())], [("title", "x")])
        .await
        .expect("upload");
    check!(uploaded.as_object() == Some(&serde_json::json!({"media_id": "m1"})));

    let requests = recorder.requests();
    let_assert!([request] = requests.as_slice());
    check!(request.method() == Method::Post);
    check!(request.timeouts() == Some(UPLOAD_TIMEOUTS));

    let_assert!(Body::Multipart(multipart) = request.body());
    let parts = multipart.parts();
    check!(parts.len() == 2);
    check!(parts[0].name() == "doc");
    let_assert!(PartContents::File(stream) = parts[0].contents());
    check!(stream.path() == file.path());
    check!(stream.is_closed());
    check!(parts[1].name() == "title");
    check!(parts[1].as_text() == Some("x"));
}

#[tokio::test]
async fn upload_closes_streams_on_failure() {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    let recorder = Recorder::replying(|_| Err(Error::Timeout));
    let client = BaseClient::new(recorder.clone(), config(ResponseType::Object));

    let err = client
        .upload("media/upload", [("doc", file.path())], std::iter::empty::<(&str, &str)>())
        .await
        .expect_err("timeout");
    check!(err.is_timeout());

    let requests = recorder.requests();
    let_assert!([request] = requests.as_slice());
    let_assert!(Some(multipart) = request.body().as_multipart());
    check!(multipart.file_streams().all(tether::FileStream::is_closed));
}

#[tokio::test]
async fn upload_missing_file_is_io_error() {
    let recorder = Recorder::json("{}");
    let client = BaseClient::new(recorder.clone(), config(ResponseType::Object));

    let err = client
        .upload(
            "media/upload",
            [("doc", "/definitely/not/here.txt")],
            [("title", "x")],
        )
        .await
        .expect_err("missing file");
    let_assert!(Error::Io(_) = err);
    check!(recorder.requests().is_empty());
}
