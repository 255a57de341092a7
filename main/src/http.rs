use crate::catalog::ServiceCatalog;
use crate::page::StreamParamError;
use crate::page::StreamParams;
use crate::page::StreamRequest;
use crate::template::StreamTemplate;
use axum::extract::ConnectInfo;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::header::USER_AGENT;
use axum::http::Method;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::rt::TokioTimer;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

/// How long a client may take to send the request head.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a handler may take before the client gets a 408.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

pub fn router(catalog: Arc<ServiceCatalog>, static_dir: &Path) -> Router {
    let pages = Router::new()
        .route("/", get(home))
        .route("/stream", get(stream))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(catalog);
    with_middleware(pages)
}

/// Logging, permissive CORS, panic recovery and a response deadline for every route.
fn with_middleware(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::HEAD, Method::OPTIONS, Method::GET]);
    router
        .layer(TimeoutLayer::new(RESPONSE_TIMEOUT))
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn(log_request))
}

/// Serves `router` until `quit` fires or is dropped.
///
/// Open connections then have `grace_period` to finish their current request.
/// Whatever is still open after that is closed before the returned task ends.
pub fn serve(
    listener: TcpListener,
    router: Router,
    mut quit: oneshot::Receiver<()>,
    grace_period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (closing, closing_receiver) = watch::channel(());
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut quit => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_address)) => {
                        connections.spawn(serve_connection(
                            stream,
                            remote_address,
                            router.clone(),
                            closing_receiver.clone(),
                        ));
                    }
                    Err(e) => {
                        log::warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = connections.join_next(), if !connections.is_empty() => {}
            }
        }
        drop(listener);
        log::info!("HTTP listener no longer accepting connections");

        closing.send_replace(());
        let drained = tokio::time::timeout(grace_period, async {
            while connections.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !drained {
            log::warn!(
                "{} connections still open after {:?}, closing them",
                connections.len(),
                grace_period
            );
            connections.shutdown().await;
        }
    })
}

async fn serve_connection(
    stream: TcpStream,
    remote_address: SocketAddr,
    router: Router,
    mut closing: watch::Receiver<()>,
) {
    let service = service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(remote_address));
        router.clone().oneshot(request)
    });
    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(READ_TIMEOUT)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let mut closing_started = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    log::debug!("Connection from {} ended: {}", remote_address, e);
                }
                return;
            }
            _ = closing.changed(), if !closing_started => {
                closing_started = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}

async fn home(State(catalog): State<Arc<ServiceCatalog>>) -> Html<String> {
    let snapshot = catalog.snapshot().await;
    let options = crate::page::stream_options(&snapshot);
    Html(crate::template::render_home(&options))
}

async fn stream(Query(params): Query<StreamParams>) -> Result<Html<String>, StreamParamError> {
    let request = StreamRequest::try_from(params)?;
    Ok(Html(StreamTemplate::select(&request).render(&request)))
}

impl IntoResponse for StreamParamError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let remote_address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.to_string())
        .unwrap_or_else(|| "-".into());
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
        .to_owned();

    let response = next.run(request).await;

    log::info!(
        "{} {} {} {} {}",
        method,
        path,
        response.status().as_u16(),
        remote_address,
        user_agent
    );
    response
}
