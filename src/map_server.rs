use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use thiserror::Error;
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::map_view::MapView;

const TRACKER_VIEW_HTML: &str = include_str!("../static/tracker-view.html");

#[derive(Debug, Error)]
pub enum MapError {
    #[error("the map is still loading, try again in a moment")]
    NotReady,
    #[error("failed to start the map server: {0}")]
    Init(String),
}

struct AppState {
    map_view: Arc<Mutex<MapView>>,
}

async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html")
        .body(TRACKER_VIEW_HTML)
}

/// Versioned view state. Clients echo the ETag back via `If-None-Match` and
/// get a 304 while nothing changed.
async fn serve_state(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    let client_version = req
        .headers()
        .get("If-None-Match")
        .and_then(|h| h.to_str().ok());
    let map_view = data.map_view.lock().unwrap();
    match map_view.get_state_if_changed(client_version) {
        None => HttpResponse::NotModified().finish(),
        Some((state, version)) => HttpResponse::Ok()
            .insert_header(("ETag", version))
            .json(state),
    }
}

/// Serves the embedded map page over local HTTP on a dedicated thread with
/// its own runtime. The URL carries a random prefix so a stale browser tab
/// from an earlier run cannot accidentally hit the new instance.
pub struct MapServer {
    url: String,
    server_handle: Option<ServerHandle>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MapServer {
    /// Bind and start serving; blocks until the listener is up (or failed),
    /// so a returned `MapServer` is always ready. Port 0 picks a free port.
    pub fn create_and_start(
        host: &str,
        port: u16,
        map_view: Arc<Mutex<MapView>>,
    ) -> Result<Self, MapError> {
        let prefix = Uuid::new_v4().to_string();
        let route_prefix = prefix.clone();
        let bind_host = host.to_string();
        let (tx, rx) = mpsc::channel();

        let thread_handle = thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = tx.send(Err(format!("failed to create runtime: {e}")));
                    return;
                }
            };
            runtime.block_on(async move {
                let app_state = web::Data::new(AppState { map_view });
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(app_state.clone())
                        .route(&format!("/{route_prefix}/"), web::get().to(index))
                        .route(
                            &format!("/{route_prefix}/state.json"),
                            web::get().to(serve_state),
                        )
                })
                .workers(1)
                .bind((bind_host.as_str(), port));
                let server = match server {
                    Ok(server) => server,
                    Err(e) => {
                        let _ = tx.send(Err(format!("failed to bind {bind_host}:{port}: {e}")));
                        return;
                    }
                };
                let actual_port = server.addrs().first().map(|a| a.port()).unwrap_or(port);
                let server = server.run();
                let _ = tx.send(Ok((actual_port, server.handle())));
                if let Err(e) = server.await {
                    error!("[map_server] server stopped unexpectedly: {e}");
                }
            });
        });

        match rx.recv() {
            Ok(Ok((actual_port, server_handle))) => {
                let url = format!("http://{host}:{actual_port}/{prefix}/");
                info!("[map_server] serving map at {url}");
                Ok(MapServer {
                    url,
                    server_handle: Some(server_handle),
                    thread_handle: Some(thread_handle),
                })
            }
            Ok(Err(message)) => Err(MapError::Init(message)),
            Err(_) => Err(MapError::Init(
                "server thread exited before binding".to_string(),
            )),
        }
    }

    pub fn http_url(&self) -> &str {
        &self.url
    }

    pub fn stop(&mut self) {
        if let Some(server_handle) = self.server_handle.take() {
            // the stop signal is dispatched eagerly, no need to await it
            drop(server_handle.stop(false));
        }
        if let Some(thread_handle) = self.thread_handle.take() {
            let _ = thread_handle.join();
        }
    }
}

impl Drop for MapServer {
    fn drop(&mut self) {
        self.stop();
    }
}
