//! Test servers for the HTTP/1.0 client.
//!
//! `app()` is a small weblog endpoint speaking just enough XML-RPC for a
//! posting client, plus a few plain GET routes. `raw::ScriptedServer` replies
//! with exact bytes for cases a well-behaved server never produces.
//!
//! Every response carries a non-empty body; the client treats an explicit
//! `Content-Length: 0` as malformed.

pub mod raw;

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub content: String,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Post>>>;

pub const INDEX_PAGE: &str = "<html><body>mock weblog</body></html>";
const MAX_BYTES_ROUTE: usize = 1 << 20;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/", get(index))
        .route("/RPC2", post(rpc))
        .route("/posts", get(list_posts))
        .route("/posts/{id}", get(get_post))
        .route("/bytes/{n}", get(bytes))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock weblog listening");
    }
    axum::serve(listener, app()).await
}

async fn index() -> &'static str {
    INDEX_PAGE
}

async fn list_posts(State(db): State<Db>) -> Json<Vec<Post>> {
    let posts = db.read().await;
    Json(posts.values().cloned().collect())
}

async fn get_post(State(db): State<Db>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<Uuid>() else {
        return (StatusCode::BAD_REQUEST, "bad post id").into_response();
    };
    match db.read().await.get(&id) {
        Some(post) => post.content.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "no such post").into_response(),
    }
}

/// `n` bytes of a repeating alphabet, for bodies larger than a read buffer.
async fn bytes(Path(n): Path<usize>) -> Response {
    if n == 0 || n > MAX_BYTES_ROUTE {
        return (StatusCode::BAD_REQUEST, "size out of range").into_response();
    }
    pattern(n).into_response()
}

pub fn pattern(n: usize) -> Vec<u8> {
    (0..n).map(|i| b'a' + (i % 26) as u8).collect()
}

async fn rpc(State(db): State<Db>, body: String) -> Response {
    let Some(method) = method_name(&body) else {
        return xml(fault(-32700, "parse error: no methodName"));
    };
    let params = string_params(&body);
    debug!(method, params = params.len(), "xml-rpc call");

    match method {
        "blogger.newPost" => {
            let Some(content) = params.get(4) else {
                return xml(fault(-32602, "blogger.newPost takes six parameters"));
            };
            let post = Post {
                id: Uuid::new_v4(),
                content: content.clone(),
            };
            let id = post.id;
            db.write().await.insert(id, post);
            xml(success(&id.to_string()))
        }
        "blogger.getPost" => {
            let found = match params.get(1).and_then(|id| id.parse::<Uuid>().ok()) {
                Some(id) => db.read().await.get(&id).cloned(),
                None => None,
            };
            match found {
                Some(post) => xml(success(&post.content)),
                None => xml(fault(404, "no such post")),
            }
        }
        other => xml(fault(-32601, &format!("unknown method {other}"))),
    }
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

/// Text between the first `<methodName>` and its closing tag.
pub fn method_name(call: &str) -> Option<&str> {
    let start = call.find("<methodName>")? + "<methodName>".len();
    let len = call[start..].find("</methodName>")?;
    Some(call[start..start + len].trim())
}

/// Every `<string>` value in document order, entity references left as sent.
pub fn string_params(call: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = call;
    while let Some(open) = rest.find("<string>") {
        let from = open + "<string>".len();
        let Some(len) = rest[from..].find("</string>") else {
            break;
        };
        out.push(rest[from..from + len].to_string());
        rest = &rest[from + len..];
    }
    out
}

pub fn success(value: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<methodResponse><params><param>\
         <value><string>{value}</string></value>\
         </param></params></methodResponse>\n"
    )
}

pub fn fault(code: i32, message: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<methodResponse><fault><value><struct>\
         <member><name>faultCode</name><value><int>{code}</int></value></member>\
         <member><name>faultString</name><value><string>{message}</string></value></member>\
         </struct></value></fault></methodResponse>\n"
    )
}

/// An XML-RPC call with string parameters.
pub fn method_call(method: &str, params: &[&str]) -> String {
    let mut call = format!("<?xml version=\"1.0\"?>\n<methodCall><methodName>{method}</methodName><params>");
    for p in params {
        call.push_str("<param><value><string>");
        call.push_str(p);
        call.push_str("</string></value></param>");
    }
    call.push_str("</params></methodCall>\n");
    call
}
