use std::net::SocketAddr;

use actix_web::{http::header, web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::{json, Map, Value};

/// Echo the request back as JSON.
async fn echo(req: HttpRequest, body: web::Bytes) -> HttpResponse {
    let headers: Map<String, Value> = req
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                Value::String(value.to_str().unwrap_or_default().to_string()),
            )
        })
        .collect();
    HttpResponse::Ok().json(json!({
        "method": req.method().as_str(),
        "path": req.path(),
        "query": req.query_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn redirect() -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, "/landed/abc"))
        .finish()
}

async fn landed() -> HttpResponse {
    HttpResponse::Ok().body("landed")
}

async fn text_upload() -> HttpResponse {
    HttpResponse::Ok().body("done! url=http://files.local/view/42 id=42\n")
}

async fn json_upload() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "data": {"link": "http://files.local/i/7.png", "deletehash": "xyz"}
    }))
}

async fn not_a_url() -> HttpResponse {
    HttpResponse::Ok().body("upload failed: quota exceeded")
}

/// Start a local server and return its address.
///
/// `/redirect` redirects to `/landed/abc`, `/text`, `/json` and `/fail`
/// return canned upload responses, everything else is echoed.
pub async fn spawn_server() -> SocketAddr {
    let server = HttpServer::new(|| {
        App::new()
            .route("/redirect", web::to(redirect))
            .route("/landed/abc", web::to(landed))
            .route("/text", web::to(text_upload))
            .route("/json", web::to(json_upload))
            .route("/fail", web::to(not_a_url))
            .default_service(web::to(echo))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    addr
}
