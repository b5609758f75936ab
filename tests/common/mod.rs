#![allow(dead_code)]

use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

/// Local HTTP server answering each request with the next scripted response.
pub struct StubServer {
    pub base_url: String,
    requests: Receiver<String>,
}

impl StubServer {
    pub fn spawn(responses: Vec<(u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind stub server");
        let addr = server
            .server_addr()
            .to_ip()
            .expect("stub server listens on tcp");
        let (tx, rx) = unbounded();
        thread::spawn(move || {
            for (status, body) in responses {
                let Ok(request) = server.recv() else {
                    return;
                };
                let _ = tx.send(request.url().to_string());
                let header = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .expect("static header");
                let _ = request.respond(
                    Response::from_string(body)
                        .with_status_code(status)
                        .with_header(header),
                );
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            requests: rx,
        }
    }

    /// Path and query of the next request the server saw.
    pub fn next_request(&self) -> String {
        self.requests
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("stub server received a request")
    }
}

pub fn image_post(id: &str, score: i64) -> Value {
    json!({
        "id": id,
        "title": format!("Post {id}"),
        "score": score,
        "downs": 0,
        "created_utc": 1_714_650_000.0,
        "permalink": format!("/r/pics/comments/{id}/post_{id}/"),
        "url": format!("https://i.redd.it/{id}.jpg"),
        "thumbnail": format!("https://b.thumbs.redditmedia.com/{id}.jpg"),
        "over_18": false,
        "stickied": false,
        "spoiler": false,
        "post_hint": "image"
    })
}

pub fn listing_body(posts: Vec<Value>, after: Option<&str>) -> String {
    let children: Vec<Value> = posts
        .into_iter()
        .map(|data| json!({ "kind": "t3", "data": data }))
        .collect();
    json!({
        "kind": "Listing",
        "data": { "after": after, "before": null, "children": children }
    })
    .to_string()
}
