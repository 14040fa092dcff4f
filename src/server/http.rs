//! HTTP query protocol (§6): `GET /<base>?set=...&show=...&classify=...`,
//! processed in the order the parameters appear, replying with a small
//! hand-rolled XML document. Grounded in `ServerBase.cxx`'s
//! `HttpServerBase::Classify`, which builds its `<classification>`
//! response the same way: one element per query parameter, in order.

use std::fmt::Write as _;
use std::sync::Arc;

use actix_web::get;
use actix_web::web;
use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;

use crate::server::bases::BaseTable;
use crate::server::model::SharedModel;

struct AppState {
    bases: Arc<BaseTable>,
}

/// runs the actix-web HTTP listener on `addr` until the process is
/// killed; call alongside (or instead of) [`super::session::run`]
/// depending on the configured [`crate::config::Protocol`].
pub async fn run(addr: std::net::SocketAddr, bases: Arc<BaseTable>) -> crate::Result<()> {
    HttpServer::new(move || app(bases.clone()))
        .bind(addr)
        .map_err(crate::MemlearnError::Io)?
        .run()
        .await
        .map_err(crate::MemlearnError::Io)
}

/// the same `App` configuration [`run`] serves, factored out so
/// integration tests can drive the real `/{base}` handler in-process
/// through `actix_web::test`, without binding a socket.
pub fn app(
    bases: Arc<BaseTable>,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let state = web::Data::new(AppState { bases });
    App::new().app_data(state).service(classify)
}

#[get("/{base}")]
async fn classify(path: web::Path<String>, req: actix_web::HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let base_name = path.into_inner();
    let model = match state.bases.get(&base_name) {
        Ok(m) => m,
        Err(e) => return HttpResponse::NotFound().body(format!("<error>{e}</error>")),
    };

    let mut options = model.default_options.session_clone();
    let mut xml = String::from("<classification>\n");

    for (key, raw_value) in parse_ordered_query(req.query_string()) {
        let value = decode_percent(&raw_value);
        match key.as_str() {
            "set" => apply_set_param(&value, &mut options, &mut xml),
            "show" => show_param(&value, &model, &options, &mut xml),
            "classify" => classify_param(&value, &model, &options, &mut xml),
            other => {
                let _ = writeln!(xml, "  <error>unknown query parameter {other:?}</error>");
            }
        }
    }

    xml.push_str("</classification>\n");
    HttpResponse::Ok().content_type("application/xml").body(xml)
}

fn apply_set_param(value: &str, options: &mut crate::options::Options, xml: &mut String) {
    let mut parts = value.splitn(2, '=');
    let (key, val) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
    match key {
        "k" => match val.parse::<usize>() {
            Ok(k) => {
                options.set_post(|p| p.k = k);
                let _ = writeln!(xml, "  <input>set k {val}</input>");
            }
            Err(_) => {
                let _ = writeln!(xml, "  <error>bad k value {val:?}</error>");
            }
        },
        other => {
            let _ = writeln!(xml, "  <error>unknown settable option {other:?}</error>");
        }
    }
}

fn show_param(value: &str, model: &SharedModel, options: &crate::options::Options, xml: &mut String) {
    match value {
        "settings" => {
            let _ = writeln!(
                xml,
                "  <settings base={:?} algorithm={:?} k=\"{}\" />",
                model.name, options.algorithm, options.post.k
            );
        }
        other => {
            let _ = writeln!(xml, "  <error>unknown show target {other:?}</error>");
        }
    }
}

fn classify_param(instance_text: &str, model: &SharedModel, options: &crate::options::Options, xml: &mut String) {
    let fields: Vec<&str> = instance_text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    let values = match model.parse_query_instance(&fields) {
        Ok(v) => v,
        Err(e) => {
            let _ = writeln!(xml, "  <error>{e}</error>");
            return;
        }
    };
    let _ = writeln!(xml, "  <input>{instance_text}</input>");
    let result = model.classify(options, values);
    let _ = writeln!(xml, "  <category>{}</category>", result.category);
    if let Some(dist) = &result.distribution {
        let _ = writeln!(xml, "  <distribution>{}</distribution>", dist.save(&model.targets));
    }
    if let Some(d) = result.distance {
        let _ = writeln!(xml, "  <distance>{d}</distance>");
    }
}

/// preserves both the order and any repeats of query parameters, which
/// `actix_web::web::Query`'s map-based deserializer would collapse.
fn parse_ordered_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_owned(), v.to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect()
}

/// minimal `application/x-www-form-urlencoded` decoder: `+` is a space,
/// `%XX` is a byte. Malformed escapes pass through unchanged rather
/// than erroring, since a query string is an external collaborator's
/// input this server only ever reflects back in error text.
fn decode_percent(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
