//! HTTP adapter: routes to device-context calls, error kinds to
//! response statuses. All frame bytes are streamed straight through to
//! the ingest layer; nothing here buffers a whole image.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use embedded_svc::http::Headers;
use embedded_svc::http::Method;
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::nvs::{EspNvs, NvsDefault};
use log::info;

use crate::config;
use crate::device::{BoardDevice, NetMode};
use crate::epd7in3e::color::Color;
use crate::ingest::IngestError;
use crate::led::StatusLed;
use crate::wifi;

pub type SharedDevice = Arc<Mutex<BoardDevice>>;
pub type SharedLed = Arc<Mutex<StatusLed<'static>>>;
pub type SharedNvs = Arc<Mutex<EspNvs<NvsDefault>>>;

/// A poisoned lock just means a previous handler panicked mid-update;
/// the state itself is still sound (the busy flag clears on every exit
/// path), so recover instead of wedging the API.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn ok_body(message: &str) -> String {
    format!("{{\"status\":\"{message}\"}}")
}

fn reply(req: Request<&mut EspHttpConnection>, status: u16, body: &str) -> Result<()> {
    let mut response =
        req.into_response(status, None, &[("Content-Type", "application/json")])?;
    response
        .write_all(body.as_bytes())
        .map_err(|e| anyhow::anyhow!("response write: {e:?}"))?;
    Ok(())
}

fn reply_result(
    req: Request<&mut EspHttpConnection>,
    result: Result<String, IngestError>,
) -> Result<()> {
    match result {
        Ok(body) => reply(req, 200, &body),
        Err(e) => {
            let status = match e {
                IngestError::Busy => 503,
                IngestError::NotFound => 404,
                IngestError::Panel(_) => 500,
                IngestError::NoSession | IngestError::InvalidLength { .. } => 400,
            };
            reply(req, status, &format!("{{\"error\":\"{e}\"}}"))
        }
    }
}

fn read_body(req: &mut Request<&mut EspHttpConnection>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = req
            .read(&mut buf)
            .map_err(|e| anyhow::anyhow!("body read: {e:?}"))?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    Ok(body)
}

/// Value of one query parameter, percent-decoded.
fn query_param(uri: &str, key: &str) -> Option<String> {
    let query = uri.split_once('?')?.1;
    for pair in query.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k == key {
            return Some(url_decode(v));
        }
    }
    None
}

fn url_decode(value: &str) -> String {
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
                let hi = (bytes[i + 1] as char).to_digit(16);
                let lo = (bytes[i + 2] as char).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi * 16 + lo) as u8);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
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

/// Register every route and start serving. The returned server must be
/// kept alive for as long as the API should answer.
pub fn serve(device: SharedDevice, led: SharedLed, nvs: SharedNvs) -> Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&Configuration {
        stack_size: config::HTTP_STACK_SIZE,
        max_uri_handlers: 16,
        ..Default::default()
    })?;

    // Single-shot ingest: raw frame body, exact length, streamed to the
    // panel as it arrives.
    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/display", Method::Post, move |mut req| {
        let total = req.content_len().unwrap_or(0) as usize;
        let result = lock(&dev).display_from(total, |buf| {
            req.read(buf)
                .map_err(|e| std::io::Error::other(format!("{e:?}")))
        });
        reply_result(req, result.map(|_| ok_body("displayed")))
    })?;

    // Chunked ingest: start / chunk / end.
    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/stream/start", Method::Post, move |req| {
        let save = query_param(req.uri(), "save");
        let result = lock(&dev).start_stream(save.as_deref());
        reply_result(req, result.map(|_| "{\"received\":0}".to_string()))
    })?;

    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/stream/chunk", Method::Post, move |mut req| {
        let body = read_body(&mut req)?;
        let result = lock(&dev).stream_chunk(&body);
        reply_result(req, result.map(|n| format!("{{\"received\":{n}}}")))
    })?;

    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/stream/end", Method::Post, move |req| {
        let result = lock(&dev).finish_stream();
        reply_result(req, result.map(|_| ok_body("committed")))
    })?;

    // Saved images: list and read-back.
    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/saved", Method::Get, move |req| {
        let names = lock(&dev).saved_images();
        let list = names
            .iter()
            .map(|n| format!("\"{n}\""))
            .collect::<Vec<_>>()
            .join(",");
        reply(req, 200, &format!("[{list}]"))
    })?;

    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/saved/show", Method::Post, move |req| {
        let Some(name) = query_param(req.uri(), "name") else {
            return reply(req, 400, "{\"error\":\"missing name\"}");
        };
        let result = lock(&dev).show_saved(&name);
        reply_result(req, result.map(|_| ok_body("displayed")))
    })?;

    // Panel utilities.
    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/clear", Method::Post, move |req| {
        let color = query_param(req.uri(), "color")
            .map_or(Some(Color::White), |name| Color::from_name(&name));
        let Some(color) = color else {
            return reply(req, 400, "{\"error\":\"unknown color\"}");
        };
        let result = lock(&dev).clear_to(color);
        reply_result(req, result.map(|_| ok_body("cleared")))
    })?;

    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/test", Method::Post, move |req| {
        let result = lock(&dev).show_test_pattern();
        reply_result(req, result.map(|_| ok_body("test pattern")))
    })?;

    // LED side channel.
    let led_rgb = led.clone();
    server.fn_handler::<anyhow::Error, _>("/led", Method::Post, move |req| {
        let parse = |key| -> Result<u32, ()> {
            match query_param(req.uri(), key) {
                None => Ok(0),
                Some(v) => v.parse().map_err(|_| ()),
            }
        };
        match (parse("r"), parse("g"), parse("b")) {
            (Ok(r), Ok(g), Ok(b)) => {
                lock(&led_rgb).set_rgb(r, g, b)?;
                reply(req, 200, &ok_body("led set"))
            }
            _ => reply(req, 400, "{\"error\":\"invalid channel value\"}"),
        }
    })?;

    for (uri, action) in [
        ("/led/on", 0u8),
        ("/led/off", 1),
        ("/led/toggle", 2),
    ] {
        let led = led.clone();
        server.fn_handler::<anyhow::Error, _>(uri, Method::Post, move |req| {
            {
                let mut led = lock(&led);
                match action {
                    0 => led.on()?,
                    1 => led.off()?,
                    _ => led.toggle()?,
                }
            }
            reply(req, 200, &ok_body("led"))
        })?;
    }

    // Introspection and provisioning.
    let dev = device.clone();
    server.fn_handler::<anyhow::Error, _>("/status", Method::Get, move |req| {
        let body = {
            let device = lock(&dev);
            let (mode, ssid, ip) = match &device.net {
                Some(NetMode::Station { ssid, ip }) => ("station", ssid.as_str(), ip.as_str()),
                Some(NetMode::AccessPoint { ssid, ip }) => ("ap", ssid.as_str(), ip.as_str()),
                None => ("offline", "", ""),
            };
            format!(
                "{{\"busy\":{},\"mode\":\"{mode}\",\"ssid\":\"{ssid}\",\"ip\":\"{ip}\",\"storage\":{}}}",
                device.is_busy(),
                device.has_storage(),
            )
        };
        reply(req, 200, &body)
    })?;

    server.fn_handler::<anyhow::Error, _>("/wifi", Method::Post, move |req| {
        let ssid = query_param(req.uri(), "ssid").unwrap_or_default();
        if ssid.is_empty() {
            return reply(req, 400, "{\"error\":\"missing ssid\"}");
        }
        let pass = query_param(req.uri(), "pass").unwrap_or_default();
        wifi::store_credentials(&mut lock(&nvs), &ssid, &pass)?;
        reply(req, 200, &ok_body("stored, reboot to apply"))
    })?;

    info!("HTTP API registered");
    Ok(server)
}
