//! Divoom Pixoo 64 over its local HTTP API.
//!
//! Every command is a JSON object POSTed to `http://{address}/post`. Frames
//! go out as single-frame "HTTP GIFs" whose picture id must increase on every
//! push; the device stops accepting pictures once the id gets large, so the
//! counter is reset every 32 pushes.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::core::frame::{DEVICE_SIZE, DeviceFrame};
use crate::error::{StreamError, StreamResult};

use super::{DeviceSink, font};

/// Picture ids at or above this trigger a counter reset.
pub const COUNTER_LIMIT: u32 = 32;

const FRAME_BYTES: usize = (DEVICE_SIZE * DEVICE_SIZE * 3) as usize;

/// Connected Pixoo device.
pub struct PixooSink {
    client: Client,
    address: String,
    url: String,
    buffer: Vec<u8>,
    pic_id: u32,
}

impl std::fmt::Debug for PixooSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixooSink")
            .field("address", &self.address)
            .field("pic_id", &self.pic_id)
            .finish()
    }
}

impl PixooSink {
    /// Reach the device at `address` (host or host:port) and sync the
    /// picture counter with it.
    pub fn connect(address: &str, timeout: Duration) -> StreamResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StreamError::connect(address, e.to_string()))?;
        let mut sink = Self {
            client,
            address: address.to_string(),
            url: format!("http://{address}/post"),
            buffer: vec![0u8; FRAME_BYTES],
            pic_id: 0,
        };

        let reply = sink
            .exchange(&json!({ "Command": "Draw/GetHttpGifId" }))
            .map_err(|reason| StreamError::connect(address, reason))?;
        let current = parse_pic_id(&reply).map_err(|reason| StreamError::connect(address, reason))?;
        sink.pic_id = current;
        if current >= COUNTER_LIMIT {
            sink.reset_counter()
                .map_err(|e| StreamError::connect(address, e.to_string()))?;
            sink.pic_id = 0;
        }
        info!(address, pic_id = sink.pic_id, "connected to Pixoo");
        Ok(sink)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Fill the staged buffer with one colour. Nothing is pushed.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        for px in self.buffer.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
    }

    /// Draw `text` into the staged buffer with the 3×5 font. Nothing is
    /// pushed. Returns the number of pixels set.
    pub fn draw_text(&mut self, text: &str, origin: (i32, i32), color: [u8; 3]) -> usize {
        font::draw_text(&mut self.buffer, text, origin, color)
    }

    /// Fill the whole display with one colour and push it.
    pub fn clear(&mut self, rgb: [u8; 3]) -> StreamResult<()> {
        self.fill(rgb);
        self.commit()
    }

    /// Clear to `background`, draw `text` at `origin` and push the result.
    pub fn show_text(
        &mut self,
        text: &str,
        origin: (i32, i32),
        color: [u8; 3],
        background: [u8; 3],
    ) -> StreamResult<()> {
        self.fill(background);
        let lit = self.draw_text(text, origin, color);
        debug!(text, ?origin, lit, "text drawn");
        self.commit()
    }

    fn reset_counter(&self) -> StreamResult<()> {
        debug!(address = %self.address, "resetting picture counter");
        self.exchange(&json!({ "Command": "Draw/ResetHttpGifId" }))
            .map(|_| ())
            .map_err(StreamError::sink)
    }

    /// POST one command and return the decoded reply.
    fn exchange(&self, body: &Value) -> Result<Value, String> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .map_err(|e| format!("request failed: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("device returned HTTP {}", response.status()));
        }
        let reply: Value = response
            .json()
            .map_err(|e| format!("unreadable reply: {e}"))?;
        check_reply(&reply)?;
        Ok(reply)
    }
}

impl DeviceSink for PixooSink {
    fn accept(&mut self, frame: &DeviceFrame) -> StreamResult<()> {
        let bytes = frame.as_bytes();
        if bytes.len() != FRAME_BYTES {
            return Err(StreamError::sink(format!(
                "frame has {} bytes, expected {FRAME_BYTES}",
                bytes.len()
            )));
        }
        self.buffer.copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> StreamResult<()> {
        let (next, reset) = advance_counter(self.pic_id);
        if reset {
            self.reset_counter()?;
        }
        self.pic_id = next;
        self.exchange(&send_gif_payload(self.pic_id, &self.buffer))
            .map(|_| ())
            .map_err(StreamError::sink)
    }
}

/// Picture id for the next push, and whether the device counter must be reset
/// first.
pub fn advance_counter(current: u32) -> (u32, bool) {
    let next = current.saturating_add(1);
    if next >= COUNTER_LIMIT {
        (1, true)
    } else {
        (next, false)
    }
}

/// Body of a `Draw/SendHttpGif` command carrying one full frame.
pub fn send_gif_payload(pic_id: u32, rgb: &[u8]) -> Value {
    json!({
        "Command": "Draw/SendHttpGif",
        "PicNum": 1,
        "PicWidth": DEVICE_SIZE,
        "PicOffset": 0,
        "PicID": pic_id,
        "PicSpeed": 1000,
        "PicData": general_purpose::STANDARD.encode(rgb),
    })
}

fn check_reply(reply: &Value) -> Result<(), String> {
    match reply.get("error_code").and_then(Value::as_i64) {
        Some(0) | None => Ok(()),
        Some(code) => Err(format!("device reported error_code {code}: {reply}")),
    }
}

/// The device reports `PicId` as a number on some firmware and a string on
/// others.
fn parse_pic_id(reply: &Value) -> Result<u32, String> {
    match reply.get("PicId") {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| format!("PicId {n} out of range")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| format!("PicId '{s}' is not a number")),
        _ => Err(format!("reply has no PicId: {reply}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use parking_lot::Mutex;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    /// Minimal HTTP/1.1 responder: records each JSON body and answers with
    /// whatever `reply` returns for it.
    fn fake_device(
        reply: impl Fn(&Value) -> Value + Send + 'static,
    ) -> (String, Arc<Mutex<Vec<Value>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut length = 0usize;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 {
                        break;
                    }
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }
                let mut body = vec![0u8; length];
                if reader.read_exact(&mut body).is_err() {
                    continue;
                }
                let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                let answer = reply(&request).to_string();
                log.lock().push(request);
                let _ = write!(
                    stream,
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    answer.len(),
                    answer
                );
            }
        });
        (address, seen)
    }

    fn commands(seen: &Arc<Mutex<Vec<Value>>>) -> Vec<String> {
        seen.lock()
            .iter()
            .map(|v| v["Command"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn counter_wraps_at_the_limit() {
        assert_eq!(advance_counter(0), (1, false));
        assert_eq!(advance_counter(30), (31, false));
        assert_eq!(advance_counter(31), (1, true));
        assert_eq!(advance_counter(u32::MAX), (1, true));
    }

    #[test]
    fn payload_carries_base64_rgb() {
        let payload = send_gif_payload(7, &[255, 0, 0, 0, 255, 0]);
        assert_eq!(payload["Command"], "Draw/SendHttpGif");
        assert_eq!(payload["PicID"], 7);
        assert_eq!(payload["PicWidth"], 64);
        assert_eq!(payload["PicNum"], 1);
        assert_eq!(payload["PicData"], "/wAAAP8A");
    }

    #[test]
    fn pic_id_accepts_numbers_and_strings() {
        assert_eq!(parse_pic_id(&json!({"PicId": 12})), Ok(12));
        assert_eq!(parse_pic_id(&json!({"PicId": " 40 "})), Ok(40));
        assert!(parse_pic_id(&json!({"error_code": 0})).is_err());
        assert!(parse_pic_id(&json!({"PicId": -1})).is_err());
    }

    #[test]
    fn nonzero_error_code_is_rejected() {
        assert!(check_reply(&json!({"error_code": 0})).is_ok());
        assert!(check_reply(&json!({})).is_ok());
        assert!(check_reply(&json!({"error_code": 1})).is_err());
    }

    #[test]
    fn connect_then_push_speaks_the_protocol() {
        let (address, seen) = fake_device(|req| match req["Command"].as_str() {
            Some("Draw/GetHttpGifId") => json!({"error_code": 0, "PicId": 4}),
            _ => json!({"error_code": 0}),
        });
        let mut sink = PixooSink::connect(&address, Duration::from_secs(2)).unwrap();
        let frame = DeviceFrame::new(RgbImage::from_pixel(64, 64, Rgb([1, 2, 3]))).unwrap();
        sink.accept(&frame).unwrap();
        sink.commit().unwrap();

        assert_eq!(commands(&seen), ["Draw/GetHttpGifId", "Draw/SendHttpGif"]);
        let sent = seen.lock()[1].clone();
        assert_eq!(sent["PicID"], 5);
        let data = general_purpose::STANDARD
            .decode(sent["PicData"].as_str().unwrap())
            .unwrap();
        assert_eq!(data.len(), FRAME_BYTES);
        assert_eq!(&data[..3], &[1, 2, 3]);
    }

    #[test]
    fn high_counter_is_reset_on_connect_and_on_wrap() {
        let (address, seen) = fake_device(|req| match req["Command"].as_str() {
            Some("Draw/GetHttpGifId") => json!({"error_code": 0, "PicId": "35"}),
            _ => json!({"error_code": 0}),
        });
        let mut sink = PixooSink::connect(&address, Duration::from_secs(2)).unwrap();
        for _ in 0..COUNTER_LIMIT {
            sink.clear([0, 0, 0]).unwrap();
        }
        let cmds = commands(&seen);
        assert_eq!(cmds[1], "Draw/ResetHttpGifId");
        // ids 1..=31, then a reset and id 1 again
        assert_eq!(
            cmds.iter().filter(|c| *c == "Draw/ResetHttpGifId").count(),
            2
        );
        assert_eq!(seen.lock().last().unwrap()["PicID"], 1);
    }

    #[test]
    fn device_error_fails_the_commit() {
        let (address, _seen) = fake_device(|req| match req["Command"].as_str() {
            Some("Draw/GetHttpGifId") => json!({"error_code": 0, "PicId": 0}),
            _ => json!({"error_code": 5}),
        });
        let mut sink = PixooSink::connect(&address, Duration::from_secs(2)).unwrap();
        let err = sink.clear([9, 9, 9]).unwrap_err();
        assert_eq!(err.category(), "sink");
    }

    #[test]
    fn text_is_drawn_over_the_background_and_pushed() {
        let (address, seen) = fake_device(|req| match req["Command"].as_str() {
            Some("Draw/GetHttpGifId") => json!({"error_code": 0, "PicId": 0}),
            _ => json!({"error_code": 0}),
        });
        let mut sink = PixooSink::connect(&address, Duration::from_secs(2)).unwrap();
        sink.show_text("Hi", (2, 3), [255, 255, 255], [0, 0, 40]).unwrap();

        assert_eq!(commands(&seen), ["Draw/GetHttpGifId", "Draw/SendHttpGif"]);
        let sent = seen.lock()[1].clone();
        assert_eq!(sent["PicID"], 1);
        let data = general_purpose::STANDARD
            .decode(sent["PicData"].as_str().unwrap())
            .unwrap();
        let pixel = |x: usize, y: usize| {
            let at = (y * DEVICE_SIZE as usize + x) * 3;
            [data[at], data[at + 1], data[at + 2]]
        };
        // left stem of the H, then the gap before the I
        assert_eq!(pixel(2, 3), [255, 255, 255]);
        assert_eq!(pixel(2, 7), [255, 255, 255]);
        assert_eq!(pixel(5, 3), [0, 0, 40]);
        assert_eq!(pixel(6, 3), [255, 255, 255]);
        assert_eq!(pixel(63, 63), [0, 0, 40]);
    }

    #[test]
    fn unreachable_device_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);
        let err = PixooSink::connect(&address, Duration::from_millis(300)).unwrap_err();
        assert_eq!(err.category(), "connect");
    }
}
