//! The stdio JSON-RPC loop.
//!
//! A dedicated thread reads Content-Length framed messages from stdin
//! and feeds them through a channel; the main loop owns the handler and
//! stdout. `recv_timeout` doubles as the debounce tick: when no message
//! arrives within the window, dirty documents are analyzed and their
//! diagnostics published, so a burst of `didChange` notifications costs
//! one analysis.

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    sync::mpsc,
    thread,
    time::Duration,
};

use serde::Deserialize;
use serde_json::{Value, json};

use crate::handler::LspHandler;

/// Debounce window between the last document change and re-analysis.
const DEBOUNCE: Duration = Duration::from_millis(300);

/// JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct RpcMessage {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// Runs the server over stdin/stdout until `exit` or EOF.
pub fn serve_stdio() -> io::Result<()> {
    let (tx, rx) = mpsc::channel::<Option<Vec<u8>>>();
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut reader = BufReader::new(stdin.lock());
        loop {
            match read_framed_message(&mut reader) {
                Ok(Some(body)) => {
                    if tx.send(Some(body)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = tx.send(None);
                    break;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to read LSP frame");
                    let _ = tx.send(None);
                    break;
                }
            }
        }
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut handler = LspHandler::new();

    loop {
        match rx.recv_timeout(DEBOUNCE) {
            Ok(Some(body)) => {
                let message = match serde_json::from_slice::<RpcMessage>(&body) {
                    Ok(message) => message,
                    Err(err) => {
                        let response = error_response(&Value::Null, -32700, &format!("parse error: {err}"));
                        write_framed_message(&mut writer, &response)?;
                        continue;
                    }
                };
                if dispatch(&mut handler, message, &mut writer)? {
                    break;
                }
            }
            Ok(None) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                for notification in handler.flush_dirty() {
                    write_framed_message(&mut writer, &notification)?;
                }
            }
        }
    }
    Ok(())
}

/// Handles one message. Returns true when the server should exit.
fn dispatch(handler: &mut LspHandler, message: RpcMessage, writer: &mut impl Write) -> io::Result<bool> {
    // Notifications have no id and never get a response.
    let Some(id) = message.id else {
        match message.method.as_str() {
            "initialized" => {}
            "exit" => return Ok(true),
            "textDocument/didOpen" => {
                for notification in handler.did_open(&message.params) {
                    write_framed_message(writer, &notification)?;
                }
            }
            "textDocument/didChange" => handler.did_change(&message.params),
            "textDocument/didSave" => {
                for notification in handler.flush_dirty() {
                    write_framed_message(writer, &notification)?;
                }
            }
            "textDocument/didClose" => {
                for notification in handler.did_close(&message.params) {
                    write_framed_message(writer, &notification)?;
                }
            }
            other => tracing::debug!(method = other, "ignored notification"),
        }
        return Ok(false);
    };

    let result = match message.method.as_str() {
        "initialize" => Ok(handler.initialize(&message.params)),
        "shutdown" => Ok(Value::Null),
        "textDocument/hover" => Ok(handler.hover(&message.params)),
        "textDocument/completion" => Ok(handler.completion(&message.params)),
        "textDocument/signatureHelp" => Ok(handler.signature_help(&message.params)),
        "textDocument/definition" => Ok(handler.definition(&message.params)),
        "textDocument/documentSymbol" => Ok(handler.document_symbols(&message.params)),
        "textDocument/references" => Ok(handler.references(&message.params)),
        "textDocument/prepareRename" => Ok(handler.prepare_rename(&message.params)),
        "textDocument/rename" => Ok(handler.rename(&message.params)),
        "textDocument/codeAction" => Ok(handler.code_actions(&message.params)),
        "textDocument/semanticTokens/full" => Ok(handler.semantic_tokens_full(&message.params)),
        "workspace/symbol" => Ok(handler.workspace_symbols(&message.params)),
        other => Err(format!("method not found: {other}")),
    };

    // Diagnostics for freshly analyzed documents ride along with every
    // response so a request never observes stale squiggles.
    for notification in handler.take_pending_notifications() {
        write_framed_message(writer, &notification)?;
    }

    let response = match result {
        Ok(result) => success_response(&id, &result),
        Err(message) => error_response(&id, -32601, &message),
    };
    write_framed_message(writer, &response)?;
    Ok(false)
}

fn success_response(id: &Value, result: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

fn error_response(id: &Value, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
        },
    })
}

/// Reads one Content-Length framed message body.
fn read_framed_message(reader: &mut impl BufRead) -> io::Result<Option<Vec<u8>>> {
    let mut content_length = None;
    loop {
        let mut header_line = String::new();
        let read = reader.read_line(&mut header_line)?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = header_line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            let length = value
                .trim()
                .parse::<usize>()
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("invalid Content-Length: {err}")))?;
            content_length = Some(length);
        }
    }

    let Some(content_length) = content_length else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing Content-Length header",
        ));
    };

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Writes one Content-Length framed JSON message.
fn write_framed_message(writer: &mut impl Write, payload: &Value) -> io::Result<()> {
    let body = serde_json::to_vec(payload)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, format!("serialize error: {err}")))?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()
}
