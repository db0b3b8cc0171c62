//! Console presentation surface and the stdin line grammar.
//!
//! ```text
//! !text            modal alert
//! ?text            non-modal alert
//! error: text      error report
//! neterr: text     network error (deferred while offline)
//! parse: text      parse error
//! /commit /dismiss /online /offline /stats /quit
//! anything else    plain message
//! ```

use std::io::Write;
use std::sync::Mutex;

use notiq_core::{Alert, ErrorReport, Message, PresentError, Presenter, QueueItem};

pub struct ConsolePresenter {
    json: bool,
    out: Mutex<std::io::Stdout>,
}

impl ConsolePresenter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            out: Mutex::new(std::io::stdout()),
        }
    }
}

/// One rendered line for `item`.
pub fn render(item: &QueueItem, modal: bool, json: bool) -> Result<String, PresentError> {
    if json {
        let value = serde_json::json!({ "modal": modal, "item": item });
        return serde_json::to_string(&value).map_err(|e| PresentError::Rejected(e.to_string()));
    }
    let marker = if modal { "[modal] " } else { "" };
    Ok(match item.title() {
        Some(title) => format!("{marker}{}: {title}: {}", item.kind(), item.signature()),
        None => format!("{marker}{}: {}", item.kind(), item.signature()),
    })
}

impl Presenter for ConsolePresenter {
    fn present(&self, item: &QueueItem, modal: bool) -> Result<(), PresentError> {
        let line = render(item, modal, self.json)?;
        let mut out = self.out.lock().map_err(|_| PresentError::Unavailable)?;
        writeln!(out, "{line}").map_err(|e| PresentError::Rejected(e.to_string()))?;
        if modal && !self.json {
            writeln!(out, "  (type /dismiss to close)")
                .map_err(|e| PresentError::Rejected(e.to_string()))?;
        }
        out.flush().map_err(|e| PresentError::Rejected(e.to_string()))
    }
}

/// Error code used for errors typed on the console.
const CONSOLE_ERROR_CODE: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Message(Message),
    Alert { alert: Alert, modal: bool },
    Error(ErrorReport),
    ParseError(ErrorReport),
    Commit,
    Dismiss,
    Online,
    Offline,
    Stats,
    Quit,
    /// Unknown slash command.
    Unknown(String),
}

pub fn parse_line(line: &str) -> Input {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(cmd) = line.strip_prefix('/') {
        return match cmd.trim() {
            "commit" => Input::Commit,
            "dismiss" => Input::Dismiss,
            "online" => Input::Online,
            "offline" => Input::Offline,
            "stats" => Input::Stats,
            "quit" | "exit" => Input::Quit,
            other => Input::Unknown(other.to_owned()),
        };
    }
    if let Some(text) = line.strip_prefix('!') {
        return Input::Alert {
            alert: Alert::new(text.trim()),
            modal: true,
        };
    }
    if let Some(text) = line.strip_prefix('?') {
        return Input::Alert {
            alert: Alert::new(text.trim()),
            modal: false,
        };
    }
    if let Some(text) = line.strip_prefix("neterr:") {
        return Input::Error(ErrorReport::network(CONSOLE_ERROR_CODE, text.trim()));
    }
    if let Some(text) = line.strip_prefix("error:") {
        return Input::Error(ErrorReport::new("console", CONSOLE_ERROR_CODE, text.trim()));
    }
    if let Some(text) = line.strip_prefix("parse:") {
        return Input::ParseError(ErrorReport::new("parse", CONSOLE_ERROR_CODE, text.trim()));
    }
    Input::Message(Message::new(line.trim()))
}
