//! Telephony vendor reply documents (TwiML).
//!
//! The vendor's webhook contract expects an XML document of verbs executed in
//! order. Only the verbs this survey uses are modeled: speak (vendor voice),
//! play (our synthesized audio), record-and-callback, and hangup.

use axum::http::header;
use axum::response::{IntoResponse, Response};

/// A voice reply under construction. Verbs render in insertion order.
#[derive(Debug, Default)]
pub struct VoiceReply {
    verbs: Vec<Verb>,
}

#[derive(Debug)]
enum Verb {
    Say(String),
    Play(String),
    Record {
        action: String,
        max_length_secs: u32,
        timeout_secs: u32,
    },
    Hangup,
}

impl VoiceReply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speaks `text` with the vendor's own voice.
    pub fn say(mut self, text: &str) -> Self {
        self.verbs.push(Verb::Say(text.to_string()));
        self
    }

    /// Plays previously synthesized audio from a public URL.
    pub fn play(mut self, url: &str) -> Self {
        self.verbs.push(Verb::Play(url.to_string()));
        self
    }

    /// Records the caller and delivers the recording to `action`.
    ///
    /// `max_length_secs` bounds the recording; `timeout_secs` is the silence
    /// cutoff that ends it early.
    pub fn record(mut self, action: &str, max_length_secs: u32, timeout_secs: u32) -> Self {
        self.verbs.push(Verb::Record {
            action: action.to_string(),
            max_length_secs,
            timeout_secs,
        });
        self
    }

    /// Terminates the call.
    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => {
                    xml.push_str("<Say>");
                    xml.push_str(&xml_escape(text));
                    xml.push_str("</Say>");
                }
                Verb::Play(url) => {
                    xml.push_str("<Play>");
                    xml.push_str(&xml_escape(url));
                    xml.push_str("</Play>");
                }
                Verb::Record {
                    action,
                    max_length_secs,
                    timeout_secs,
                } => {
                    xml.push_str(&format!(
                        r#"<Record action="{}" method="POST" maxLength="{}" timeout="{}" playBeep="true"/>"#,
                        xml_escape(action),
                        max_length_secs,
                        timeout_secs
                    ));
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }

    pub fn into_twiml(self) -> Twiml {
        Twiml(self.to_xml())
    }
}

/// An XML reply body with the content type the vendor requires.
#[derive(Debug)]
pub struct Twiml(pub String);

impl IntoResponse for Twiml {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "text/xml")], self.0).into_response()
    }
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
