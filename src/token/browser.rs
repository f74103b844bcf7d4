use std::{ffi::OsStr, sync::Arc};

use compact_str::CompactString;
use headless_chrome::{
    Browser, LaunchOptions, Tab,
    browser::tab::EventListener,
    protocol::cdp::{
        Network::{self, events::RequestWillBeSentEvent},
        types::Event,
    },
};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

/// Authenticated call the charts frontend fires once a session exists.
/// Its Authorization header is the only thing we are after.
pub const OVERVIEW_FRAGMENT: &str = "auth/v1/overview/GLOBAL";

pub fn launch(headless: bool) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![OsStr::new("--disable-blink-features=AutomationControlled")],
        headless,
        ..LaunchOptions::default()
    })
}

/// Passive observer over every outgoing request. Matching requests have
/// their bearer token pushed down the channel; navigation is never blocked.
/// Firing more than once is harmless, the receiver keeps the last value.
pub struct TokenListener {
    tx: UnboundedSender<CompactString>,
}

impl EventListener<Event> for TokenListener {
    fn on_event(&self, event: &Event) {
        let Event::NetworkRequestWillBeSent(RequestWillBeSentEvent { params }) = event else {
            return;
        };
        if !params.request.url.contains(OVERVIEW_FRAGMENT) {
            return;
        }
        let Some(Value::Object(ref headers)) = params.request.headers.0 else {
            return;
        };

        for (k, v) in headers {
            if k.eq_ignore_ascii_case("authorization") {
                if let Value::String(s) = v {
                    if let Some(token) = s.strip_prefix("Bearer ") {
                        let _ = self.tx.send(CompactString::new(token));
                    }
                }
            }
        }
    }
}

/// Register the observer on `tab`. Must happen before any navigation that
/// could trigger the authenticated call.
pub fn observe(tab: &Arc<Tab>, tx: UnboundedSender<CompactString>) -> anyhow::Result<()> {
    tab.call_method(Network::Enable {
        max_total_buffer_size: None,
        max_resource_buffer_size: None,
        max_post_data_size: None,
        report_direct_socket_traffic: None,
        enable_durable_messages: None,
    })?;
    tab.add_event_listener(Arc::new(TokenListener { tx }))?;
    Ok(())
}
