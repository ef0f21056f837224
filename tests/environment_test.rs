mod common;

use std::collections::HashMap;
use std::rc::Rc;

use common::{session, session_with, RecordingHost};
use dombridge::{BridgeConfig, BridgeError, Session};

const PAGE: &str = "<html><head><title>Env</title></head><body><p id=\"p\">x</p></body></html>";

#[test]
fn window_aliases_point_at_the_global_object() {
    let (session, _host) = session(PAGE);
    let ok: bool = session
        .eval_with(
            "window === globalThis && self === window && top === window && document.defaultView === window",
            "aliases.js",
        )
        .unwrap();
    assert!(ok);
}

#[test]
fn location_is_split_from_the_base_url() {
    let host = Rc::new(RecordingHost::default());
    let session = Session::new(
        PAGE,
        "https://shop.example.com:8443/cart/view.html?item=7#summary",
        host,
        BridgeConfig::default(),
    )
    .expect("create session");

    let parts: String = session
        .eval_with(
            "[location.protocol, location.host, location.hostname, location.port, location.pathname, location.search, location.hash, location.origin].join(' ')",
            "location.js",
        )
        .unwrap();
    assert_eq!(
        parts,
        "https: shop.example.com:8443 shop.example.com 8443 /cart/view.html ?item=7 #summary https://shop.example.com:8443"
    );

    // Navigation is not supported; writes are swallowed.
    let href: String = session
        .eval_with(
            "location.href = 'https://elsewhere.test/'; document.location.href",
            "assign.js",
        )
        .unwrap();
    assert_eq!(
        href,
        "https://shop.example.com:8443/cart/view.html?item=7#summary"
    );
}

#[test]
fn invalid_base_url_is_rejected() {
    let host = Rc::new(RecordingHost::default());
    let result = Session::new(PAGE, "not a url", host, BridgeConfig::default());
    assert!(matches!(result, Err(BridgeError::InvalidBaseUrl(_))));
}

#[test]
fn screen_and_navigator_follow_config() {
    let mut config = BridgeConfig::default();
    config.screen.width = 800;
    config.screen.height = 600;
    config.navigator.platform = "TestOS".to_string();
    let (session, _host) = session_with(PAGE, config);

    let summary: String = session
        .eval_with(
            "[screen.width, screen.height, screenX, screenY, navigator.platform].join(',')",
            "screen.js",
        )
        .unwrap();
    assert_eq!(summary, "800,600,0,25,TestOS");
}

#[test]
fn global_listeners_are_accepted_and_ignored() {
    let (session, _host) = session(PAGE);
    let ok: bool = session
        .eval_with(
            r#"
            var called = false;
            window.addEventListener('resize', function () { called = true; });
            window.dispatchEvent(new Event('resize'));
            window.removeEventListener('resize', function () {});
            called === false
            "#,
            "listeners.js",
        )
        .unwrap();
    assert!(ok);
}

#[test]
fn client_rects_are_empty() {
    let (session, _host) = session(PAGE);
    let count: u32 = session
        .eval_with(
            "document.getElementById('p').getClientRects().length",
            "rects.js",
        )
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn text_encoder_produces_utf8_bytes() {
    let (session, _host) = session(PAGE);
    let summary: String = session
        .eval_with(
            r#"
            const bytes = new TextEncoder().encode('hé€');
            [bytes.length, bytes[1], new TextDecoder().decode(bytes)].join(',')
            "#,
            "encoding.js",
        )
        .unwrap();
    assert_eq!(summary, "6,195,h\u{e9}\u{20ac}");
}

#[test]
fn local_storage_round_trips_through_the_host_view() {
    let mut config = BridgeConfig::default();
    config.local_storage = HashMap::from([("theme".to_string(), "dark".to_string())]);
    let (session, _host) = session_with(PAGE, config);

    let summary: String = session
        .eval_with(
            r#"
            localStorage.setItem('count', 3);
            [
                localStorage.getItem('theme'),
                localStorage.getItem('count'),
                typeof localStorage.getItem('missing'),
                localStorage.length,
                localStorage.key(0),
            ].join(',')
            "#,
            "storage.js",
        )
        .unwrap();
    assert_eq!(summary, "dark,3,undefined,2,count");

    session
        .exec("localStorage.removeItem('theme');", "remove.js")
        .unwrap();
    assert_eq!(
        session.local_storage(),
        HashMap::from([("count".to_string(), "3".to_string())])
    );
}

#[test]
fn document_title_reads_from_markup() {
    let (session, _host) = session(PAGE);
    let title: String = session.eval_with("document.title", "title.js").unwrap();
    assert_eq!(title, "Env");
}

#[test]
fn text_encoder_replaces_unpaired_surrogates() {
    let (session, _host) = session(PAGE);
    let encoded: String = session
        .eval_with(
            r"[
                Array.from(new TextEncoder().encode('a\uD800b')).join(','),
                Array.from(new TextEncoder().encode('\uDC00z')).join(','),
                Array.from(new TextEncoder().encode('😀')).join(','),
            ].join('|')",
            "surrogates.js",
        )
        .unwrap();
    assert_eq!(encoded, "97,239,191,189,98|239,191,189,122|240,159,152,128");
}
