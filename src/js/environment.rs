use rquickjs::{Function, Object, Value};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, error};
use url::{Position, Url};

use super::polyfills::POLYFILLS;
use super::runtime::QuickJsEngine;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Engine members the assembler wires into the global namespace.
pub const REQUIRED_MEMBERS: &[&str] = &[
    "EventTarget",
    "Node",
    "CharacterData",
    "Text",
    "Comment",
    "Element",
    "HTMLElement",
    "HTMLImageElement",
    "DocumentFragment",
    "Document",
    "Event",
    "CustomEvent",
    "wrap",
    "handleOf",
];

/// Build the browser-like global namespace on top of `__bridge_impl`.
///
/// Every member the wiring relies on is checked first, so a broken engine
/// bootstrap fails here with [`BridgeError::Configuration`] instead of
/// surfacing later as a page-script `TypeError`.
pub fn assemble(engine: &QuickJsEngine, base_url: &Url, config: &BridgeConfig) -> Result<()> {
    verify_engine(engine)?;
    let settings = environment_settings(base_url, config).to_string();
    engine.with_context(|ctx| {
        let assemble: Function = ctx.eval(WINDOW_BOOTSTRAP)?;
        let settings = ctx.json_parse(settings)?;
        assemble.call::<_, ()>((settings,))?;
        ctx.eval::<(), _>(POLYFILLS)
    })?;
    debug!(target: "quickjs", base_url = %base_url, "global environment assembled");
    Ok(())
}

pub fn verify_engine(engine: &QuickJsEngine) -> Result<()> {
    let missing = engine.with_context(|ctx| -> rquickjs::Result<Option<String>> {
        let Some(implementation) = ctx.globals().get::<_, Option<Object>>("__bridge_impl")? else {
            return Ok(Some("__bridge_impl".to_string()));
        };
        for member in REQUIRED_MEMBERS {
            let value: Value = implementation.get(*member)?;
            if value.is_undefined() || value.is_null() {
                return Ok(Some((*member).to_string()));
            }
        }
        let Some(document) = implementation.get::<_, Option<Object>>("document")? else {
            return Ok(Some("document".to_string()));
        };
        let create: Value = document.get("createElement")?;
        if !create.is_function() {
            return Ok(Some("document.createElement".to_string()));
        }
        Ok(None)
    })?;

    match missing {
        Some(member) => {
            error!(target: "quickjs", %member, "engine is missing a required member");
            Err(BridgeError::Configuration { member })
        }
        None => Ok(()),
    }
}

fn environment_settings(base_url: &Url, config: &BridgeConfig) -> JsonValue {
    json!({
        "location": {
            "href": base_url.as_str(),
            "protocol": format!("{}:", base_url.scheme()),
            "host": &base_url[Position::BeforeHost..Position::AfterPort],
            "hostname": base_url.host_str().unwrap_or(""),
            "port": base_url.port().map(|port| port.to_string()).unwrap_or_default(),
            "pathname": base_url.path(),
            "search": base_url.query().map(|q| format!("?{q}")).unwrap_or_default(),
            "hash": base_url.fragment().map(|f| format!("#{f}")).unwrap_or_default(),
            "origin": base_url.origin().ascii_serialization(),
        },
        "screen": {
            "width": config.screen.width,
            "height": config.screen.height,
            "x": config.screen.x,
            "y": config.screen.y,
        },
        "navigator": {
            "platform": config.navigator.platform,
            "userAgent": config.navigator.user_agent,
            "language": config.navigator.language,
        },
    })
}

const WINDOW_BOOTSTRAP: &str = r#"
(function assemble(settings) {
    const global = globalThis;
    const impl = global.__bridge_impl;
    const { wrap } = impl;
    const document = impl.document;
    const hooks = global.__bridge || (global.__bridge = {});

    for (const name of [
        'EventTarget', 'Node', 'CharacterData', 'Text', 'Comment', 'Element',
        'HTMLElement', 'HTMLImageElement', 'DocumentFragment', 'Document',
        'Event', 'CustomEvent',
    ]) {
        global[name] = impl[name];
    }
    global.document = document;

    global.window = global;
    global.self = global;
    global.parent = global;
    global.top = global;
    global.frames = global;

    global.history = {
        length: 1,
        state: null,
        replaceState() {},
        pushState() {},
        back() {},
        forward() {},
        go() {},
    };

    const location = {};
    for (const [key, value] of Object.entries(settings.location)) {
        Object.defineProperty(location, key, {
            get: () => value,
            set: () => {},
            enumerable: true,
        });
    }
    location.assign = () => {};
    location.replace = () => {};
    location.reload = () => {};
    location.toString = () => settings.location.href;
    global.location = location;

    const documentProperties = {
        location: location,
        URL: settings.location.href,
        documentURI: settings.location.href,
        domain: settings.location.hostname,
        referrer: '',
        defaultView: global,
    };
    for (const [key, value] of Object.entries(documentProperties)) {
        Object.defineProperty(document, key, { get: () => value, set: () => {} });
    }

    global.screen = {
        width: settings.screen.width,
        height: settings.screen.height,
        availWidth: settings.screen.width,
        availHeight: settings.screen.height,
        colorDepth: 24,
        pixelDepth: 24,
    };
    global.screenX = settings.screen.x;
    global.screenY = settings.screen.y;
    global.screenLeft = settings.screen.x;
    global.screenTop = settings.screen.y;
    global.innerWidth = settings.screen.width;
    global.innerHeight = settings.screen.height;
    global.devicePixelRatio = 1;

    global.navigator = {
        platform: settings.navigator.platform,
        userAgent: settings.navigator.userAgent,
        language: settings.navigator.language,
        languages: [settings.navigator.language],
        cookieEnabled: false,
        onLine: true,
        appName: 'Netscape',
        vendor: '',
    };

    global.addEventListener = function addEventListener() {};
    global.removeEventListener = function removeEventListener() {};
    global.dispatchEvent = function dispatchEvent() {
        return true;
    };

    impl.Element.prototype.getClientRects = function getClientRects() {
        return [];
    };

    const hasClickHandler = (element) => {
        const own = Object.prototype.hasOwnProperty.call(element, '_listeners')
            ? element._listeners.click
            : null;
        return (own && own.length > 0)
            || typeof element.onclick === 'function'
            || element.hasAttribute('onclick');
    };

    hooks.click = (handle) => {
        const element = wrap(handle);
        if (!element || element.nodeType !== 1 || !hasClickHandler(element)) {
            return false;
        }
        element.click();
        return true;
    };

    hooks.submit = (handle) => {
        let node = wrap(handle);
        while (node && !(node.nodeType === 1 && node.tagName === 'FORM')) {
            node = node.parentNode;
        }
        if (!node) {
            return false;
        }
        node.dispatchEvent(new impl.Event('submit', { bubbles: true, cancelable: true }));
        return true;
    };

    hooks.closeDocument = () => {
        document.close();
    };
})
"#;
