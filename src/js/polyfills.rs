//! Browser APIs that are not part of the DOM tree: encoding, storage, the
//! `Image` factory, `XMLHttpRequest`, computed style and timers.
//!
//! Evaluated after the window bootstrap. Also registers the `__bridge` hooks
//! the session calls to deliver request completions and fire timers.

pub const POLYFILLS: &str = r#"
(() => {
    const global = globalThis;
    const impl = global.__bridge_impl;
    const { wrap, handleOf, EventTarget, Event } = impl;
    const hooks = global.__bridge || (global.__bridge = {});

    const LONE_SURROGATE = /[\uD800-\uDBFF](?![\uDC00-\uDFFF])|(?<![\uD800-\uDBFF])[\uDC00-\uDFFF]/g;

    class TextEncoder {
        get encoding() {
            return 'utf-8';
        }
        // Unpaired surrogates encode as U+FFFD.
        encode(input = '') {
            const text = String(input).replace(LONE_SURROGATE, '\uFFFD');
            return new Uint8Array(__bridge_utf8_encode(text));
        }
    }

    class TextDecoder {
        constructor(label = 'utf-8') {
            const normalized = String(label).trim().toLowerCase();
            if (normalized !== 'utf-8' && normalized !== 'utf8' && normalized !== 'unicode-1-1-utf-8') {
                throw new RangeError(`The encoding label provided ('${label}') is invalid.`);
            }
        }
        get encoding() {
            return 'utf-8';
        }
        decode(input) {
            if (input == null) {
                return '';
            }
            let bytes;
            if (input instanceof ArrayBuffer) {
                bytes = new Uint8Array(input);
            } else if (ArrayBuffer.isView(input)) {
                bytes = new Uint8Array(input.buffer, input.byteOffset, input.byteLength);
            } else {
                bytes = Uint8Array.from(input);
            }
            return __bridge_utf8_decode(Array.from(bytes));
        }
    }

    global.TextEncoder = TextEncoder;
    global.TextDecoder = TextDecoder;

    // getItem yields undefined for a missing key.
    const localStorage = {
        getItem(key) {
            return __bridge_storage_get(String(key));
        },
        setItem(key, value) {
            __bridge_storage_set(String(key), String(value));
        },
        removeItem(key) {
            __bridge_storage_remove(String(key));
        },
        clear() {
            __bridge_storage_clear();
        },
        key(index) {
            return __bridge_storage_key(Number(index) >>> 0) ?? null;
        },
        get length() {
            return __bridge_storage_length();
        },
    };
    global.localStorage = localStorage;

    function Image(width, height) {
        const dimension = (value) => (value === undefined || value === null ? null : Number(value));
        return wrap(__bridge_new_image(dimension(width), dimension(height)));
    }
    Image.prototype = impl.HTMLImageElement.prototype;
    global.Image = Image;

    const REQUESTS = new Map();

    class XMLHttpRequest extends EventTarget {
        constructor() {
            super();
            this._id = __bridge_xhr_create();
            this.readyState = 0;
            this.status = 0;
            this.statusText = '';
            this.responseText = '';
            this.response = '';
            this.responseType = '';
            this.responseURL = '';
            this.responseXML = null;
            this.timeout = 0;
            this.withCredentials = false;
            this.onload = null;
            this.onerror = null;
            this.onreadystatechange = null;
        }
        open(method, url) {
            this.readyState = __bridge_xhr_open(this._id, String(method), String(url));
            this.responseURL = String(url);
        }
        setRequestHeader(name, value) {
            __bridge_xhr_set_header(this._id, String(name), String(value));
        }
        // Held in REQUESTS only while a response is pending. Completions
        // never arrive while a script runs.
        send(body) {
            __bridge_xhr_send(this._id, body == null ? null : String(body));
            REQUESTS.set(this._id, this);
            this.readyState = 2;
        }
        abort() {}
        getAllResponseHeaders() {
            return '';
        }
        getResponseHeader() {
            return null;
        }
        overrideMimeType() {}
    }
    Object.assign(XMLHttpRequest, {
        UNSENT: 0,
        OPENED: 1,
        HEADERS_RECEIVED: 2,
        LOADING: 3,
        DONE: 4,
    });
    global.XMLHttpRequest = XMLHttpRequest;

    // load listeners, then onload, then onreadystatechange.
    hooks.completeRequest = (id, body) => {
        const xhr = REQUESTS.get(id);
        if (!xhr) {
            return false;
        }
        REQUESTS.delete(id);
        xhr.readyState = 4;
        xhr.status = 200;
        xhr.statusText = 'OK';
        xhr.responseText = body;
        if (xhr.responseType === 'json') {
            try {
                xhr.response = JSON.parse(body);
            } catch (err) {
                xhr.response = null;
            }
        } else {
            xhr.response = body;
        }
        xhr.dispatchEvent(new Event('load'));
        xhr.dispatchEvent(new Event('readystatechange'));
        return true;
    };

    const cssName = (prop) => (
        prop === 'cssFloat' ? 'float' : prop.replace(/[A-Z]/g, (c) => '-' + c.toLowerCase())
    );

    global.getComputedStyle = function getComputedStyle(element, pseudoElement) {
        const handle = element == null ? null : handleOf(element);
        const pseudo = pseudoElement == null ? null : String(pseudoElement);
        const declaration = {
            getPropertyValue(property) {
                const extra = arguments.length > 1 && arguments[1] !== undefined
                    ? JSON.stringify(arguments[1])
                    : undefined;
                return __bridge_style(handle, pseudo, String(property), extra ?? null);
            },
        };
        return new Proxy(declaration, {
            get(target, prop, receiver) {
                if (typeof prop !== 'string' || prop in target) {
                    return Reflect.get(target, prop, receiver);
                }
                return target.getPropertyValue(cssName(prop));
            },
        });
    };

    const TIMERS = new Map();

    const schedule = (callback, delay, args, repeating, frame) => {
        const id = __bridge_timer_set(Number(delay) || 0, repeating);
        TIMERS.set(id, { callback, args, repeating, frame });
        return id;
    };

    const clearTimer = (id) => {
        if (id == null) {
            return;
        }
        TIMERS.delete(id);
        __bridge_timer_clear(Number(id) >>> 0);
    };

    global.setTimeout = (callback, delay, ...args) => schedule(callback, delay, args, false, false);
    global.setInterval = (callback, delay, ...args) => schedule(callback, delay, args, true, false);
    global.clearTimeout = clearTimer;
    global.clearInterval = clearTimer;
    global.requestAnimationFrame = (callback) => schedule(callback, 16, [], false, true);
    global.cancelAnimationFrame = clearTimer;
    global.queueMicrotask = (callback) => {
        Promise.resolve().then(() => callback());
    };

    hooks.invokeTimer = (id, now) => {
        const entry = TIMERS.get(id);
        if (!entry) {
            return false;
        }
        if (!entry.repeating) {
            TIMERS.delete(id);
        }
        if (typeof entry.callback === 'function') {
            entry.callback.apply(global, entry.frame ? [now] : entry.args);
        } else if (entry.callback != null) {
            (0, eval)(String(entry.callback));
        }
        return true;
    };
})();
"#;
