//! Script-side DOM implementation layered over the `__bridge_dom_*` bindings.
//!
//! Evaluating [`DOM_BOOTSTRAP`] defines `globalThis.__bridge_impl`: the
//! interface constructors, the wrapped `document`, and the `wrap`/`handleOf`
//! helpers the environment assembler and polyfills build on. Nothing is put on
//! the global object directly; the assembler decides what becomes visible.

pub const DOM_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const HANDLE = Symbol('bridgeHandle');
    const NODE_CACHE = new Map();
    const INLINE_HANDLERS = new WeakMap();

    const toStr = (value) => (value == null ? '' : String(value));
    const nullable = (value) => (value === undefined ? null : value);

    const wrap = (handle) => {
        if (handle == null) {
            return null;
        }
        const cached = NODE_CACHE.get(handle);
        if (cached) {
            return cached;
        }
        let proto;
        switch (__bridge_dom_node_type(handle)) {
            case 1:
                proto = __bridge_dom_node_name(handle) === 'IMG'
                    ? HTMLImageElement.prototype
                    : HTMLElement.prototype;
                break;
            case 3:
                proto = Text.prototype;
                break;
            case 8:
                proto = Comment.prototype;
                break;
            case 9:
                proto = Document.prototype;
                break;
            case 11:
                proto = DocumentFragment.prototype;
                break;
            default:
                proto = Node.prototype;
        }
        const node = Object.create(proto);
        Object.defineProperty(node, HANDLE, { value: handle });
        NODE_CACHE.set(handle, node);
        return node;
    };

    const handleOf = (node) => {
        if (node == null || node[HANDLE] === undefined) {
            throw new TypeError('parameter is not of type \'Node\'');
        }
        return node[HANDLE];
    };

    const wrapAll = (handles) => handles.map(wrap);

    const siblings = (node, elementsOnly) => {
        const parent = __bridge_dom_parent(node[HANDLE]);
        if (parent == null) {
            return null;
        }
        return elementsOnly
            ? __bridge_dom_element_children(parent)
            : __bridge_dom_children(parent);
    };

    const sibling = (node, offset, elementsOnly) => {
        const list = siblings(node, elementsOnly);
        if (!list) {
            return null;
        }
        const index = list.indexOf(node[HANDLE]);
        if (index < 0) {
            return null;
        }
        return wrap(nullable(list[index + offset]));
    };

    const toNode = (value) => (
        value != null && value[HANDLE] !== undefined
            ? value
            : wrap(__bridge_dom_create_text(toStr(value)))
    );

    // Events

    class Event {
        constructor(type, init = {}) {
            if (arguments.length === 0) {
                throw new TypeError('Failed to construct \'Event\': 1 argument required');
            }
            this.type = String(type);
            this.bubbles = !!init.bubbles;
            this.cancelable = !!init.cancelable;
            this.composed = !!init.composed;
            this.defaultPrevented = false;
            this.target = null;
            this.currentTarget = null;
            this.eventPhase = 0;
            this.isTrusted = false;
            this.timeStamp = Date.now();
            this._stop = false;
            this._stopImmediate = false;
        }
        preventDefault() {
            if (this.cancelable) {
                this.defaultPrevented = true;
            }
        }
        stopPropagation() {
            this._stop = true;
        }
        stopImmediatePropagation() {
            this._stop = true;
            this._stopImmediate = true;
        }
        initEvent(type, bubbles, cancelable) {
            this.type = String(type);
            this.bubbles = !!bubbles;
            this.cancelable = !!cancelable;
        }
    }

    class CustomEvent extends Event {
        constructor(type, init = {}) {
            super(type, init);
            this.detail = init.detail === undefined ? null : init.detail;
        }
    }

    const listenersOf = (target, create) => {
        if (!Object.prototype.hasOwnProperty.call(target, '_listeners')) {
            if (!create) {
                return null;
            }
            Object.defineProperty(target, '_listeners', {
                value: Object.create(null),
                enumerable: false,
            });
        }
        return target._listeners;
    };

    const reportListenerError = (err) => {
        console.error('uncaught exception in event listener:', err);
    };

    const inlineHandler = (target, type) => {
        if (typeof target.getAttribute !== 'function') {
            return null;
        }
        const source = target.getAttribute('on' + type);
        if (source == null) {
            return null;
        }
        let cache = INLINE_HANDLERS.get(target);
        if (!cache) {
            cache = new Map();
            INLINE_HANDLERS.set(target, cache);
        }
        const cached = cache.get(type);
        if (cached && cached.source === source) {
            return cached.fn;
        }
        try {
            const fn = new Function('event', source);
            cache.set(type, { source, fn });
            return fn;
        } catch (err) {
            reportListenerError(err);
            return null;
        }
    };

    const invokeListeners = (target, event) => {
        event.currentTarget = target;
        const listeners = listenersOf(target, false);
        const bucket = listeners && listeners[event.type];
        if (bucket) {
            for (const listener of bucket.slice()) {
                try {
                    if (typeof listener === 'function') {
                        listener.call(target, event);
                    } else if (listener && typeof listener.handleEvent === 'function') {
                        listener.handleEvent(event);
                    }
                } catch (err) {
                    reportListenerError(err);
                }
                if (event._stopImmediate) {
                    return;
                }
            }
        }
        let handler = target['on' + event.type];
        if (typeof handler !== 'function') {
            handler = inlineHandler(target, event.type);
        }
        if (typeof handler === 'function') {
            try {
                const result = handler.call(target, event);
                if (result === false) {
                    event.preventDefault();
                }
            } catch (err) {
                reportListenerError(err);
            }
        }
    };

    class EventTarget {
        addEventListener(type, listener) {
            if (listener == null) {
                return;
            }
            const listeners = listenersOf(this, true);
            const key = String(type);
            const bucket = listeners[key] || (listeners[key] = []);
            if (!bucket.includes(listener)) {
                bucket.push(listener);
            }
        }

        removeEventListener(type, listener) {
            const listeners = listenersOf(this, false);
            const bucket = listeners && listeners[String(type)];
            if (!bucket) {
                return;
            }
            const index = bucket.indexOf(listener);
            if (index >= 0) {
                bucket.splice(index, 1);
            }
        }

        dispatchEvent(event) {
            if (!(event instanceof Event)) {
                throw new TypeError('parameter is not of type \'Event\'');
            }
            event.target = this;
            const path = [this];
            if (event.bubbles && this[HANDLE] !== undefined) {
                let parent = this.parentNode;
                while (parent) {
                    path.push(parent);
                    parent = parent.parentNode;
                }
            }
            for (let i = 0; i < path.length; i += 1) {
                event.eventPhase = i === 0 ? 2 : 3;
                invokeListeners(path[i], event);
                if (event._stop) {
                    break;
                }
            }
            event.currentTarget = null;
            event.eventPhase = 0;
            return !event.defaultPrevented;
        }
    }

    // Nodes

    class Node extends EventTarget {
        get nodeType() {
            return __bridge_dom_node_type(this[HANDLE]);
        }
        get nodeName() {
            return __bridge_dom_node_name(this[HANDLE]);
        }
        get parentNode() {
            return wrap(nullable(__bridge_dom_parent(this[HANDLE])));
        }
        get parentElement() {
            const parent = this.parentNode;
            return parent && parent.nodeType === 1 ? parent : null;
        }
        get childNodes() {
            return wrapAll(__bridge_dom_children(this[HANDLE]));
        }
        get firstChild() {
            const children = __bridge_dom_children(this[HANDLE]);
            return wrap(nullable(children[0]));
        }
        get lastChild() {
            const children = __bridge_dom_children(this[HANDLE]);
            return wrap(nullable(children[children.length - 1]));
        }
        get nextSibling() {
            return sibling(this, 1, false);
        }
        get previousSibling() {
            return sibling(this, -1, false);
        }
        get ownerDocument() {
            return this.nodeType === 9 ? null : impl.document;
        }
        get isConnected() {
            return __bridge_dom_contains(impl.document[HANDLE], this[HANDLE]);
        }
        get textContent() {
            return nullable(__bridge_dom_get_text(this[HANDLE]));
        }
        set textContent(value) {
            __bridge_dom_set_text(this[HANDLE], toStr(value));
        }
        get nodeValue() {
            return nullable(__bridge_dom_node_value(this[HANDLE]));
        }
        set nodeValue(value) {
            __bridge_dom_set_node_value(this[HANDLE], toStr(value));
        }
        hasChildNodes() {
            return __bridge_dom_children(this[HANDLE]).length > 0;
        }
        appendChild(child) {
            __bridge_dom_append(this[HANDLE], handleOf(child));
            return child;
        }
        insertBefore(child, reference) {
            const ref = reference == null ? null : handleOf(reference);
            __bridge_dom_insert_before(this[HANDLE], handleOf(child), ref);
            return child;
        }
        removeChild(child) {
            __bridge_dom_remove(this[HANDLE], handleOf(child));
            return child;
        }
        replaceChild(newChild, oldChild) {
            __bridge_dom_replace(this[HANDLE], handleOf(newChild), handleOf(oldChild));
            return oldChild;
        }
        cloneNode(deep) {
            return wrap(__bridge_dom_clone(this[HANDLE], !!deep));
        }
        contains(other) {
            if (other == null) {
                return false;
            }
            return __bridge_dom_contains(this[HANDLE], handleOf(other));
        }
        isSameNode(other) {
            return other === this;
        }
        remove() {
            const parent = __bridge_dom_parent(this[HANDLE]);
            if (parent != null) {
                __bridge_dom_remove(parent, this[HANDLE]);
            }
        }
    }

    const NODE_TYPES = {
        ELEMENT_NODE: 1,
        TEXT_NODE: 3,
        PROCESSING_INSTRUCTION_NODE: 7,
        COMMENT_NODE: 8,
        DOCUMENT_NODE: 9,
        DOCUMENT_TYPE_NODE: 10,
        DOCUMENT_FRAGMENT_NODE: 11,
    };
    Object.assign(Node, NODE_TYPES);
    Object.assign(Node.prototype, NODE_TYPES);

    // Shared by Element, Document and DocumentFragment.
    const parentNodeMixin = {
        get children() {
            return wrapAll(__bridge_dom_element_children(this[HANDLE]));
        },
        get firstElementChild() {
            return wrap(nullable(__bridge_dom_element_children(this[HANDLE])[0]));
        },
        get lastElementChild() {
            const children = __bridge_dom_element_children(this[HANDLE]);
            return wrap(nullable(children[children.length - 1]));
        },
        get childElementCount() {
            return __bridge_dom_element_children(this[HANDLE]).length;
        },
        querySelector(selectors) {
            const found = __bridge_dom_query_all(this[HANDLE], String(selectors));
            return wrap(nullable(found[0]));
        },
        querySelectorAll(selectors) {
            return wrapAll(__bridge_dom_query_all(this[HANDLE], String(selectors)));
        },
        getElementsByTagName(name) {
            return this.querySelectorAll(String(name) === '*' ? '*' : String(name));
        },
        getElementsByClassName(names) {
            const selector = String(names)
                .trim()
                .split(/\s+/)
                .filter(Boolean)
                .map((name) => '.' + name)
                .join('');
            return selector ? this.querySelectorAll(selector) : [];
        },
        append(...nodes) {
            for (const node of nodes) {
                this.appendChild(toNode(node));
            }
        },
        prepend(...nodes) {
            const first = this.firstChild;
            for (const node of nodes) {
                this.insertBefore(toNode(node), first);
            }
        },
    };

    const mixin = (target, source) => {
        for (const key of Object.getOwnPropertyNames(source)) {
            Object.defineProperty(target, key, Object.getOwnPropertyDescriptor(source, key));
        }
    };

    class CharacterData extends Node {
        get data() {
            return toStr(__bridge_dom_node_value(this[HANDLE]));
        }
        set data(value) {
            __bridge_dom_set_node_value(this[HANDLE], toStr(value));
        }
        get length() {
            return this.data.length;
        }
    }

    class Text extends CharacterData {
        get wholeText() {
            return this.data;
        }
    }

    class Comment extends CharacterData {}

    const classListFor = (element) => {
        const read = () => toStr(element.getAttribute('class')).split(/\s+/).filter(Boolean);
        const write = (tokens) => element.setAttribute('class', tokens.join(' '));
        return {
            get length() {
                return read().length;
            },
            item(index) {
                return nullable(read()[index]);
            },
            contains(token) {
                return read().includes(String(token));
            },
            add(...tokens) {
                const current = read();
                for (const token of tokens.map(String)) {
                    if (!current.includes(token)) {
                        current.push(token);
                    }
                }
                write(current);
            },
            remove(...tokens) {
                const drop = tokens.map(String);
                write(read().filter((token) => !drop.includes(token)));
            },
            toggle(token, force) {
                const name = String(token);
                const present = read().includes(name);
                const wanted = force === undefined ? !present : !!force;
                if (wanted && !present) {
                    this.add(name);
                } else if (!wanted && present) {
                    this.remove(name);
                }
                return wanted;
            },
            toString() {
                return read().join(' ');
            },
        };
    };

    const STYLE_CACHE = new Map();

    const inlineStyleFor = (element) => {
        const handle = element[HANDLE];
        let style = STYLE_CACHE.get(handle);
        if (style) {
            return style;
        }
        const declarations = new Map();
        const target = {
            getPropertyValue(name) {
                return declarations.get(String(name)) ?? '';
            },
            setProperty(name, value) {
                declarations.set(String(name), toStr(value));
            },
            removeProperty(name) {
                const previous = declarations.get(String(name)) ?? '';
                declarations.delete(String(name));
                return previous;
            },
            get cssText() {
                return Array.from(declarations, ([k, v]) => `${k}: ${v};`).join(' ');
            },
        };
        const kebab = (prop) => prop.replace(/[A-Z]/g, (c) => '-' + c.toLowerCase());
        style = new Proxy(target, {
            get(obj, prop, receiver) {
                if (typeof prop !== 'string' || prop in obj) {
                    return Reflect.get(obj, prop, receiver);
                }
                return obj.getPropertyValue(kebab(prop));
            },
            set(obj, prop, value) {
                if (typeof prop === 'string') {
                    obj.setProperty(kebab(prop), value);
                }
                return true;
            },
        });
        STYLE_CACHE.set(handle, style);
        return style;
    };

    class Element extends Node {
        get tagName() {
            return this.nodeName;
        }
        get localName() {
            return this.nodeName.toLowerCase();
        }
        get id() {
            return toStr(this.getAttribute('id'));
        }
        set id(value) {
            this.setAttribute('id', value);
        }
        get className() {
            return toStr(this.getAttribute('class'));
        }
        set className(value) {
            this.setAttribute('class', value);
        }
        get classList() {
            return classListFor(this);
        }
        get style() {
            return inlineStyleFor(this);
        }
        get attributes() {
            return __bridge_dom_attribute_names(this[HANDLE]).map((name) => ({
                name,
                value: toStr(this.getAttribute(name)),
            }));
        }
        getAttribute(name) {
            return nullable(__bridge_dom_get_attribute(this[HANDLE], String(name)));
        }
        getAttributeNames() {
            return __bridge_dom_attribute_names(this[HANDLE]);
        }
        hasAttribute(name) {
            return this.getAttribute(name) !== null;
        }
        hasAttributes() {
            return this.getAttributeNames().length > 0;
        }
        setAttribute(name, value) {
            __bridge_dom_set_attribute(this[HANDLE], String(name), toStr(value));
        }
        removeAttribute(name) {
            __bridge_dom_remove_attribute(this[HANDLE], String(name));
        }
        toggleAttribute(name, force) {
            const present = this.hasAttribute(name);
            const wanted = force === undefined ? !present : !!force;
            if (wanted && !present) {
                this.setAttribute(name, '');
            } else if (!wanted && present) {
                this.removeAttribute(name);
            }
            return wanted;
        }
        get innerHTML() {
            return __bridge_dom_inner_html(this[HANDLE]);
        }
        set innerHTML(value) {
            __bridge_dom_set_inner_html(this[HANDLE], toStr(value));
        }
        get outerHTML() {
            return __bridge_dom_outer_html(this[HANDLE]);
        }
        get nextElementSibling() {
            return sibling(this, 1, true);
        }
        get previousElementSibling() {
            return sibling(this, -1, true);
        }
        matches(selectors) {
            return __bridge_dom_matches(this[HANDLE], String(selectors));
        }
        closest(selectors) {
            let current = this;
            while (current && current.nodeType === 1) {
                if (current.matches(selectors)) {
                    return current;
                }
                current = current.parentNode;
            }
            return null;
        }
        getBoundingClientRect() {
            return { x: 0, y: 0, top: 0, left: 0, right: 0, bottom: 0, width: 0, height: 0 };
        }
        click() {
            this.dispatchEvent(new Event('click', { bubbles: true, cancelable: true }));
        }
        focus() {}
        blur() {}
    }
    mixin(Element.prototype, parentNodeMixin);

    class HTMLElement extends Element {
        get title() {
            return toStr(this.getAttribute('title'));
        }
        set title(value) {
            this.setAttribute('title', value);
        }
        get hidden() {
            return this.hasAttribute('hidden');
        }
        set hidden(value) {
            this.toggleAttribute('hidden', !!value);
        }
        get innerText() {
            return toStr(this.textContent);
        }
        set innerText(value) {
            this.textContent = value;
        }
    }

    const numericAttribute = (name) => ({
        get() {
            const value = parseInt(toStr(this.getAttribute(name)), 10);
            return Number.isNaN(value) ? 0 : value;
        },
        set(value) {
            this.setAttribute(name, String(Math.max(0, Math.trunc(Number(value) || 0))));
        },
        configurable: true,
    });

    class HTMLImageElement extends HTMLElement {
        get src() {
            return toStr(this.getAttribute('src'));
        }
        set src(value) {
            this.setAttribute('src', value);
        }
        get alt() {
            return toStr(this.getAttribute('alt'));
        }
        set alt(value) {
            this.setAttribute('alt', value);
        }
        get complete() {
            return true;
        }
    }
    Object.defineProperty(HTMLImageElement.prototype, 'width', numericAttribute('width'));
    Object.defineProperty(HTMLImageElement.prototype, 'height', numericAttribute('height'));

    class DocumentFragment extends Node {}
    mixin(DocumentFragment.prototype, parentNodeMixin);

    let readyState = 'loading';

    class Document extends Node {
        get documentElement() {
            return wrap(nullable(__bridge_dom_element_children(this[HANDLE])[0]));
        }
        get head() {
            return this.querySelector('head');
        }
        get body() {
            return this.querySelector('body');
        }
        get title() {
            const title = this.querySelector('title');
            return title ? toStr(title.textContent).trim() : '';
        }
        set title(value) {
            let title = this.querySelector('title');
            if (!title) {
                const head = this.head;
                if (!head) {
                    return;
                }
                title = head.appendChild(this.createElement('title'));
            }
            title.textContent = value;
        }
        get readyState() {
            return readyState;
        }
        get cookie() {
            return '';
        }
        set cookie(value) {}
        getElementById(id) {
            return wrap(nullable(__bridge_dom_by_id(String(id))));
        }
        createElement(tag) {
            return wrap(__bridge_dom_create_element(String(tag)));
        }
        createElementNS(namespace, tag) {
            return this.createElement(tag);
        }
        createTextNode(data) {
            return wrap(__bridge_dom_create_text(toStr(data)));
        }
        createComment(data) {
            return wrap(__bridge_dom_create_comment(toStr(data)));
        }
        createDocumentFragment() {
            return wrap(__bridge_dom_create_fragment());
        }
        createEvent() {
            return new Event('');
        }
        close() {
            if (readyState === 'complete') {
                return;
            }
            readyState = 'complete';
            this.dispatchEvent(new Event('DOMContentLoaded', { bubbles: true }));
            this.dispatchEvent(new Event('load'));
        }
    }
    mixin(Document.prototype, parentNodeMixin);

    const impl = {
        EventTarget,
        Node,
        CharacterData,
        Text,
        Comment,
        Element,
        HTMLElement,
        HTMLImageElement,
        DocumentFragment,
        Document,
        Event,
        CustomEvent,
        wrap,
        handleOf,
    };
    impl.document = wrap(__bridge_dom_document());
    global.__bridge_impl = impl;
})();
"#;
