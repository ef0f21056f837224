//! Native functions the script-side bootstrap calls into.
//!
//! Nodes cross the boundary as numeric handles. Every binding that fails
//! throws a `DOMException`-style error into the calling script.

use std::rc::{Rc, Weak};

use rquickjs::function::IntoJsFunc;
use rquickjs::{Ctx, Exception, Function, Object};
use tracing::{error, info};

use super::runtime::QuickJsEngine;
use crate::dom::{DomError, NodeHandle};
use crate::error::Result;
use crate::host::Completion;
use crate::session::{BridgeState, SessionInner};
use crate::style;
use crate::xhr::XhrError;

pub(crate) fn install(
    engine: &QuickJsEngine,
    state: Rc<BridgeState>,
    session: Weak<SessionInner>,
) -> Result<()> {
    engine.with_context(|ctx| {
        let global = ctx.globals();
        install_dom_bindings(&ctx, &global, &state)?;
        install_storage_bindings(&ctx, &global, &state)?;
        install_network_bindings(&ctx, &global, &state, &session)?;
        install_style_bindings(&ctx, &global, &state)?;
        install_timer_bindings(&ctx, &global, &state)?;
        install_encoding_bindings(&ctx, &global)?;
        Ok(())
    })
}

fn register<'js, F, P>(
    ctx: &Ctx<'js>,
    global: &Object<'js>,
    name: &str,
    func: F,
) -> rquickjs::Result<()>
where
    F: IntoJsFunc<'js, P> + 'js,
{
    let function = Function::new(ctx.clone(), func)?.with_name(name)?;
    global.set(name, function)
}

fn raw(handles: Vec<NodeHandle>) -> Vec<u32> {
    handles.into_iter().map(|handle| handle.0).collect()
}

fn install_dom_bindings<'js>(
    ctx: &Ctx<'js>,
    global: &Object<'js>,
    state: &Rc<BridgeState>,
) -> rquickjs::Result<()> {
    // Tree reads
    {
        let state = Rc::clone(state);
        register(ctx, global, "__bridge_dom_document", move || -> rquickjs::Result<u32> {
            Ok(state.document.borrow().document_handle().0)
        })?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_node_type",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<u32> {
                let result = state.document.borrow().node_type(NodeHandle(handle));
                dom_result(&ctx, result.map(u32::from))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_node_name",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<String> {
                let result = state.document.borrow().node_name(NodeHandle(handle));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_parent",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<Option<u32>> {
                let result = state.document.borrow_mut().parent(NodeHandle(handle));
                dom_result(&ctx, result.map(|parent| parent.map(|p| p.0)))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_children",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<Vec<u32>> {
                let result = state.document.borrow_mut().child_nodes(NodeHandle(handle));
                dom_result(&ctx, result.map(raw))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_element_children",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<Vec<u32>> {
                let result = state
                    .document
                    .borrow_mut()
                    .element_children(NodeHandle(handle));
                dom_result(&ctx, result.map(raw))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_contains",
            move |ctx: Ctx<'_>, ancestor: u32, node: u32| -> rquickjs::Result<bool> {
                let result = state
                    .document
                    .borrow()
                    .contains(NodeHandle(ancestor), NodeHandle(node));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_by_id",
            move |id: String| -> rquickjs::Result<Option<u32>> {
                Ok(state.document.borrow_mut().element_by_id(&id).map(|h| h.0))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_query_all",
            move |ctx: Ctx<'_>, scope: u32, selectors: String| -> rquickjs::Result<Vec<u32>> {
                let result = state
                    .document
                    .borrow_mut()
                    .query_selector_all(NodeHandle(scope), &selectors);
                dom_result(&ctx, result.map(raw))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_matches",
            move |ctx: Ctx<'_>, handle: u32, selectors: String| -> rquickjs::Result<bool> {
                let result = state
                    .document
                    .borrow()
                    .matches(NodeHandle(handle), &selectors);
                dom_result(&ctx, result)
            },
        )?;
    }

    // Content reads
    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_get_attribute",
            move |ctx: Ctx<'_>, handle: u32, name: String| -> rquickjs::Result<Option<String>> {
                let result = state.document.borrow().attribute(NodeHandle(handle), &name);
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_attribute_names",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<Vec<String>> {
                let result = state.document.borrow().attribute_names(NodeHandle(handle));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_get_text",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<Option<String>> {
                let result = state.document.borrow().text_content(NodeHandle(handle));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_node_value",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<Option<String>> {
                let result = state.document.borrow().node_value(NodeHandle(handle));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_inner_html",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<String> {
                let result = state.document.borrow().inner_html(NodeHandle(handle));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_outer_html",
            move |ctx: Ctx<'_>, handle: u32| -> rquickjs::Result<String> {
                let result = state.document.borrow().outer_html(NodeHandle(handle));
                dom_result(&ctx, result)
            },
        )?;
    }

    // Node creation
    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_create_element",
            move |tag: String| -> rquickjs::Result<u32> {
                Ok(state.document.borrow_mut().create_element(&tag).0)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_create_text",
            move |data: String| -> rquickjs::Result<u32> {
                Ok(state.document.borrow_mut().create_text(&data).0)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_create_comment",
            move |data: String| -> rquickjs::Result<u32> {
                Ok(state.document.borrow_mut().create_comment(&data).0)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(ctx, global, "__bridge_dom_create_fragment", move || -> rquickjs::Result<u32> {
            Ok(state.document.borrow_mut().create_fragment().0)
        })?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_new_image",
            move |width: Option<f64>, height: Option<f64>| -> rquickjs::Result<u32> {
                let dimension = |value: Option<f64>| {
                    value
                        .filter(|v| v.is_finite() && *v >= 0.0)
                        .map(|v| v as u32)
                };
                Ok(state
                    .document
                    .borrow_mut()
                    .create_image(dimension(width), dimension(height))
                    .0)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_clone",
            move |ctx: Ctx<'_>, handle: u32, deep: bool| -> rquickjs::Result<u32> {
                let result = state
                    .document
                    .borrow_mut()
                    .clone_node(NodeHandle(handle), deep);
                dom_result(&ctx, result.map(|h| h.0))
            },
        )?;
    }

    // Mutations
    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_set_attribute",
            move |ctx: Ctx<'_>, handle: u32, name: String, value: String| -> rquickjs::Result<()> {
                let result =
                    state.mutate(|doc| doc.set_attribute(NodeHandle(handle), &name, &value));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_remove_attribute",
            move |ctx: Ctx<'_>, handle: u32, name: String| -> rquickjs::Result<()> {
                let result = state.mutate(|doc| doc.remove_attribute(NodeHandle(handle), &name));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_set_text",
            move |ctx: Ctx<'_>, handle: u32, value: Option<String>| -> rquickjs::Result<()> {
                let text = value.unwrap_or_default();
                let result = state.mutate(|doc| doc.set_text_content(NodeHandle(handle), &text));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_set_node_value",
            move |ctx: Ctx<'_>, handle: u32, value: Option<String>| -> rquickjs::Result<()> {
                let text = value.unwrap_or_default();
                let result = state.mutate(|doc| doc.set_node_value(NodeHandle(handle), &text));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_set_inner_html",
            move |ctx: Ctx<'_>, handle: u32, html: Option<String>| -> rquickjs::Result<()> {
                let html = html.unwrap_or_default();
                let result = state.mutate(|doc| doc.set_inner_html(NodeHandle(handle), &html));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_append",
            move |ctx: Ctx<'_>, parent: u32, child: u32| -> rquickjs::Result<()> {
                let result =
                    state.mutate(|doc| doc.append_child(NodeHandle(parent), NodeHandle(child)));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_insert_before",
            move |ctx: Ctx<'_>,
                  parent: u32,
                  child: u32,
                  reference: Option<u32>|
                  -> rquickjs::Result<()> {
                let result = state.mutate(|doc| {
                    doc.insert_before(
                        NodeHandle(parent),
                        NodeHandle(child),
                        reference.map(NodeHandle),
                    )
                });
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_remove",
            move |ctx: Ctx<'_>, parent: u32, child: u32| -> rquickjs::Result<()> {
                let result =
                    state.mutate(|doc| doc.remove_child(NodeHandle(parent), NodeHandle(child)));
                dom_result(&ctx, result)
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_dom_replace",
            move |ctx: Ctx<'_>, parent: u32, new_child: u32, old_child: u32| -> rquickjs::Result<()> {
                let result = state.mutate(|doc| {
                    doc.replace_child(
                        NodeHandle(parent),
                        NodeHandle(new_child),
                        NodeHandle(old_child),
                    )
                });
                dom_result(&ctx, result)
            },
        )?;
    }

    Ok(())
}

fn install_storage_bindings<'js>(
    ctx: &Ctx<'js>,
    global: &Object<'js>,
    state: &Rc<BridgeState>,
) -> rquickjs::Result<()> {
    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_storage_get",
            move |key: String| -> rquickjs::Result<Option<String>> {
                Ok(state.storage.borrow().get_item(&key).map(str::to_string))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_storage_set",
            move |key: String, value: String| -> rquickjs::Result<()> {
                state.storage.borrow_mut().set_item(&key, &value);
                Ok(())
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_storage_remove",
            move |key: String| -> rquickjs::Result<()> {
                state.storage.borrow_mut().remove_item(&key);
                Ok(())
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(ctx, global, "__bridge_storage_clear", move || -> rquickjs::Result<()> {
            state.storage.borrow_mut().clear();
            Ok(())
        })?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_storage_key",
            move |index: u32| -> rquickjs::Result<Option<String>> {
                Ok(state
                    .storage
                    .borrow()
                    .key(index as usize)
                    .map(str::to_string))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(ctx, global, "__bridge_storage_length", move || -> rquickjs::Result<u32> {
            Ok(state.storage.borrow().len() as u32)
        })?;
    }

    Ok(())
}

fn install_network_bindings<'js>(
    ctx: &Ctx<'js>,
    global: &Object<'js>,
    state: &Rc<BridgeState>,
    session: &Weak<SessionInner>,
) -> rquickjs::Result<()> {
    {
        let state = Rc::clone(state);
        register(ctx, global, "__bridge_xhr_create", move || -> rquickjs::Result<u32> {
            Ok(state.requests.borrow_mut().create())
        })?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_xhr_open",
            move |ctx: Ctx<'_>, id: u32, method: String, uri: String| -> rquickjs::Result<u32> {
                let resolved = state
                    .base_url
                    .join(&uri)
                    .map(|url| url.to_string())
                    .unwrap_or(uri);
                let result = state.requests.borrow_mut().open(id, &method, &resolved);
                match result {
                    Ok(ready_state) => Ok(u32::from(ready_state.code())),
                    Err(err) => xhr_error(&ctx, err),
                }
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_xhr_set_header",
            move |ctx: Ctx<'_>, id: u32, name: String, value: String| -> rquickjs::Result<()> {
                let result = state.requests.borrow_mut().set_header(id, &name, &value);
                match result {
                    Ok(()) => Ok(()),
                    Err(err) => xhr_error(&ctx, err),
                }
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        let session = session.clone();
        register(
            ctx,
            global,
            "__bridge_xhr_send",
            move |ctx: Ctx<'_>, id: u32, body: Option<String>| -> rquickjs::Result<()> {
                let result = state.requests.borrow_mut().send(id, body);
                let request = match result {
                    Ok(request) => request,
                    Err(err) => return xhr_error(&ctx, err),
                };
                info!(
                    target: "xhr",
                    id,
                    method = %request.method,
                    uri = %request.uri,
                    "request handed to host"
                );
                state
                    .host
                    .request(request, Completion::new(id, session.clone()));
                Ok(())
            },
        )?;
    }

    Ok(())
}

fn install_style_bindings<'js>(
    ctx: &Ctx<'js>,
    global: &Object<'js>,
    state: &Rc<BridgeState>,
) -> rquickjs::Result<()> {
    let state = Rc::clone(state);
    register(
        ctx,
        global,
        "__bridge_style",
        move |element: Option<u32>,
              pseudo_element: Option<String>,
              property: String,
              extra: Option<String>|
              -> rquickjs::Result<String> {
            let query = style::build_query(
                &state.document.borrow(),
                element.map(NodeHandle),
                pseudo_element,
                property,
                extra,
            );
            Ok(style::resolve(state.host.as_ref(), &query))
        },
    )
}

fn install_timer_bindings<'js>(
    ctx: &Ctx<'js>,
    global: &Object<'js>,
    state: &Rc<BridgeState>,
) -> rquickjs::Result<()> {
    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_timer_set",
            move |delay_ms: f64, repeating: bool| -> rquickjs::Result<u32> {
                Ok(state.timers.borrow_mut().register(delay_ms, repeating))
            },
        )?;
    }

    {
        let state = Rc::clone(state);
        register(
            ctx,
            global,
            "__bridge_timer_clear",
            move |id: u32| -> rquickjs::Result<()> {
                state.timers.borrow_mut().clear(id);
                Ok(())
            },
        )?;
    }

    Ok(())
}

fn install_encoding_bindings<'js>(ctx: &Ctx<'js>, global: &Object<'js>) -> rquickjs::Result<()> {
    register(
        ctx,
        global,
        "__bridge_utf8_encode",
        |input: String| -> rquickjs::Result<Vec<u32>> {
            Ok(input.bytes().map(u32::from).collect())
        },
    )?;
    register(
        ctx,
        global,
        "__bridge_utf8_decode",
        |bytes: Vec<u32>| -> rquickjs::Result<String> {
            let bytes: Vec<u8> = bytes.into_iter().map(|b| b as u8).collect();
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        },
    )
}

fn dom_result<T>(ctx: &Ctx<'_>, result: std::result::Result<T, DomError>) -> rquickjs::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => dom_error(ctx, err),
    }
}

fn dom_error<T>(ctx: &Ctx<'_>, err: DomError) -> rquickjs::Result<T> {
    error!(target: "quickjs", "DOM operation failed: {err}");
    let name = match err {
        DomError::UnknownHandle(_) | DomError::NotAChild { .. } => "NotFoundError",
        DomError::Hierarchy { .. } => "HierarchyRequestError",
        DomError::InvalidSelector(_) => "SyntaxError",
        DomError::NotSupported(_) => "NotSupportedError",
        DomError::HandlerAlreadyInstalled => "InvalidStateError",
    };
    throw_dom_exception(ctx, name, &err.to_string())
}

fn xhr_error<T>(ctx: &Ctx<'_>, err: XhrError) -> rquickjs::Result<T> {
    error!(target: "xhr", "request operation failed: {err}");
    throw_dom_exception(ctx, "InvalidStateError", &err.to_string())
}

fn throw_dom_exception<T>(ctx: &Ctx<'_>, name: &str, message: &str) -> rquickjs::Result<T> {
    let exception = Exception::from_message(ctx.clone(), message)?;
    exception.as_object().set("name", name)?;
    Err(exception.throw())
}
