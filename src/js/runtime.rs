use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rquickjs::function::IntoArgs;
use rquickjs::{Context, Ctx, Error as JsError, FromJs, Function, Object, Runtime, Value};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// JavaScript runtime backed by QuickJS.
///
/// The engine owns the QuickJS runtime and context and provides helpers for evaluating
/// scripts. Every entry into script arms a wall-clock deadline enforced by the QuickJS
/// interrupt handler, and `console` is forwarded to `tracing`.
pub struct QuickJsEngine {
    runtime: Runtime,
    context: Context,
    deadline: Rc<Cell<Option<Instant>>>,
    script_timeout: Option<Duration>,
    max_jobs: usize,
}

impl QuickJsEngine {
    pub fn new() -> Result<Self> {
        Self::with_config(&BridgeConfig::default())
    }

    pub fn with_config(config: &BridgeConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        if config.memory_limit_bytes > 0 {
            runtime.set_memory_limit(config.memory_limit_bytes);
        }

        let deadline = Rc::new(Cell::new(None::<Instant>));
        let watched = Rc::clone(&deadline);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            watched
                .get()
                .map(|limit| Instant::now() >= limit)
                .unwrap_or(false)
        })));

        let context = Context::full(&runtime)?;
        let engine = Self {
            runtime,
            context,
            deadline,
            script_timeout: config.script_timeout(),
            max_jobs: config.max_pending_jobs.max(1),
        };
        engine.init_console()?;
        Ok(engine)
    }

    /// Evaluate a script and discard the result.
    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.eval_with::<()>(source, filename)
    }

    /// Evaluate a script and convert the completion value into `V`.
    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> FromJs<'js>,
    {
        let script = Self::with_source_url(source, filename);
        let result = self.guarded(|| {
            self.context.with(|ctx| match ctx.eval::<V, _>(script) {
                Ok(value) => Ok(value),
                Err(JsError::Exception) => Err(script_error(&ctx, filename, Some(source))),
                Err(err) => Err(BridgeError::from(err)),
            })
        });

        // Promise continuations queued by the script run before control returns.
        self.drain_jobs();
        result
    }

    /// Call `__bridge[name](...args)`, the hooks installed by the environment bootstrap.
    pub fn call_hook<A, R>(&self, name: &str, args: A) -> Result<R>
    where
        A: for<'js> IntoArgs<'js>,
        R: for<'js> FromJs<'js>,
    {
        let label = format!("__bridge.{name}");
        let result = self.with_context_named(&label, |ctx| {
            let hooks: Object = ctx.globals().get("__bridge")?;
            let hook: Function = hooks.get(name)?;
            hook.call(args)
        });
        self.drain_jobs();
        result
    }

    /// Execute pending promise jobs. Returns `true` when at least one ran.
    pub fn drain_jobs(&self) -> bool {
        let mut job_count = 0;
        self.guarded(|| {
            while self.runtime.is_job_pending() {
                match self.runtime.execute_pending_job() {
                    Ok(true) => job_count += 1,
                    Ok(false) => break,
                    Err(job_exception) => {
                        job_count += 1;
                        let (message, _) = job_exception.0.with(|ctx| capture_exception(&ctx));
                        tracing::error!(target: "quickjs", "job execution error: {message}");
                    }
                }
                if job_count >= self.max_jobs {
                    tracing::warn!(
                        target: "quickjs",
                        "stopped processing jobs after {} iterations",
                        self.max_jobs
                    );
                    break;
                }
            }
        });

        if job_count > 0 {
            tracing::debug!(target: "quickjs", "executed {} pending jobs", job_count);
        }
        job_count > 0
    }

    /// Provide access to the underlying QuickJS context for advanced integrations.
    pub fn with_context<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        self.with_context_named("<bridge>", f)
    }

    fn with_context_named<T, F>(&self, label: &str, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        self.guarded(|| {
            self.context.with(|ctx| {
                f(ctx.clone()).map_err(|err| match err {
                    JsError::Exception => script_error(&ctx, label, None),
                    other => BridgeError::from(other),
                })
            })
        })
    }

    /// Arm the script deadline unless an outer call already did.
    fn guarded<T>(&self, f: impl FnOnce() -> T) -> T {
        let armed = self.deadline.get().is_none();
        if armed {
            self.deadline
                .set(self.script_timeout.map(|timeout| Instant::now() + timeout));
        }
        let result = f();
        if armed {
            self.deadline.set(None);
        }
        result
    }

    fn init_console(&self) -> Result<()> {
        self.context
            .with(|ctx| {
                let global = ctx.globals();
                let log_fn = Function::new(ctx.clone(), log_from_js)?.with_name("__bridge_log")?;
                global.set("__bridge_log", log_fn)?;
                ctx.eval::<(), _>(CONSOLE_BOOTSTRAP.as_bytes())
            })
            .map_err(BridgeError::from)
    }

    fn with_source_url(source: &str, filename: &str) -> Vec<u8> {
        let mut script = String::with_capacity(source.len() + filename.len() + 32);
        script.push_str(source);
        if !source.ends_with('\n') {
            script.push('\n');
        }
        script.push_str("//# sourceURL=");
        script.push_str(filename);
        script.push('\n');
        script.into_bytes()
    }
}

fn log_from_js(level: String, message: String) -> rquickjs::Result<()> {
    match level.as_str() {
        "error" => tracing::error!(target: "quickjs", "{message}"),
        "warn" => tracing::warn!(target: "quickjs", "{message}"),
        "debug" | "trace" => tracing::debug!(target: "quickjs", "{message}"),
        _ => tracing::info!(target: "quickjs", "{message}"),
    }
    Ok(())
}

fn script_error(ctx: &Ctx<'_>, filename: &str, source: Option<&str>) -> BridgeError {
    let (mut message, stack) = capture_exception(ctx);
    let excerpt = stack
        .as_deref()
        .and_then(stack_line)
        .zip(source)
        .and_then(|(line, source)| excerpt(source, line));
    if let Some(excerpt) = excerpt {
        tracing::error!(target: "quickjs", filename, "script failed near:\n{excerpt}");
        message.push('\n');
        message.push_str(&excerpt);
    }
    BridgeError::Script {
        filename: filename.to_string(),
        message,
    }
}

/// Message and stack of the pending exception.
fn capture_exception(ctx: &Ctx<'_>) -> (String, Option<String>) {
    let exception: Value = ctx.catch();

    if let Some(obj) = exception.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            let name = obj
                .get::<_, String>("name")
                .unwrap_or_else(|_| "Error".to_string());
            let stack = obj
                .get::<_, String>("stack")
                .ok()
                .filter(|stack| !stack.trim().is_empty());
            let text = match &stack {
                Some(stack) => format!("{name}: {message}\nStack: {stack}"),
                None => format!("{name}: {message}"),
            };
            return (text, stack);
        }
    }

    if let Some(text) = exception.as_string().and_then(|s| s.to_string().ok()) {
        return (text, None);
    }
    (format!("{:?}", exception), None)
}

/// Line number of the innermost frame that carries one.
fn stack_line(stack: &str) -> Option<usize> {
    stack.lines().find_map(|frame| {
        let location = frame.rsplit_once('(')?.1.trim_end().trim_end_matches(')');
        let mut parts = location.rsplit(':');
        let last: usize = parts.next()?.parse().ok()?;
        match parts.next().and_then(|part| part.parse::<usize>().ok()) {
            Some(line) => Some(line),
            None => Some(last),
        }
    })
}

fn excerpt(source: &str, line: usize) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }
    let first = line.saturating_sub(2).max(1);
    let last = (line + 1).min(lines.len());
    let mut out = String::new();
    for number in first..=last {
        let marker = if number == line { '>' } else { ' ' };
        out.push_str(&format!("{marker}{number:>5} | {}\n", lines[number - 1]));
    }
    Some(out.trim_end().to_string())
}

const CONSOLE_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const stringify = (value) => {
        try {
            if (typeof value === 'string') {
                return value;
            }
            if (value === undefined) {
                return 'undefined';
            }
            if (value === null) {
                return 'null';
            }
            if (value instanceof Error) {
                return `${value.name}: ${value.message}`;
            }
            if (typeof value === 'object') {
                try {
                    return JSON.stringify(value);
                } catch (err) {
                    return String(value);
                }
            }
            return String(value);
        } catch (err) {
            return '[unprintable]';
        }
    };

    const logAt = (level) => (...args) => {
        try {
            global.__bridge_log(level, args.map(stringify).join(' '));
        } catch (err) {
            // console must never throw
        }
    };

    if (typeof global.console !== 'object' || global.console === null) {
        global.console = {};
    }

    global.console.log = logAt('info');
    global.console.info = logAt('info');
    global.console.error = logAt('error');
    global.console.warn = logAt('warn');
    global.console.debug = logAt('debug');
    global.console.trace = logAt('trace');
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_line_in_quickjs_frames() {
        assert_eq!(stack_line("    at <eval> (eval_script:3:9)\n"), Some(3));
        assert_eq!(stack_line("    at foo (native)\n    at <eval> (eval_script:7)\n"), Some(7));
        assert_eq!(stack_line("no frames"), None);
    }

    #[test]
    fn excerpt_marks_offending_line() {
        let source = "a();\nb();\nc();\nd();";
        let text = excerpt(source, 3).unwrap();
        assert!(text.contains(">    3 | c();"));
        assert!(text.contains("     2 | b();"));
        assert!(text.contains("     4 | d();"));
        assert!(!text.contains("a();"));
        assert!(excerpt(source, 9).is_none());
    }
}
