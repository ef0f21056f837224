use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use dombridge::{BridgeConfig, Completion, Host, HostRequest, MutationKind, Session, StyleQuery};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const USAGE: &str =
    "usage: dombridge <page.html> [base-url] [--config <file>] [--advance <ms>] [--dump]";

struct Options {
    page: PathBuf,
    base_url: Option<String>,
    config: Option<PathBuf>,
    advance_ms: u64,
    dump: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut page = None;
    let mut base_url = None;
    let mut config = std::env::var("DOMBRIDGE_CONFIG").ok().map(PathBuf::from);
    let mut advance_ms = 0;
    let mut dump = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump" => dump = true,
            "--config" => {
                config = Some(PathBuf::from(args.next().context("--config needs a path")?));
            }
            "--advance" => {
                let value = args.next().context("--advance needs milliseconds")?;
                advance_ms = value
                    .parse()
                    .with_context(|| format!("invalid --advance value `{value}`"))?;
            }
            flag if flag.starts_with("--") => bail!("unknown flag `{flag}`\n{USAGE}"),
            _ if page.is_none() => page = Some(PathBuf::from(arg)),
            _ if base_url.is_none() => base_url = Some(arg),
            _ => bail!("unexpected argument `{arg}`\n{USAGE}"),
        }
    }

    Ok(Options {
        page: page.ok_or_else(|| anyhow!(USAGE))?,
        base_url,
        config,
        advance_ms,
        dump,
    })
}

/// Serves requests from files next to the page and prints every callback as
/// a JSON line.
struct FileHost {
    root: PathBuf,
}

impl FileHost {
    fn read(&self, uri: &str) -> Result<String> {
        let path = local_path(&self.root, uri)?;
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    }
}

fn local_path(root: &Path, uri: &str) -> Result<PathBuf> {
    match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|()| anyhow!("not a local path: {uri}")),
        Ok(url) => Ok(root.join(url.path().trim_start_matches('/'))),
        Err(_) => Ok(root.join(uri.trim_start_matches('/'))),
    }
}

impl Host for FileHost {
    fn request(&self, request: HostRequest, completion: Completion) {
        println!("{}", json!({ "request": request }));
        match self.read(&request.uri) {
            Ok(body) => completion.complete(body),
            Err(err) => completion.fail(&format!("{err:#}")),
        }
    }

    fn resolve_style(&self, query: &StyleQuery) -> String {
        println!("{}", json!({ "style": query }));
        String::new()
    }

    fn on_mutation(&self, kind: MutationKind, locator: &str) {
        println!("{}", json!({ "mutation": kind, "locator": locator }));
    }
}

fn main() -> Result<()> {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let options = parse_args(std::env::args().skip(1))?;
    let config = BridgeConfig::load(options.config.clone()).unwrap_or_else(|err| {
        eprintln!("Failed to load bridge configuration: {err}. Using defaults.");
        BridgeConfig::default()
    });

    let page = fs::canonicalize(&options.page)
        .with_context(|| format!("failed to open {}", options.page.display()))?;
    let markup = fs::read_to_string(&page)?;
    let root = page
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let base_url = match options.base_url {
        Some(base_url) => base_url,
        None => Url::from_file_path(&page)
            .map_err(|()| anyhow!("cannot build a file URL for {}", page.display()))?
            .to_string(),
    };

    let host = Rc::new(FileHost { root: root.clone() });
    let session = Session::new(&markup, &base_url, host.clone(), config)?;

    let mut downloads = HashMap::new();
    for src in session.external_sources() {
        let resolved = session
            .base_url()
            .join(&src)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| src.clone());
        match host.read(&resolved) {
            Ok(code) => {
                downloads.insert(src, code);
            }
            Err(err) => warn!(%src, error = %format!("{err:#}"), "script download failed"),
        }
    }

    if let Some(summary) = session.run_scripts(&downloads) {
        info!(
            executed = summary.executed_scripts,
            failed = summary.failed_scripts,
            skipped = summary.skipped_scripts,
            "scripts finished"
        );
    }
    session.close_document()?;
    session.advance(Duration::from_millis(options.advance_ms))?;

    if options.dump {
        println!("{}", session.document_html());
    }
    Ok(())
}
