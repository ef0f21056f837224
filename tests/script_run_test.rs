mod common;

use std::collections::HashMap;

use common::session;
use dombridge::BridgeError;

const PAGE: &str = r#"<html><head>
<script>var order = ['a'];</script>
<script src="/static/app.js" defer></script>
<script src="https://www.googletagmanager.com/gtm.js?id=GTM-1"></script>
<script>order.push('c');</script>
<script type="module">order.push('module');</script>
<script type="application/ld+json">{"@type": "Thing"}</script>
</head><body></body></html>"#;

#[test]
fn classic_scripts_run_in_document_order() {
    let (session, _host) = session(PAGE);
    assert_eq!(session.external_sources(), vec!["/static/app.js".to_string()]);

    let downloads = HashMap::from([(
        "/static/app.js".to_string(),
        "order.push('b');".to_string(),
    )]);
    let summary = session.run_scripts(&downloads).expect("first run");
    assert_eq!(summary.executed_scripts, 3);
    assert_eq!(summary.failed_scripts, 0);
    assert_eq!(summary.skipped_scripts, 3);

    let order: String = session.eval_with("order.join(',')", "order.js").unwrap();
    assert_eq!(order, "a,b,c");

    assert!(session.run_scripts(&downloads).is_none());
}

#[test]
fn missing_download_is_skipped() {
    let (session, _host) = session(PAGE);
    let summary = session.run_scripts(&HashMap::new()).expect("first run");
    assert_eq!(summary.executed_scripts, 2);
    assert_eq!(summary.skipped_scripts, 4);
}

#[test]
fn failing_script_does_not_stop_later_ones() {
    let page = r#"<html><head>
        <script>var ran = [];</script>
        <script>throw new Error('boom');</script>
        <script>ran.push('after');</script>
        </head><body></body></html>"#;
    let (session, _host) = session(page);
    let summary = session.run_scripts(&HashMap::new()).expect("first run");
    assert_eq!(summary.executed_scripts, 2);
    assert_eq!(summary.failed_scripts, 1);

    let ran: String = session.eval_with("ran.join(',')", "ran.js").unwrap();
    assert_eq!(ran, "after");
}

#[test]
fn legacy_comment_wrapped_script_runs() {
    let page = "<html><head><script><!--\nvar legacy = 42;\n//--></script></head><body></body></html>";
    let (session, _host) = session(page);
    let summary = session.run_scripts(&HashMap::new()).expect("first run");
    assert_eq!(summary.executed_scripts, 1);
    let legacy: u32 = session.eval_with("legacy", "legacy.js").unwrap();
    assert_eq!(legacy, 42);
}

#[test]
fn script_errors_name_the_file() {
    let (session, _host) = session("<html><body></body></html>");
    let err = session
        .exec("let x = 1;\nundefinedFunction();", "broken.js")
        .unwrap_err();
    match err {
        BridgeError::Script { filename, message } => {
            assert_eq!(filename, "broken.js");
            assert!(message.contains("undefinedFunction"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn console_output_does_not_disturb_scripts() {
    let (session, _host) = session("<html><body></body></html>");
    let done: bool = session
        .eval_with(
            "console.log('hello', { a: 1 }); console.error('bad'); console.warn('careful'); true",
            "console.js",
        )
        .unwrap();
    assert!(done);
}
