mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::session;
use dombridge::MutationKind;

#[test]
fn demo_page_loads_items_and_reports_mutations() {
    let html = std::fs::read_to_string("assets/demo.html").expect("demo asset");
    let script = std::fs::read_to_string("assets/demo.js").expect("demo script");
    let items = std::fs::read_to_string("assets/items.json").expect("demo data");

    let (session, host) = session(&html);
    *host.style_value.borrow_mut() = "1280px".to_string();
    assert_eq!(session.external_sources(), vec!["demo.js".to_string()]);

    let downloads = HashMap::from([("demo.js".to_string(), script)]);
    let summary = session.run_scripts(&downloads).expect("first run");
    assert_eq!(summary.executed_scripts, 1);

    session.close_document().unwrap();
    let html = session.document_html();
    assert!(html.contains("Hello from QuickJS!"));
    assert!(html.contains("data-width=\"1280px\""));
    assert!(host.requests.borrow().is_empty());

    session.advance(Duration::from_millis(10)).unwrap();
    assert_eq!(host.requests.borrow().len(), 1);
    assert_eq!(
        host.requests.borrow()[0].uri,
        "https://example.com/app/items.json"
    );

    host.take_mutations();
    host.completion(0).complete(items);

    let html = session.document_html();
    assert!(html.contains("<li>alpha</li><li>beta</li><li>gamma</li>"));
    assert_eq!(session.local_storage().get("loaded").map(String::as_str), Some("3"));

    let mutations = host.take_mutations();
    let list = "HTML > :nth-child(2) > :nth-child(2)".to_string();
    assert_eq!(mutations.len(), 4);
    assert!(mutations
        .iter()
        .all(|(kind, locator)| *kind == MutationKind::ChildList && *locator == list));

    assert!(session.trigger_click("#refresh").unwrap());
    assert_eq!(host.requests.borrow().len(), 2);
}
