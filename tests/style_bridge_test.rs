mod common;

use common::session;
use serde_json::json;

const PAGE: &str = "<html><head></head><body><section><h1 id=\"title\">Hi</h1></section></body></html>";
const TITLE: &str = "HTML > :nth-child(2) > :nth-child(1) > :nth-child(1)";

#[test]
fn every_lookup_reaches_the_host() {
    let (session, host) = session(PAGE);
    *host.style_value.borrow_mut() = "rgb(255, 0, 0)".to_string();

    let value: String = session
        .eval_with(
            r#"
            const style = getComputedStyle(document.getElementById('title'));
            style.getPropertyValue('color');
            style.getPropertyValue('color');
            "#,
            "style.js",
        )
        .unwrap();
    assert_eq!(value, "rgb(255, 0, 0)");

    let styles = host.styles.borrow();
    assert_eq!(styles.len(), 2);
    for query in styles.iter() {
        assert_eq!(query.locator.as_deref(), Some(TITLE));
        assert_eq!(query.property, "color");
        assert_eq!(query.pseudo_element, None);
        assert_eq!(query.extra, None);
    }
}

#[test]
fn camel_case_properties_are_converted() {
    let (session, host) = session(PAGE);
    session
        .exec(
            "getComputedStyle(document.getElementById('title')).backgroundColor;",
            "camel.js",
        )
        .unwrap();
    assert_eq!(host.styles.borrow()[0].property, "background-color");
}

#[test]
fn pseudo_element_and_extra_are_forwarded() {
    let (session, host) = session(PAGE);
    session
        .exec(
            r#"
            getComputedStyle(document.getElementById('title'), '::before')
                .getPropertyValue('content', { resolve: true });
            "#,
            "pseudo.js",
        )
        .unwrap();

    let query = host.styles.borrow()[0].clone();
    assert_eq!(query.pseudo_element.as_deref(), Some("::before"));
    assert_eq!(query.property, "content");
    assert_eq!(query.extra, Some(json!({ "resolve": true })));
}

#[test]
fn detached_element_is_located_from_its_own_root() {
    let (session, host) = session(PAGE);
    session
        .exec(
            r#"
            const wrapper = document.createElement('div');
            wrapper.appendChild(document.createElement('span'));
            getComputedStyle(wrapper.firstChild).getPropertyValue('display');
            "#,
            "detached.js",
        )
        .unwrap();
    assert_eq!(
        host.styles.borrow()[0].locator.as_deref(),
        Some("DIV > :nth-child(1)")
    );
}
