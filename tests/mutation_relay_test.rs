mod common;

use common::session;
use dombridge::MutationKind;

const PAGE: &str =
    "<!DOCTYPE html><html><head></head><body><div id=\"box\">text</div></body></html>";

#[test]
fn attribute_change_is_relayed_once() {
    let (session, host) = session(PAGE);
    session
        .exec(
            "document.getElementById('box').setAttribute('data-state', 'ready');",
            "attr.js",
        )
        .expect("script runs");

    assert_eq!(
        host.take_mutations(),
        vec![(
            MutationKind::Attribute,
            "HTML > :nth-child(2) > :nth-child(1)".to_string()
        )]
    );
}

#[test]
fn append_then_remove_reports_two_child_list_events_in_order() {
    let (session, host) = session(PAGE);
    session
        .exec(
            r#"
            const p = document.createElement('p');
            document.body.appendChild(p);
            document.body.removeChild(p);
            "#,
            "children.js",
        )
        .expect("script runs");

    assert_eq!(
        host.take_mutations(),
        vec![
            (MutationKind::ChildList, "HTML > :nth-child(2)".to_string()),
            (MutationKind::ChildList, "HTML > :nth-child(2)".to_string()),
        ]
    );
}

#[test]
fn detached_subtrees_are_silent() {
    let (session, host) = session(PAGE);
    session
        .exec(
            r#"
            const d = document.createElement('div');
            d.setAttribute('class', 'loose');
            d.appendChild(document.createElement('span'));
            d.textContent = 'nobody sees this';
            "#,
            "detached.js",
        )
        .expect("script runs");

    assert!(host.take_mutations().is_empty());
    assert_eq!(session.dropped_mutations(), 0);
}

#[test]
fn image_factory_does_not_touch_the_document() {
    let (session, host) = session(PAGE);
    let ok: bool = session
        .eval_with(
            r#"
            const img = new Image(100, 50);
            img.width === 100 && img.height === 50
                && img instanceof HTMLImageElement
                && img.parentNode === null
            "#,
            "image.js",
        )
        .expect("script runs");

    assert!(ok);
    assert!(host.take_mutations().is_empty());
}

#[test]
fn text_data_changes_are_dropped_without_an_element_locator() {
    let (session, host) = session(PAGE);
    session
        .exec(
            "document.getElementById('box').firstChild.data = 'changed';",
            "text.js",
        )
        .expect("script runs");

    assert!(host.take_mutations().is_empty());
    assert_eq!(session.dropped_mutations(), 1);
    assert!(session.document_html().contains("changed"));
}

#[test]
fn host_attribute_writes_are_relayed() {
    let (session, host) = session(PAGE);
    assert!(session.put_attr("#box", "title", "hi").expect("put attr"));
    assert!(!session.put_attr("#missing", "title", "hi").expect("put attr"));

    assert_eq!(
        host.take_mutations(),
        vec![(
            MutationKind::Attribute,
            "HTML > :nth-child(2) > :nth-child(1)".to_string()
        )]
    );
    assert!(session.document_html().contains("title=\"hi\""));
}

#[test]
fn moving_a_node_reports_old_parent_first() {
    let page = "<html><head></head><body><div id=\"a\"><span id=\"s\"></span></div><div id=\"b\"></div></body></html>";
    let (session, host) = session(page);
    session
        .exec(
            "document.getElementById('b').appendChild(document.getElementById('s'));",
            "move.js",
        )
        .expect("script runs");

    assert_eq!(
        host.take_mutations(),
        vec![
            (
                MutationKind::ChildList,
                "HTML > :nth-child(2) > :nth-child(1)".to_string()
            ),
            (
                MutationKind::ChildList,
                "HTML > :nth-child(2) > :nth-child(2)".to_string()
            ),
        ]
    );
}
