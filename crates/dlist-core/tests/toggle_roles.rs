use manos_dlist_core::description_list::{TOGGLE_TERM_COMMAND, TOGGLE_VALUE_COMMAND};
use manos_dlist_core::{Editor, ItemRole, ListError, TreeEdit, markup, toggle_roles};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn run(command: &str, source: &str) -> String {
    let mut editor = Editor::from_markup(source).unwrap();
    editor.run_command(command, None).unwrap();
    editor.to_markup()
}

#[rstest]
#[case::term_to_value(
    TOGGLE_TERM_COMMAND,
    "<dl><dt>a</dt><dt>[]b</dt></dl>",
    "<dl><dt>a</dt><dd>[]b</dd></dl>"
)]
#[case::value_to_term(
    TOGGLE_VALUE_COMMAND,
    "<dl><dt>a</dt><dd>[]b</dd></dl>",
    "<dl><dt>a</dt><dt>[]b</dt></dl>"
)]
#[case::value_command_on_a_term(
    TOGGLE_VALUE_COMMAND,
    "<dl><dt>[]a</dt></dl>",
    "<dl><dd>[]a</dd></dl>"
)]
#[case::term_command_on_a_value(
    TOGGLE_TERM_COMMAND,
    "<dl><dd>[]a</dd></dl>",
    "<dl><dt>[]a</dt></dl>"
)]
#[case::range_stops_at_the_end_item(
    TOGGLE_VALUE_COMMAND,
    "<dl><dt>[a</dt><dt>b</dt><dt>c]</dt><dt>d</dt></dl>",
    "<dl><dd>[a</dd><dd>b</dd><dd>c]</dd><dt>d</dt></dl>"
)]
#[case::mixed_range_becomes_uniform(
    TOGGLE_VALUE_COMMAND,
    "<dl><dt>[a</dt><dd>b</dd><dt>c]</dt></dl>",
    "<dl><dd>[a</dd><dd>b</dd><dd>c]</dd></dl>"
)]
#[case::range_across_lists(
    TOGGLE_TERM_COMMAND,
    "<dl><dd>[a</dd></dl><p>x</p><dl><dd>b]</dd><dd>c</dd></dl>",
    "<dl><dt>[a</dt></dl><p>x</p><dl><dt>b]</dt><dd>c</dd></dl>"
)]
fn toggles_roles(#[case] command: &str, #[case] source: &str, #[case] expected: &str) {
    assert_eq!(run(command, source), expected);
}

#[test]
fn nested_items_inside_the_end_item_are_left_alone() {
    let (mut doc, selection) =
        markup::parse("<dl><dt>[a</dt><dt>b]<dl><dt>c</dt></dl></dt></dl>").unwrap();
    let selection = selection.unwrap();
    let mut edit = TreeEdit::new(&mut doc, &selection);
    let changed = toggle_roles(&mut edit, &selection, ItemRole::Value).unwrap();
    drop(edit);

    assert_eq!(changed, 2);
    assert_eq!(
        markup::to_markup(&doc, None),
        "<dl><dd>a</dd><dd>b<dl><dt>c</dt></dl></dd></dl>"
    );
}

#[test]
fn selection_ending_outside_an_item_is_rejected() {
    let (mut doc, selection) = markup::parse("<dl><dt>[a</dt></dl><p>b]</p>").unwrap();
    let selection = selection.unwrap();
    let mut edit = TreeEdit::new(&mut doc, &selection);
    assert!(matches!(
        toggle_roles(&mut edit, &selection, ItemRole::Value),
        Err(ListError::NoItemAncestor(_))
    ));
}

#[test]
fn failed_toggle_leaves_the_editor_untouched() {
    let source = "<dl><dt>[a</dt></dl><p>b]</p>";
    let mut editor = Editor::from_markup(source).unwrap();

    let err = editor.run_command(TOGGLE_TERM_COMMAND, None).unwrap_err();
    assert!(err.message().contains("end"));
    assert_eq!(editor.to_markup(), source);
    assert!(editor.last_transaction().is_none());
}

#[test]
fn toggle_outside_a_description_list_is_disabled() {
    let mut editor = Editor::from_markup("<p>[]a</p>").unwrap();
    let err = editor.run_command(TOGGLE_VALUE_COMMAND, None).unwrap_err();
    assert!(err.message().contains("disabled"));
    assert_eq!(editor.to_markup(), "<p>[]a</p>");
}
