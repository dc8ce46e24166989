use manos_dlist_core::Editor;
use manos_dlist_core::description_list::TOGGLE_LIST_COMMAND;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn remove(source: &str) -> String {
    let mut editor = Editor::from_markup(source).unwrap();
    editor.run_command(TOGGLE_LIST_COMMAND, None).unwrap();
    editor.to_markup()
}

#[rstest]
#[case::single_term("<dl><dt>[]foo</dt></dl>", "<p>[]foo</p>")]
#[case::single_value("<dl><dd>[]foo</dd></dl>", "<p>[]foo</p>")]
#[case::last_item(
    "<dl><dt>x</dt><dd>[]foo</dd></dl>",
    "<dl><dt>x</dt></dl><p>[]foo</p>"
)]
#[case::between_items(
    "<dl><dt>x</dt><dd>[]foo</dd><dt>y</dt></dl>",
    "<dl><dt>x</dt></dl><p>[]foo</p><dl><dt>y</dt></dl>"
)]
#[case::whole_list(
    "<dl><dt>[x</dt><dd>foo</dd><dt>y]</dt></dl>",
    "<p>[x</p><p>foo</p><p>y]</p>"
)]
#[case::part_of_list(
    "<dl><dt>x</dt><dd>[foo</dd><dd>bar]</dd><dt>y</dt></dl>",
    "<dl><dt>x</dt></dl><p>[foo</p><p>bar]</p><dl><dt>y</dt></dl>"
)]
#[case::ending_outside_the_list(
    "<dl><dt>x</dt><dd>[foo</dd></dl><p>y</p><ul><li>z]</li></ul>",
    "<dl><dt>x</dt></dl><p>[foo</p><p>y</p><ul><li>z]</li></ul>"
)]
#[case::through_an_unordered_list(
    r#"<dl><dt>[x</dt></dl><ul class="foo"><li>a</li><li>b</li></ul><p>y]</p>"#,
    r#"<p>[x</p><ul class="foo"><li>a</li><li>b</li></ul><p>y]</p>"#
)]
#[case::across_two_lists(
    "<dl><dt>x</dt><dd>[foo</dd></dl><p>y</p><dl><dt>bar]</dt><dd>z</dd></dl>",
    "<dl><dt>x</dt></dl><p>[foo</p><p>y</p><p>bar]</p><dl><dd>z</dd></dl>"
)]
#[case::two_whole_lists(
    "<dl><dd>[foo</dd></dl><p>y</p><dl><dt>bar]</dt></dl>",
    "<p>[foo</p><p>y</p><p>bar]</p>"
)]
#[case::two_lists_ending_in_a_paragraph(
    "<dl><dt>x</dt><dd>[foo</dd></dl><p>y</p><dl><dt>bar</dt></dl><p>z]</p>",
    "<dl><dt>x</dt></dl><p>[foo</p><p>y</p><p>bar</p><p>z]</p>"
)]
fn removes_description_list(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(remove(source), expected);
}

#[test]
fn attributes_survive_demotion() {
    assert_eq!(
        remove(r#"<dl><dt class="k" id="a">[]x</dt></dl>"#),
        r#"<p class="k" id="a">[]x</p>"#
    );
}

#[test]
fn nested_content_moves_with_the_item() {
    assert_eq!(
        remove("<dl><dd>[]a<b>b</b><img src=\"c.png\"></dd></dl>"),
        "<p>[]a<b>b</b><img src=\"c.png\"></p>"
    );
}

#[test]
fn removal_is_journaled_as_one_transaction() {
    let mut editor = Editor::from_markup("<dl><dt>x</dt><dd>[]foo</dd></dl>").unwrap();
    editor.run_command(TOGGLE_LIST_COMMAND, None).unwrap();

    let tx = editor.last_transaction().unwrap();
    assert_eq!(tx.meta.source.as_deref(), Some(TOGGLE_LIST_COMMAND));
    let kinds: Vec<&str> = tx.ops.iter().map(|op| op.kind()).collect();
    assert_eq!(
        kinds,
        ["create", "split", "rename", "detach", "attach", "remove"]
    );
    assert_eq!(tx.selection_after.as_ref(), Some(editor.selection()));
}
