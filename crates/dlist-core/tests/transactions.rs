use manos_dlist_core::description_list::TOGGLE_LIST_COMMAND;
use manos_dlist_core::{DocumentValue, Editor, Op, Transaction, markup};
use pretty_assertions::assert_eq;

#[test]
fn transactions_serialize_with_tagged_ops() -> anyhow::Result<()> {
    let mut editor = Editor::from_markup("<p>[]a</p>")?;
    editor.run_command(TOGGLE_LIST_COMMAND, None)?;

    let tx = editor.last_transaction().cloned().unwrap_or_default();
    let json = serde_json::to_value(&tx)?;
    assert_eq!(json["meta"]["source"], TOGGLE_LIST_COMMAND);
    assert_eq!(json["ops"][0]["op"], "create");
    assert_eq!(json["ops"][0]["tag"], "dl");

    let parsed: Transaction = serde_json::from_value(json)?;
    assert_eq!(parsed, tx);
    Ok(())
}

#[test]
fn build_journal_moves_content_instead_of_copying_it() {
    let mut editor = Editor::from_markup("<p>[]a</p>").unwrap();
    let text = editor.selection().anchor.node;
    editor.run_command(TOGGLE_LIST_COMMAND, None).unwrap();

    let tx = editor.last_transaction().unwrap();
    assert!(tx.ops.iter().any(|op| matches!(
        op,
        Op::MoveChildren { count: 1, .. }
    )));
    assert_eq!(editor.selection().anchor.node, text);
    assert_eq!(editor.doc().text(text), Some("a"));
}

#[test]
fn document_value_round_trips_an_edited_document() -> anyhow::Result<()> {
    let mut editor = Editor::from_markup("<p>[a</p><p>b]</p>")?;
    editor.run_command(TOGGLE_LIST_COMMAND, None)?;

    let json = DocumentValue::from_document(editor.doc()).to_json_pretty()?;
    let restored = DocumentValue::from_json_str(&json)?.into_document()?;
    assert_eq!(
        markup::to_markup(&restored, None),
        "<dl><dt>a</dt><dd>b</dd></dl>"
    );
    Ok(())
}
