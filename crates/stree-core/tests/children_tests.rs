use serde_json::{Value, json};
use stree_core::{
    ClassDef, Context, FieldType, ModelType, Schema, bind, bind_with_children,
};

fn bind_tree_todo() -> (ModelType, FieldType) {
    let class = ClassDef::root()
        .query("title_len", |c, _| {
            Ok(json!(c.get("title")?.as_str().unwrap_or("").len()))
        })
        .procedure("rename", |c, args| {
            let title = args.first().cloned().unwrap_or(Value::Null);
            c.set("title", title)?;
            Ok(Value::Null)
        });
    let schema = Schema::object().field_with_default("title", FieldType::Text, json!(""));
    bind_with_children(class, schema, Some("Todo")).unwrap()
}

#[test]
fn test_children_field_is_injected() {
    let (ty, _collection) = bind_tree_todo();
    assert!(ty.schema().has_field("children"));

    let ctx = Context::new();
    let node = ty.create(&ctx, None).unwrap();
    assert!(node.children("children").unwrap().is_empty());
}

#[test]
fn test_two_level_tree_round_trips_preserving_structure_and_order() {
    let (ty, _collection) = bind_tree_todo();
    let ctx = Context::new();

    let snap = json!({
        "title": "root",
        "children": [
            {
                "title": "first",
                "children": [
                    { "title": "grandchild", "children": [] },
                ],
            },
            { "title": "second", "children": [] },
        ],
    });
    let node = ty.create(&ctx, Some(&snap)).unwrap();

    let children = node.children("children").unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].get("title").unwrap(), json!("first"));
    assert_eq!(children[1].get("title").unwrap(), json!("second"));

    let grandchildren = children[0].children("children").unwrap();
    assert_eq!(grandchildren.len(), 1);
    assert_eq!(grandchildren[0].get("title").unwrap(), json!("grandchild"));

    assert_eq!(node.snapshot(&ctx).unwrap(), snap);
}

#[test]
fn test_methods_work_on_decoded_children() {
    let (ty, _collection) = bind_tree_todo();
    let ctx = Context::new();

    let snap = json!({
        "title": "root",
        "children": [ { "title": "leaf", "children": [] } ],
    });
    let node = ty.create(&ctx, Some(&snap)).unwrap();
    let leaf = node.children("children").unwrap().remove(0);

    assert_eq!(leaf.query(&ctx, "title_len", &[]).unwrap(), json!(4));
    leaf.call(&ctx, "rename", &[json!("renamed")]).unwrap();
    assert_eq!(leaf.get("title").unwrap(), json!("renamed"));

    // The parent's snapshot sees the mutated child
    let out = node.snapshot(&ctx).unwrap();
    assert_eq!(
        out.get("children").unwrap()[0].get("title").unwrap(),
        &json!("renamed")
    );
}

#[test]
fn test_children_dispatch_registered_subtypes() {
    let (todo, _collection) = bind_tree_todo();

    let special_class = ClassDef::extending(&todo);
    let special_schema = todo
        .schema()
        .clone()
        .field_with_default("count", FieldType::Number, json!(0));
    let _special = bind(special_class, special_schema, Some("SpecialTodo")).unwrap();

    let ctx = Context::new();
    let snap = json!({
        "title": "root",
        "children": [
            { "$": "SpecialTodo", "title": "tagged", "children": [], "count": 3 },
            { "title": "plain", "children": [] },
        ],
    });
    let node = todo.create(&ctx, Some(&snap)).unwrap();
    let children = node.children("children").unwrap();
    assert_eq!(children[0].type_name(), Some("SpecialTodo"));
    assert_eq!(children[0].get("count").unwrap(), json!(3));
    assert_eq!(children[1].type_name(), Some("Todo"));

    // Subtype children re-stamp their tag on encode
    let out = node.snapshot(&ctx).unwrap();
    assert_eq!(
        out.get("children").unwrap()[0].get("$").unwrap(),
        &json!("SpecialTodo")
    );
    assert!(out.get("children").unwrap()[1].get("$").is_none());
}

#[test]
fn test_returned_collection_type_is_reusable_in_other_schemas() {
    let (_todo, collection) = bind_tree_todo();

    let board_schema = Schema::object()
        .field_with_default("name", FieldType::Text, json!(""))
        .field("items", collection);
    let board = bind(ClassDef::root(), board_schema, Some("Board")).unwrap();

    let ctx = Context::new();
    let snap = json!({
        "name": "week",
        "items": [
            { "title": "a", "children": [] },
            { "title": "b", "children": [ { "title": "b1", "children": [] } ] },
        ],
    });
    let node = board.create(&ctx, Some(&snap)).unwrap();
    let items = node.children("items").unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].children("children").unwrap().len(), 1);
    assert_eq!(node.snapshot(&ctx).unwrap(), snap);
}

#[test]
fn test_optional_child_field() {
    let (todo, _collection) = bind_tree_todo();
    let holder_schema = Schema::object().field(
        "current",
        FieldType::Optional(Box::new(FieldType::Model(todo.clone()))),
    );
    let holder = bind(ClassDef::root(), holder_schema, Some("Holder")).unwrap();

    let ctx = Context::new();
    let empty = holder.create(&ctx, None).unwrap();
    assert!(empty.child("current").unwrap().is_none());

    let full = holder
        .create(
            &ctx,
            Some(&json!({ "current": { "title": "x", "children": [] } })),
        )
        .unwrap();
    let child = full.child("current").unwrap().unwrap();
    assert_eq!(child.get("title").unwrap(), json!("x"));
}
