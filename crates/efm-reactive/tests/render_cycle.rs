use anyhow::{Context, Result};
use efm_reactive::{ComponentSpec, Document, Runtime, Store, Target};
use serde_json::{Value, json};

fn counter_runtime() -> Result<(Runtime, efm_reactive::StoreId)> {
    let document = Document::from_markup(
        r#"<main data-app><header class="title"></header><section class="list"></section></main>"#,
    );
    let mut runtime = Runtime::new(document);
    let store = runtime.add_store(
        Store::builder(json!({"title": "Strips", "items": ["a", "b"]}))
            .getter("count", |data| json!(data["items"].as_array().map_or(0, Vec::len)))
            .setter("push", |draft, args| {
                let mut items = draft
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                items.extend(args.iter().cloned());
                draft.set("items", items);
            })
            .setter("retitle", |draft, args| {
                if let Some(title) = args.first() {
                    draft.set("title", title.clone());
                }
            })
            .build(),
    );
    Ok((runtime, store))
}

fn list_markup(data: &Value) -> String {
    data["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| format!("<li>{}</li>", item.as_str().unwrap_or_default()))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn shared_store_drives_sibling_components() -> Result<()> {
    let (mut runtime, store) = counter_runtime()?;
    let title = runtime.add_component(
        ComponentSpec::new(Target::selector(".title")?)
            .store(store)
            .template(|data| format!("<h1>{}</h1>", data["title"].as_str().unwrap_or_default())),
    )?;
    let list = runtime.add_component(
        ComponentSpec::new(Target::selector(".list")?)
            .store(store)
            .template(|data| format!("<ul>{}</ul>", list_markup(data))),
    )?;
    runtime.render(title)?;
    runtime.render(list)?;

    runtime.dispatch(store, "push", &[json!("c")])?;
    runtime.dispatch(store, "retitle", &[json!("<Strips>")])?;
    let report = runtime.flush();
    assert_eq!(report.rendered, vec![title, list]);
    assert_eq!(runtime.get(store, "count")?, json!(3));

    let doc = runtime.document();
    let header = doc.select(".title")?.context("title node")?;
    assert_eq!(doc.inner_html(header), "<h1>&lt;Strips&gt;</h1>");
    let section = doc.select(".list")?.context("list node")?;
    assert_eq!(doc.text_content(section), "abc");
    Ok(())
}

#[test]
fn rerendering_identical_state_leaves_document_untouched() -> Result<()> {
    let (mut runtime, store) = counter_runtime()?;
    let list = runtime.add_component(
        ComponentSpec::new(Target::selector(".list")?)
            .store(store)
            .template(|data| {
                format!(
                    "\n  <ul class=\"items\" style=\"white-space: nowrap\">{}</ul>\n",
                    list_markup(data)
                )
            }),
    )?;
    runtime.render(list)?;
    let before = runtime.document().mutation_count();

    runtime.schedule(list);
    runtime.schedule(list);
    let report = runtime.flush();
    assert_eq!(report.rendered, vec![list]);
    assert_eq!(runtime.document().mutation_count(), before);
    Ok(())
}

#[test]
fn growing_and_shrinking_lists_patch_in_place() -> Result<()> {
    let (mut runtime, store) = counter_runtime()?;
    let list = runtime.add_component(
        ComponentSpec::new(Target::selector(".list")?)
            .store(store)
            .template(|data| format!("<ul>{}</ul>", list_markup(data))),
    )?;
    runtime.render(list)?;
    let section = runtime.document().select(".list")?.context("list node")?;
    let ul = runtime.document().children(section)[0];

    runtime.dispatch(store, "push", &[json!("c"), json!("d")])?;
    runtime.flush();
    assert_eq!(runtime.document().children(ul).len(), 4);
    // The list element itself is reused, not rebuilt.
    assert_eq!(runtime.document().children(section)[0], ul);

    runtime.assign(store, "items", json!(["z"]))?;
    runtime.flush();
    assert_eq!(runtime.document().inner_html(ul), "<li>z</li>");
    // Three dropped <li> elements and their text stay in the arena.
    assert!(runtime.document().orphaned_nodes() >= 6);
    Ok(())
}
