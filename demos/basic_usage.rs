// Example: Basic usage of the dynarchive-core library
use std::fs;
use std::path::PathBuf;

use dynarchive_core::archive::ReadRequest;
use dynarchive_core::import::SourceDir;
use dynarchive_core::search::{RecentQuery, SearchScope};
use dynarchive_core::{Archive, ArchiveConfig};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let data_dir = PathBuf::from("basic_usage_data");
    let db_path = PathBuf::from("basic_usage_dynarchive.db");
    fs::remove_dir_all(&data_dir).ok(); // Clean up previous run
    fs::remove_file(&db_path).ok();

    println!("--- Basic Usage of dynarchive-core ---");

    // ========== Write an export ==========
    println!("\n1. Writing a source export...");
    fs::create_dir_all(&data_dir)?;
    let export = json!({
        "file_id": "shop",
        "title": "Shopping",
        "nodes": [
            {"id": "root", "content": "Errands", "children": ["a", "c"]},
            {"id": "a", "content": "Shopping list", "children": ["b"]},
            {"id": "b", "content": "Buy milk", "checked": false},
            {"id": "c", "content": "Work", "children": ["d"]},
            {"id": "d", "content": "Send report", "note": "quarterly numbers"}
        ]
    });
    fs::write(data_dir.join("shopping.c.json"), serde_json::to_vec_pretty(&export)?)?;
    println!("   ✓ Wrote shopping.c.json");

    // ========== Import ==========
    println!("\n2. Importing...");
    let config = ArchiveConfig {
        source_dir: data_dir.clone(),
        database_path: db_path.clone(),
        ..ArchiveConfig::default()
    };
    let archive = Archive::open(config)?;
    let summary = archive.import(&SourceDir::new(&data_dir), false)?;
    println!("   ✓ {} imported, {} nodes", summary.imported(), summary.nodes_imported());

    let again = archive.import(&SourceDir::new(&data_dir), false)?;
    println!("   ✓ Second run: {} unchanged", again.unchanged());

    // ========== Search ==========
    println!("\n3. Searching for 'milk'...");
    let page = archive.search("milk", &SearchScope::Corpus, None, 0)?;
    for result in &page.results {
        println!("   {} ({})", result.breadcrumbs, result.permalink);
    }

    let scope = SearchScope::Subtree {
        document: Some("Shopping".to_string()),
        node_id: "c".to_string(),
        include_root: false,
    };
    let scoped = archive.search("milk", &scope, None, 0)?;
    println!("   Below 'Work': {} results", scoped.total);

    // ========== Read ==========
    println!("\n4. Rendering the document...");
    let mut request = ReadRequest::new("root");
    request.document = Some("shop".to_string());
    let read = archive.read(&request)?;
    if let dynarchive_core::archive::ReadBody::Markdown(markdown) = &read.body {
        print!("{}", markdown);
    }
    println!("   (~{} tokens)", read.estimated_tokens);

    // ========== Navigate ==========
    println!("\n5. Context of 'Shopping list'...");
    let context = archive.node_context(Some("Shopping"), "a")?;
    println!("   Siblings after: {}", context.siblings_after.len());
    println!("   Children: {}", context.children.len());

    let recent = archive.recent_changes(&RecentQuery::default(), Some(3), 0)?;
    println!("\n6. {} nodes in total, showing {} recent", recent.total, recent.len());

    for entry in archive.list_documents()?.documents {
        println!("   {} - {} nodes", entry.document.title, entry.document.node_count);
    }

    fs::remove_dir_all(&data_dir).ok();
    fs::remove_file(&db_path).ok();
    Ok(())
}
