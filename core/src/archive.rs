use serde::{Deserialize, Serialize};

use crate::config::ArchiveConfig;
use crate::import::{ImportSummary, Loader, RefreshState, SourceDir};
use crate::models::{breadcrumb_string, permalink, Document, NodeContext, OutlineNode, SearchPage};
use crate::search::{RecentQuery, SearchEngine, SearchScope};
use crate::storage::{Connection, Database, DocumentRepository};
use crate::tree::{render_markdown, Navigator, SubtreeNode};
use crate::write::{NewNode, NodeChanges, RemoteApi, WriteOutcome, WriteReconciler};
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFormat {
    #[default]
    Markdown,
    Structured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub document: Option<String>,
    pub node_id: String,
    /// Levels below the node; `None` reads the whole subtree
    pub max_depth: Option<u32>,
    pub include_notes: bool,
    pub format: ReadFormat,
}

impl ReadRequest {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            document: None,
            node_id: node_id.into(),
            max_depth: None,
            include_notes: true,
            format: ReadFormat::Markdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "format", content = "content", rename_all = "snake_case")]
pub enum ReadBody {
    Markdown(String),
    Structured(SubtreeNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadResult {
    pub document_id: String,
    pub node_id: String,
    pub breadcrumbs: String,
    pub permalink: String,
    pub body: ReadBody,
    /// Rough size of `body` for callers with a context budget
    pub estimated_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentEntry {
    #[serde(flatten)]
    pub document: Document,
    pub permalink: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentEntry>,
    pub total_nodes: u64,
}

/// One archive: its store, its loader and the operations callers use.
pub struct Archive {
    config: ArchiveConfig,
    loader: Loader,
}

impl Archive {
    /// Open the database named by `config`, creating or migrating it
    pub fn open(config: ArchiveConfig) -> Result<Self> {
        let db = Database::new(&config.database_path);
        db.get_or_create()?;
        tracing::debug!("Opened archive at {}", db.path().display());
        let loader = Loader::new(db, &config);
        Ok(Self { config, loader })
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        self.loader.database()
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    fn connect(&self) -> Result<Connection> {
        self.database().connect()
    }

    /// Import every export in `source_dir`
    pub fn import(&self, source_dir: &SourceDir, force: bool) -> Result<ImportSummary> {
        self.loader.import_dir(source_dir, force)
    }

    /// Read the refresh bookkeeping; call once at startup
    pub fn refresh_state(&self) -> Result<RefreshState> {
        RefreshState::load(&self.connect()?, self.config.refresh_interval())
    }

    /// Re-import the configured source directory when the interval has passed
    pub fn refresh_if_due(&self, state: &mut RefreshState) -> Result<Option<ImportSummary>> {
        self.loader
            .refresh_if_due(state, &SourceDir::new(&self.config.source_dir))
    }

    pub fn search(&self, query: &str, scope: &SearchScope, limit: Option<usize>, offset: usize) -> Result<SearchPage> {
        let conn = self.connect()?;
        SearchEngine::new(&conn, &self.config).search(query, scope, limit, offset)
    }

    pub fn recent_changes(&self, query: &RecentQuery, limit: Option<usize>, offset: usize) -> Result<SearchPage> {
        let conn = self.connect()?;
        SearchEngine::new(&conn, &self.config).recent_changes(query, limit, offset)
    }

    /// Render or return the subtree under a node
    pub fn read(&self, request: &ReadRequest) -> Result<ReadResult> {
        let conn = self.connect()?;
        let (document, node, crumbs, tree) = {
            let _snapshot = conn.unchecked_transaction()?;
            let nav = Navigator::new(&conn, &self.config);
            let (document, node) = nav.resolve_node(request.document.as_deref(), &request.node_id)?;
            let crumbs = nav.breadcrumbs(&document.file_id, &node.path)?;
            let tree = nav.subtree(&document.file_id, &node.id, request.max_depth)?;
            (document, node, crumbs, tree)
        };

        let (body, size) = match request.format {
            ReadFormat::Markdown => {
                let markdown = render_markdown(&tree, request.include_notes);
                let size = markdown.len();
                (ReadBody::Markdown(markdown), size)
            }
            ReadFormat::Structured => {
                let size = serde_json::to_string(&tree)?.len();
                (ReadBody::Structured(tree), size)
            }
        };

        let estimated_tokens = size / 4;
        let warning = (estimated_tokens > self.config.token_warning_threshold).then(|| {
            format!(
                "Large result (~{} tokens). Consider using max_depth to limit output.",
                estimated_tokens
            )
        });

        Ok(ReadResult {
            breadcrumbs: breadcrumb_string(&crumbs, self.config.breadcrumb_chars),
            permalink: permalink(&self.config.base_url, &document.file_id, Some(&node)),
            document_id: document.file_id,
            node_id: node.id,
            body,
            estimated_tokens,
            warning,
        })
    }

    /// All documents by title, with the archive's node total
    pub fn list_documents(&self) -> Result<DocumentList> {
        let conn = self.connect()?;
        let documents = DocumentRepository::get_all(&conn)?;
        let total_nodes = documents.iter().map(|d| u64::from(d.node_count)).sum();
        let documents = documents
            .into_iter()
            .map(|document| DocumentEntry {
                permalink: permalink(&self.config.base_url, &document.file_id, None),
                document,
            })
            .collect();
        Ok(DocumentList { documents, total_nodes })
    }

    pub fn get_node(&self, document: Option<&str>, node_id: &str) -> Result<OutlineNode> {
        let conn = self.connect()?;
        let _snapshot = conn.unchecked_transaction()?;
        let (_, node) = Navigator::new(&conn, &self.config).resolve_node(document, node_id)?;
        Ok(node)
    }

    pub fn node_context(&self, document: Option<&str>, node_id: &str) -> Result<NodeContext> {
        let conn = self.connect()?;
        Navigator::new(&conn, &self.config).node_context(
            document,
            node_id,
            self.config.sibling_window,
            self.config.child_limit,
        )
    }

    pub fn edit<R: RemoteApi + ?Sized>(
        &self,
        remote: &R,
        document: &str,
        node_id: &str,
        changes: &NodeChanges,
    ) -> Result<WriteOutcome> {
        WriteReconciler::new(remote, &self.loader).apply_edit(document, node_id, changes)
    }

    pub fn add<R: RemoteApi + ?Sized>(
        &self,
        remote: &R,
        document: &str,
        parent_id: &str,
        node: &NewNode,
    ) -> Result<WriteOutcome> {
        WriteReconciler::new(remote, &self.loader).apply_add(document, parent_id, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{notes_json, recipes_json, shopping_json, source, write_source_dir, FakeRemote};
    use crate::Error;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    fn open_archive(documents: &[(&str, serde_json::Value)]) -> (TempDir, Archive) {
        let dir = tempdir().unwrap();
        let source_dir = dir.path().join("data");
        std::fs::create_dir_all(&source_dir).unwrap();
        write_source_dir(&source_dir, documents);

        let config = ArchiveConfig {
            source_dir,
            database_path: dir.path().join("archive.db"),
            ..ArchiveConfig::default()
        };
        let archive = Archive::open(config).unwrap();
        let summary = archive
            .import(&SourceDir::new(&archive.config().source_dir), false)
            .unwrap();
        assert_eq!(summary.failed(), 0);
        (dir, archive)
    }

    #[test]
    fn test_read_markdown() {
        let (_dir, archive) = open_archive(&[("shopping", shopping_json("Buy milk"))]);

        let mut request = ReadRequest::new("a");
        request.document = Some("Shopping".to_string());
        let result = archive.read(&request).unwrap();

        assert_eq!(result.body, ReadBody::Markdown("- Shopping list\n    - [ ] Buy milk\n".to_string()));
        assert_eq!(result.breadcrumbs, "R > Shopping list");
        assert_eq!(result.permalink, "https://dynalist.io/d/shop#z=a");
        assert_eq!(result.estimated_tokens, 35 / 4);
        assert_eq!(result.warning, None);
    }

    #[test]
    fn test_read_structured_and_depth_limited() {
        let (_dir, archive) = open_archive(&[("shopping", shopping_json("Buy milk"))]);

        let request = ReadRequest {
            document: Some("shop".to_string()),
            max_depth: Some(1),
            format: ReadFormat::Structured,
            ..ReadRequest::new("root")
        };
        let result = archive.read(&request).unwrap();
        let ReadBody::Structured(tree) = result.body else {
            panic!("expected a structured body");
        };
        assert_eq!(tree.node_count(), 3);
        assert!(tree.children.iter().all(|c| c.truncated));
        assert_eq!(result.permalink, "https://dynalist.io/d/shop");
    }

    #[test]
    fn test_large_read_carries_warning() {
        let long = "word ".repeat(200);
        let children: Vec<_> = (0..120)
            .map(|i| json!({"id": format!("n{}", i), "content": long}))
            .collect();
        let big = json!({"file_id": "big", "title": "Big", "nodes": [{"id": "root", "children": children}]});
        let (_dir, archive) = open_archive(&[("big", big)]);

        let mut request = ReadRequest::new("root");
        request.document = Some("big".to_string());
        let result = archive.read(&request).unwrap();
        assert!(result.estimated_tokens > archive.config().token_warning_threshold);
        assert!(result.warning.is_some());

        request.max_depth = Some(0);
        assert!(archive.read(&request).unwrap().warning.is_none());
    }

    #[test]
    fn test_list_documents() {
        let (_dir, archive) = open_archive(&[
            ("notes", notes_json()),
            ("recipes", recipes_json()),
            ("shopping", shopping_json("Buy milk")),
        ]);

        let list = archive.list_documents().unwrap();
        let titles: Vec<_> = list.documents.iter().map(|d| d.document.title.as_str()).collect();
        assert_eq!(titles, vec!["Notes", "Recipes", "Shopping"]);
        assert_eq!(list.total_nodes, 11);
        assert_eq!(list.documents[0].permalink, "https://dynalist.io/d/doc1");
    }

    #[test]
    fn test_get_node_and_context() {
        let (_dir, archive) = open_archive(&[("notes", notes_json()), ("recipes", recipes_json())]);

        assert_eq!(archive.get_node(None, "r1").unwrap().content, "Python cake recipe");
        assert!(matches!(archive.get_node(None, "root"), Err(Error::InvalidInput(_))));
        assert_eq!(archive.get_node(Some("Recipes"), "root").unwrap().document_id, "doc2");

        let context = archive.node_context(Some("Notes"), "n1").unwrap();
        assert_eq!(context.siblings_after[0].id, "n2");
        assert_eq!(context.children[0].id, "n1a");
    }

    #[test]
    fn test_edit_then_search() {
        let (_dir, archive) = open_archive(&[("shopping", shopping_json("Buy milk"))]);
        let remote = FakeRemote::with_documents(vec![shopping_json("Buy milk")]);

        let changes = NodeChanges {
            content: Some("Buy oat milk".to_string()),
            ..NodeChanges::default()
        };
        let outcome = archive.edit(&remote, "shop", "b", &changes).unwrap();
        assert!(outcome.is_synced());

        let oat = archive.search("oat", &SearchScope::Corpus, None, 0).unwrap();
        assert_eq!(oat.results[0].node.id, "b");
        assert_eq!(archive.search("\"Buy milk\"", &SearchScope::Corpus, None, 0).unwrap().total, 0);

        let added = archive.add(&remote, "shop", "c", &NewNode::new("Book flights")).unwrap();
        assert_eq!(archive.get_node(Some("shop"), &added.node_id).unwrap().parent_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_reads_never_mix_two_versions_of_a_document() {
        let (_dir, archive) = open_archive(&[("shopping", shopping_json("Buy milk"))]);

        std::thread::scope(|scope| {
            let loader = archive.loader().clone();
            scope.spawn(move || {
                for i in 0..20 {
                    let content = if i % 2 == 0 { "Buy bread" } else { "Buy milk" };
                    loader.import_one(&source("shopping", shopping_json(content)), true).unwrap();
                }
            });

            for _ in 0..20 {
                let page = archive.search("milk", &SearchScope::Corpus, None, 0).unwrap();
                assert_eq!(page.len(), page.total);
                assert!(!page.has_more);

                let mut request = ReadRequest::new("b");
                request.document = Some("shop".to_string());
                request.format = ReadFormat::Structured;
                let result = archive.read(&request).unwrap();
                let ReadBody::Structured(tree) = &result.body else {
                    panic!("expected a structured body");
                };
                assert!(result.breadcrumbs.ends_with(&tree.node.content), "{}", result.breadcrumbs);

                let context = archive.node_context(Some("shop"), "b").unwrap();
                assert_eq!(context.breadcrumbs.last().unwrap().content, context.node.content);
            }
        });
    }

    #[test]
    fn test_refresh_uses_configured_source_dir() {
        let (dir, archive) = open_archive(&[("notes", notes_json())]);
        write_source_dir(&dir.path().join("data"), &[("recipes", recipes_json())]);

        let mut state = archive.refresh_state().unwrap();
        let summary = archive.refresh_if_due(&mut state).unwrap().unwrap();
        assert_eq!(summary.imported(), 1);
        assert_eq!(summary.unchanged(), 1);
        assert!(archive.refresh_if_due(&mut state).unwrap().is_none());
    }
}
