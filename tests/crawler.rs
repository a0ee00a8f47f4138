//! Crawler behaviour against in-memory resource trees
//!
//! Both crawlers are driven over fake trees with injected faults and their
//! storage writes and progress counts are compared.

use anyhow::Result;
use gcp_inventory::crawler::{CrawlOptions, Crawler, CrawlerConfig, ParallelCrawler, Visitor};
use gcp_inventory::gcp::client::ApiClient;
use gcp_inventory::progress::{CrawlProgress, Progresser, Summary};
use gcp_inventory::resource::{ChildListing, Facet, Resource, ResourceKey, ResourceRecord};
use gcp_inventory::run_crawler;
use gcp_inventory::storage::{MemoryStorage, Storage};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// API client the fake resources never need
struct NoApi;

impl ApiClient for NoApi {
    fn get(&self, url: &str) -> Result<Value> {
        anyhow::bail!("unexpected GET {}", url)
    }

    fn post(&self, url: &str, _body: &Value) -> Result<Value> {
        anyhow::bail!("unexpected POST {}", url)
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    id: String,
    children: Vec<Node>,
    fail_visit: bool,
    fail_listing: bool,
}

impl Node {
    fn leaf(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    fn branch(id: &str, children: Vec<Node>) -> Self {
        Self {
            id: id.to_string(),
            children,
            ..Self::default()
        }
    }

    fn failing(mut self) -> Self {
        self.fail_visit = true;
        self
    }

    fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    fn into_resource(self) -> Box<dyn Resource> {
        Box::new(TreeResource {
            node: self,
            parent: None,
            warnings: Vec::new(),
        })
    }
}

fn key(id: &str) -> ResourceKey {
    ResourceKey::new("node", id)
}

struct TreeResource {
    node: Node,
    parent: Option<ResourceKey>,
    warnings: Vec<String>,
}

impl Resource for TreeResource {
    fn key(&self) -> ResourceKey {
        key(&self.node.id)
    }

    fn fetch_iam_policy(&mut self, _client: &dyn ApiClient) -> Result<()> {
        if self.node.fail_visit {
            anyhow::bail!("injected fault at {}", self.node.id);
        }
        Ok(())
    }

    fn list_children(&self, _client: &dyn ApiClient) -> Vec<ChildListing> {
        if self.node.fail_listing {
            return vec![Err(anyhow::anyhow!("cannot list children of {}", self.node.id))];
        }
        let children = self
            .node
            .children
            .iter()
            .cloned()
            .map(|child| {
                Box::new(TreeResource {
                    node: child,
                    parent: Some(self.key()),
                    warnings: Vec::new(),
                }) as Box<dyn Resource>
            })
            .collect();
        vec![Ok(children)]
    }

    fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    fn record(&self) -> ResourceRecord {
        let mut record = ResourceRecord::new(self.key(), self.parent.clone(), json!({ "id": self.node.id }));
        record.warnings = self.warnings.clone();
        record
    }
}

struct Outcome {
    storage: Arc<MemoryStorage>,
    summary: Summary,
    result: Result<()>,
}

impl Outcome {
    fn written(&self) -> Vec<String> {
        self.storage.written_keys().into_iter().map(|k| k.id).collect()
    }
}

fn config(storage: Arc<dyn Storage>, progress: Arc<CrawlProgress>, threads: usize) -> CrawlerConfig {
    CrawlerConfig::new(storage, progress, Arc::new(NoApi))
        .with_threads(threads)
        .unwrap()
}

fn crawl(tree: Node, parallel: bool, threads: usize) -> Outcome {
    let storage = Arc::new(MemoryStorage::new());
    let progress = Arc::new(CrawlProgress::new());
    let config = config(storage.clone(), progress.clone(), threads);

    let result = if parallel {
        ParallelCrawler::new(config).run(tree.into_resource()).map(|_| ())
    } else {
        Crawler::new(config).run(tree.into_resource()).map(|_| ())
    };

    Outcome {
        storage,
        summary: progress.get_summary(),
        result,
    }
}

/// R with children {A, B, C}; A has children {A1, A2}
fn example_tree() -> Node {
    Node::branch(
        "R",
        vec![
            Node::branch("A", vec![Node::leaf("A1"), Node::leaf("A2")]),
            Node::leaf("B"),
            Node::leaf("C"),
        ],
    )
}

fn sorted(ids: &[&str]) -> Vec<String> {
    let mut ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
    ids.sort();
    ids
}

mod sequential {
    use super::*;

    #[test]
    fn test_example_tree_writes_every_node() {
        let outcome = crawl(example_tree(), false, 1);

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.written(), sorted(&["R", "A", "A1", "A2", "B", "C"]));
        assert_eq!((outcome.summary.objects, outcome.summary.errors, outcome.summary.warnings), (6, 0, 0));
    }

    #[test]
    fn test_depth_first_order() {
        let outcome = crawl(example_tree(), false, 1);
        let order: Vec<_> = outcome.storage.writes().into_iter().map(|r| r.key.id).collect();
        assert_eq!(order, vec!["R", "A", "A1", "A2", "B", "C"]);
    }

    #[test]
    fn test_leaf_fault_becomes_parent_warning() {
        let tree = Node::branch(
            "R",
            vec![
                Node::branch("A", vec![Node::leaf("A1"), Node::leaf("A2")]),
                Node::leaf("B").failing(),
                Node::leaf("C"),
            ],
        );
        let outcome = crawl(tree, false, 1);

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.written(), sorted(&["R", "A", "A1", "A2", "C"]));
        assert_eq!((outcome.summary.errors, outcome.summary.warnings), (1, 1));

        let warnings = outcome.storage.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("injected fault at B"));
        assert!(warnings[0].ends_with('\n'));
    }

    #[test]
    fn test_root_fault_is_returned() {
        let outcome = crawl(example_tree().failing(), false, 1);

        let error = outcome.result.as_ref().unwrap_err();
        assert!(format!("{:#}", error).contains("injected fault at R"));
        assert!(outcome.written().is_empty());
        assert_eq!((outcome.summary.errors, outcome.summary.warnings), (1, 0));
    }

    #[test]
    fn test_visit_twice_writes_twice() {
        let storage = Arc::new(MemoryStorage::new());
        let progress = Arc::new(CrawlProgress::new());
        let crawler = Crawler::new(config(storage.clone(), progress.clone(), 1));

        let mut resource = Node::leaf("X").into_resource();
        crawler.visit(resource.as_mut()).unwrap();
        crawler.visit(resource.as_mut()).unwrap();

        assert_eq!(storage.writes().len(), 2);
        assert_eq!(progress.get_summary().objects, 2);
    }
}

mod parallel {
    use super::*;

    #[test]
    fn test_example_tree_writes_every_node() {
        let outcome = crawl(example_tree(), true, 4);

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.written(), sorted(&["R", "A", "A1", "A2", "B", "C"]));
        assert_eq!((outcome.summary.objects, outcome.summary.errors, outcome.summary.warnings), (6, 0, 0));
    }

    #[test]
    fn test_wide_tree_has_no_duplicates_or_gaps() {
        let leaves = (0..100).map(|i| Node::leaf(&format!("leaf-{:03}", i))).collect();
        let outcome = crawl(Node::branch("root", leaves), true, 8);

        let written = outcome.written();
        assert_eq!(written.len(), 101);
        assert_eq!(written.iter().collect::<HashSet<_>>().len(), 101);
        assert_eq!(outcome.summary.objects, 101);
    }

    #[test]
    fn test_single_worker_handles_deep_chain() {
        let mut tree = Node::leaf("n200");
        for depth in (0..200).rev() {
            tree = Node::branch(&format!("n{}", depth), vec![tree]);
        }
        let outcome = crawl(tree, true, 1);

        assert_eq!(outcome.storage.writes().len(), 201);
    }

    #[test]
    fn test_interior_fault_abandons_only_its_subtree() {
        let tree = Node::branch(
            "R",
            vec![
                Node::branch("A", vec![Node::leaf("A1"), Node::leaf("A2")]).failing(),
                Node::leaf("B"),
                Node::leaf("C"),
            ],
        );
        let outcome = crawl(tree, true, 4);

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.written(), sorted(&["R", "B", "C"]));
        assert_eq!((outcome.summary.errors, outcome.summary.warnings), (1, 1));
    }

    #[test]
    fn test_root_fault_is_returned_without_warning() {
        let outcome = crawl(example_tree().failing(), true, 4);

        assert!(outcome.result.is_err());
        assert!(outcome.written().is_empty());
        assert_eq!((outcome.summary.errors, outcome.summary.warnings), (1, 0));
    }

    #[test]
    fn test_queue_is_drained_after_run() {
        let storage = Arc::new(MemoryStorage::new());
        let progress = Arc::new(CrawlProgress::new());
        let crawler = ParallelCrawler::new(config(storage, progress, 3));

        crawler.run(example_tree().into_resource()).unwrap();
        assert_eq!(crawler.in_flight(), 0);

        // Workers are rebuilt for every run
        crawler.run(example_tree().into_resource()).unwrap();
        assert_eq!(crawler.in_flight(), 0);
    }

    #[test]
    fn test_visits_run_on_worker_threads() {
        struct ThreadNameStorage(Mutex<HashSet<String>>);

        impl Storage for ThreadNameStorage {
            fn write(&self, _resource: &dyn Resource) -> Result<()> {
                let name = std::thread::current().name().unwrap_or("").to_string();
                self.0.lock().insert(name);
                Ok(())
            }
            fn update(&self, _resource: &dyn Resource) -> Result<()> {
                Ok(())
            }
            fn warning(&self, _message: &str) -> Result<()> {
                Ok(())
            }
        }

        let storage = Arc::new(ThreadNameStorage(Mutex::new(HashSet::new())));
        let crawler = ParallelCrawler::new(config(storage.clone(), Arc::new(CrawlProgress::new()), 2));
        crawler.run(example_tree().into_resource()).unwrap();

        assert!(storage.0.lock().iter().all(|name| name.starts_with("crawler-")));
    }
}

mod error_handling {
    use super::*;

    /// Panics while fetching its IAM policy
    struct PanickingResource(&'static str);

    impl Resource for PanickingResource {
        fn key(&self) -> ResourceKey {
            key(self.0)
        }
        fn fetch_iam_policy(&mut self, _client: &dyn ApiClient) -> Result<()> {
            panic!("policy parser exploded at {}", self.0)
        }
        fn add_warning(&mut self, _warning: String) {}
        fn record(&self) -> ResourceRecord {
            ResourceRecord::new(self.key(), None, Value::Null)
        }
    }

    #[test]
    fn test_panicking_root_fails_parallel_run() {
        let storage = Arc::new(MemoryStorage::new());
        let progress = Arc::new(CrawlProgress::new());
        let crawler = ParallelCrawler::new(config(storage.clone(), progress.clone(), 2));

        let Err(error) = crawler.run(Box::new(PanickingResource("root"))) else {
            panic!("a root task that panicked should fail the run");
        };

        assert!(error.to_string().contains("node/root"));
        assert!(storage.writes().is_empty());
        let summary = progress.get_summary();
        assert_eq!(summary.errors, 1);
        assert!(summary.last_error.unwrap().contains("policy parser exploded at root"));
        assert_eq!(crawler.in_flight(), 0);
    }

    /// Fails writes for chosen keys and flags any overlapping storage call
    #[derive(Default)]
    struct StrictStorage {
        fail_writes: HashSet<ResourceKey>,
        busy: AtomicBool,
        overlapped: AtomicBool,
        calls: AtomicUsize,
        inner: MemoryStorage,
    }

    impl StrictStorage {
        fn enter(&self) {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_micros(200));
        }

        fn leave(&self) {
            self.busy.store(false, Ordering::SeqCst);
        }
    }

    impl Storage for StrictStorage {
        fn write(&self, resource: &dyn Resource) -> Result<()> {
            self.enter();
            let result = if self.fail_writes.contains(&resource.key()) {
                Err(anyhow::anyhow!("disk full"))
            } else {
                self.inner.write(resource)
            };
            self.leave();
            result
        }

        fn update(&self, resource: &dyn Resource) -> Result<()> {
            self.enter();
            let result = self.inner.update(resource);
            self.leave();
            result
        }

        fn warning(&self, message: &str) -> Result<()> {
            self.enter();
            let result = self.inner.warning(message);
            self.leave();
            result
        }
    }

    #[test]
    fn test_storage_calls_never_overlap() {
        let children = (0..200)
            .map(|i| {
                let leaf = Node::leaf(&format!("c{}", i));
                if i % 7 == 0 {
                    leaf.failing()
                } else {
                    leaf
                }
            })
            .collect();
        let storage = Arc::new(StrictStorage::default());
        let crawler = ParallelCrawler::new(config(storage.clone(), Arc::new(CrawlProgress::new()), 16));

        crawler.run(Node::branch("root", children).into_resource()).unwrap();

        assert!(!storage.overlapped.load(Ordering::SeqCst));
        // 1 root + 171 good leaves written, 29 warnings stored
        assert_eq!(storage.calls.load(Ordering::SeqCst), 201);
    }

    #[test]
    fn test_write_fault_is_node_fatal() {
        for parallel in [false, true] {
            let storage = Arc::new(StrictStorage {
                fail_writes: HashSet::from([key("B")]),
                ..StrictStorage::default()
            });
            let progress = Arc::new(CrawlProgress::new());
            let config = config(storage.clone(), progress.clone(), 2);

            if parallel {
                ParallelCrawler::new(config).run(example_tree().into_resource()).unwrap();
            } else {
                Crawler::new(config).run(example_tree().into_resource()).unwrap();
            }

            let summary = progress.get_summary();
            assert_eq!((summary.objects, summary.errors, summary.warnings), (5, 1, 1));
            assert!(summary.last_error.unwrap().contains("Failed to write node/B: disk full"));
        }
    }

    #[test]
    fn test_listing_fault_warns_and_updates_parent() {
        for parallel in [false, true] {
            let tree = Node::branch(
                "R",
                vec![
                    Node::branch("A", vec![Node::leaf("A1")]).failing_listing(),
                    Node::leaf("B"),
                ],
            );
            let outcome = crawl(tree, parallel, 2);

            assert!(outcome.result.is_ok());
            assert_eq!(outcome.written(), sorted(&["R", "A", "B"]));
            assert_eq!((outcome.summary.errors, outcome.summary.warnings), (0, 1));

            let updates = outcome.storage.updates();
            assert_eq!(updates.len(), 1);
            assert_eq!(updates[0].key, key("A"));
            assert_eq!(updates[0].warnings, vec!["cannot list children of A".to_string()]);
        }
    }

    #[test]
    fn test_update_fault_is_reported_once() {
        struct NoUpdates(MemoryStorage);

        impl Storage for NoUpdates {
            fn write(&self, resource: &dyn Resource) -> Result<()> {
                self.0.write(resource)
            }
            fn update(&self, _resource: &dyn Resource) -> Result<()> {
                anyhow::bail!("read-only table")
            }
            fn warning(&self, message: &str) -> Result<()> {
                self.0.warning(message)
            }
        }

        let storage = Arc::new(NoUpdates(MemoryStorage::new()));
        let progress = Arc::new(CrawlProgress::new());
        let crawler = Crawler::new(config(storage.clone(), progress.clone(), 1));
        let tree = Node::branch("R", vec![Node::leaf("A").failing_listing()]);

        crawler.run(tree.into_resource()).unwrap();

        // Listing warning, then update error, then A's failure seen by R
        let summary = progress.get_summary();
        assert_eq!((summary.objects, summary.errors, summary.warnings), (2, 1, 2));
        assert!(summary.last_error.unwrap().contains("Failed to update node/A"));
    }

    #[test]
    fn test_warning_storage_fault_does_not_abort() {
        struct NoWarnings(MemoryStorage);

        impl Storage for NoWarnings {
            fn write(&self, resource: &dyn Resource) -> Result<()> {
                self.0.write(resource)
            }
            fn update(&self, resource: &dyn Resource) -> Result<()> {
                self.0.update(resource)
            }
            fn warning(&self, _message: &str) -> Result<()> {
                anyhow::bail!("warnings table missing")
            }
        }

        let storage = Arc::new(NoWarnings(MemoryStorage::new()));
        let progress = Arc::new(CrawlProgress::new());
        let tree = Node::branch("R", vec![Node::leaf("A").failing(), Node::leaf("B")]);

        ParallelCrawler::new(config(storage.clone(), progress.clone(), 2))
            .run(tree.into_resource())
            .unwrap();

        assert_eq!(storage.0.writes().len(), 2);
        assert_eq!(progress.get_summary().warnings, 1);
    }
}

mod facets {
    use super::*;

    /// Records the facets it was asked for; fails at `fail_at`
    struct FacetProbe {
        fetched: Arc<Mutex<Vec<Facet>>>,
        fail_at: Option<Facet>,
    }

    impl FacetProbe {
        fn fetch(&mut self, facet: Facet) -> Result<()> {
            self.fetched.lock().push(facet);
            if self.fail_at == Some(facet) {
                anyhow::bail!("{} unavailable", facet);
            }
            Ok(())
        }
    }

    impl Resource for FacetProbe {
        fn key(&self) -> ResourceKey {
            key("probe")
        }
        fn fetch_iam_policy(&mut self, _c: &dyn ApiClient) -> Result<()> {
            self.fetch(Facet::IamPolicy)
        }
        fn fetch_gcs_policy(&mut self, _c: &dyn ApiClient) -> Result<()> {
            self.fetch(Facet::GcsPolicy)
        }
        fn fetch_dataset_policy(&mut self, _c: &dyn ApiClient) -> Result<()> {
            self.fetch(Facet::DatasetPolicy)
        }
        fn fetch_cloudsql_policy(&mut self, _c: &dyn ApiClient) -> Result<()> {
            self.fetch(Facet::CloudSqlPolicy)
        }
        fn fetch_billing_info(&mut self, _c: &dyn ApiClient) -> Result<()> {
            self.fetch(Facet::BillingInfo)
        }
        fn fetch_enabled_apis(&mut self, _c: &dyn ApiClient) -> Result<()> {
            self.fetch(Facet::EnabledApis)
        }
        fn add_warning(&mut self, _warning: String) {}
        fn record(&self) -> ResourceRecord {
            ResourceRecord::new(self.key(), None, Value::Null)
        }
    }

    #[test]
    fn test_facets_fetched_in_fixed_order() {
        let fetched = Arc::new(Mutex::new(Vec::new()));
        let storage = Arc::new(MemoryStorage::new());
        let crawler = Crawler::new(config(storage.clone(), Arc::new(CrawlProgress::new()), 1));

        crawler
            .run(Box::new(FacetProbe {
                fetched: fetched.clone(),
                fail_at: None,
            }))
            .unwrap();

        assert_eq!(fetched.lock().as_slice(), &Facet::VISIT_ORDER);
        assert_eq!(storage.writes().len(), 1);
    }

    #[test]
    fn test_facet_fault_stops_visit_before_write() {
        let fetched = Arc::new(Mutex::new(Vec::new()));
        let storage = Arc::new(MemoryStorage::new());
        let progress = Arc::new(CrawlProgress::new());
        let crawler = Crawler::new(config(storage.clone(), progress.clone(), 1));

        let Err(error) = crawler.run(Box::new(FacetProbe {
            fetched: fetched.clone(),
            fail_at: Some(Facet::DatasetPolicy),
        })) else {
            panic!("a failing facet should fail the root visit");
        };

        assert_eq!(
            format!("{:#}", error),
            "Failed to fetch dataset policy of node/probe: dataset policy unavailable"
        );
        assert_eq!(fetched.lock().len(), 3);
        assert!(storage.writes().is_empty());
        assert_eq!(progress.get_summary().objects, 0);
    }
}

mod driver {
    use super::*;

    #[test]
    fn test_run_crawler_returns_summary() {
        for parallel in [false, true] {
            let options = CrawlOptions {
                parallel,
                threads: 3,
                ..CrawlOptions::default()
            };
            let summary = run_crawler(
                Arc::new(MemoryStorage::new()),
                Arc::new(CrawlProgress::new()),
                Arc::new(NoApi),
                example_tree().into_resource(),
                &options,
            )
            .unwrap();

            assert_eq!((summary.objects, summary.errors, summary.warnings), (6, 0, 0));
            assert!(summary.is_clean());
        }
    }

    #[test]
    fn test_run_crawler_rejects_zero_threads() {
        let options = CrawlOptions {
            threads: 0,
            ..CrawlOptions::default()
        };
        let result = run_crawler(
            Arc::new(MemoryStorage::new()),
            Arc::new(CrawlProgress::new()),
            Arc::new(NoApi),
            example_tree().into_resource(),
            &options,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_progresser_is_returned_by_run() {
        let progress = Arc::new(CrawlProgress::new());
        let crawler = Crawler::new(config(Arc::new(MemoryStorage::new()), progress.clone(), 1));
        let returned: Arc<dyn Progresser> = crawler.run(example_tree().into_resource()).unwrap();
        assert_eq!(returned.get_summary().objects, 6);
        assert_eq!(progress.get_summary().objects, 6);
    }
}

mod equivalence {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    struct Shape(Vec<Shape>);

    fn arb_shape() -> impl Strategy<Value = Shape> {
        Just(Shape(Vec::new())).prop_recursive(4, 48, 5, |inner| {
            prop::collection::vec(inner, 0..5).prop_map(Shape)
        })
    }

    /// Number nodes in pre-order and fail the ones listed in `faults`
    fn build(shape: &Shape, next: &mut usize, faults: &HashSet<usize>) -> Node {
        let index = *next;
        *next += 1;
        let children = shape.0.iter().map(|c| build(c, next, faults)).collect();
        let node = Node::branch(&format!("n{}", index), children);
        if faults.contains(&index) {
            node.failing()
        } else {
            node
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn sequential_and_parallel_agree(
            shape in arb_shape(),
            faults in prop::collection::hash_set(0usize..48, 0..4),
            threads in 1usize..8,
        ) {
            let tree = build(&shape, &mut 0, &faults);

            let sequential = crawl(tree.clone(), false, 1);
            let parallel = crawl(tree, true, threads);

            prop_assert_eq!(sequential.written(), parallel.written());
            prop_assert_eq!(sequential.result.is_ok(), parallel.result.is_ok());
            prop_assert_eq!(
                sequential.summary.errors + sequential.summary.warnings,
                parallel.summary.errors + parallel.summary.warnings
            );
            prop_assert_eq!(sequential.summary.objects, parallel.summary.objects);
        }
    }
}

mod paginated_listing {
    use super::*;
    use gcp_inventory::resource::from_root_id;
    use std::collections::HashMap;

    const RM: &str = "https://cloudresourcemanager.googleapis.com";

    /// Answers GETs from a fixed table and every getIamPolicy with an empty policy
    struct CannedApi(HashMap<String, Value>);

    impl ApiClient for CannedApi {
        fn get(&self, url: &str) -> Result<Value> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("API request failed: 404 Not Found"))
        }

        fn post(&self, url: &str, _body: &Value) -> Result<Value> {
            if url.ends_with(":getIamPolicy") {
                Ok(json!({}))
            } else {
                anyhow::bail!("API request failed: 404 Not Found")
            }
        }
    }

    /// Organization 1 whose folder listing fails on its second page
    fn org_with_broken_second_page() -> CannedApi {
        let mut responses = HashMap::new();
        responses.insert(
            format!("{}/v1/organizations/1", RM),
            json!({"name": "organizations/1"}),
        );
        responses.insert(
            format!("{}/v2/folders?parent=organizations%2F1", RM),
            json!({"folders": [{"name": "folders/10"}, {"name": "folders/11"}], "nextPageToken": "t1"}),
        );
        responses.insert(
            format!("{}/v1/projects?filter=parent.type%3Aorganization%20parent.id%3A1", RM),
            json!({}),
        );
        for folder in ["10", "11"] {
            responses.insert(
                format!("{}/v2/folders?parent=folders%2F{}", RM, folder),
                json!({}),
            );
            responses.insert(
                format!("{}/v1/projects?filter=parent.type%3Afolder%20parent.id%3A{}", RM, folder),
                json!({}),
            );
        }
        CannedApi(responses)
    }

    #[test]
    fn test_children_from_earlier_pages_are_crawled() {
        for parallel in [false, true] {
            let api: Arc<dyn ApiClient> = Arc::new(org_with_broken_second_page());
            let root = from_root_id(api.as_ref(), "organizations/1").unwrap();
            let storage = Arc::new(MemoryStorage::new());
            let progress = Arc::new(CrawlProgress::new());
            let config = CrawlerConfig::new(storage.clone(), progress.clone(), api)
                .with_threads(2)
                .unwrap();

            if parallel {
                ParallelCrawler::new(config).run(root).unwrap();
            } else {
                Crawler::new(config).run(root).unwrap();
            }

            let written: Vec<_> = storage.written_keys().iter().map(|k| k.to_string()).collect();
            assert_eq!(written, vec!["folder/10", "folder/11", "organization/1"]);

            let summary = progress.get_summary();
            assert_eq!((summary.objects, summary.errors, summary.warnings), (3, 0, 1));
            assert!(summary
                .last_warning
                .unwrap()
                .contains("Failed to list folders of organization/1"));

            let updates = storage.updates();
            assert_eq!(updates.len(), 1);
            assert_eq!(updates[0].key, ResourceKey::new("organization", "1"));
        }
    }
}
